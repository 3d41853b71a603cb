use patchwire::host::{Dispatcher, MemoryHost};
use patchwire::service::ToolService;
use patchwire::{Bridge, BridgeConfig, HostConfig, HostDaemon};
use serde_json::{Value, json};
use std::io;
use tokio::io::BufReader;
use tokio::sync::oneshot;

async fn serve_lines(
    lines: &[Value],
) -> (Vec<Value>, io::Result<Dispatcher<MemoryHost>>) {
    let host_config = HostConfig {
        listen: "127.0.0.1:0".parse().expect("listen addr"),
        tick_delay_ms: 1,
        ..HostConfig::default()
    };
    let mut daemon = HostDaemon::bind(&host_config, MemoryHost::new())
        .await
        .expect("bind daemon");
    let bridge = Bridge::connect(BridgeConfig {
        to_host_port: daemon.local_addr().expect("daemon addr").port(),
        from_host_port: 0,
        timeout_ms: 2000,
        replay_spacing_ms: 1,
        ..BridgeConfig::default()
    })
    .await
    .expect("open bridge");
    daemon.set_reply_to(bridge.local_addr().expect("bridge addr"));

    let (stop, stopped) = oneshot::channel::<()>();
    let daemon = tokio::spawn(daemon.run_until(async move {
        let _ = stopped.await;
    }));

    let mut input = String::new();
    for line in lines {
        input.push_str(&line.to_string());
        input.push('\n');
    }
    // Blank lines are skipped.
    input.push('\n');

    let mut output = Vec::new();
    let mut service = ToolService::new(bridge);
    service
        .run(BufReader::new(input.as_bytes()), &mut output)
        .await
        .expect("service run");

    let responses: Vec<Value> = String::from_utf8(output)
        .expect("utf8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("response json"))
        .collect();

    let _ = stop.send(());
    (responses, daemon.await.expect("daemon task"))
}

#[tokio::test]
async fn figma_import_is_sorted_before_sending() {
    let layer = |name: &str, class: &str| {
        json!({"name": name, "class": class, "x": 0, "y": 0, "width": 30, "height": 30})
    };
    let requests = [
        json!({"id": 1, "command": "init_device", "params": {"deviceName": "Flutter"}}),
        json!({"id": 2, "command": "import_figma_ui", "params": {"layers": [
            layer("40_knob", "live.dial"),
            layer("caption", "live.comment"),
            layer("00_bg", "live.panel"),
            layer("20_meter", "live.meter~")
        ]}}),
        json!({"id": 3, "command": "status"}),
    ];

    let (responses, dispatcher) = serve_lines(&requests).await;
    assert_eq!(responses.len(), 3);

    assert_eq!(responses[0]["id"], json!(1));
    assert_eq!(responses[0]["result"]["status"], json!("ok"));
    assert_eq!(responses[0]["result"]["device"], json!("Flutter"));

    assert_eq!(responses[1]["result"]["created"], json!(4));
    assert_eq!(responses[2]["result"]["stats"]["sent"], json!(2));

    let dispatcher = dispatcher.expect("daemon loop");
    let host = dispatcher.session().host();
    let patcher = host.patcher(host.front().expect("front")).expect("patcher");
    assert_eq!(
        patcher.classes(),
        ["live.panel", "live.meter~", "live.dial", "live.comment"]
    );
}

#[tokio::test]
async fn each_request_gets_exactly_one_response() {
    let requests = [
        json!({"id": "a", "command": "list_tools"}),
        json!({"id": "b", "command": "max_create_object", "params": {"id": "osc", "class": "cycle~", "x": 0, "y": 0}}),
        json!({"id": "c", "command": "max_wire_objects", "params": {"sourceId": "osc"}}),
        json!({"id": "d", "command": "reticulate"}),
        json!({"id": "e", "command": "max_remove_object", "params": {"id": "osc"}}),
    ];

    let (responses, dispatcher) = serve_lines(&requests).await;
    dispatcher.expect("daemon loop");

    let ids: Vec<&Value> = responses.iter().map(|r| &r["id"]).collect();
    assert_eq!(ids, [&json!("a"), &json!("b"), &json!("c"), &json!("d"), &json!("e")]);

    assert_eq!(responses[0]["result"]["tools"].as_array().map(Vec::len), Some(8));

    // Host-side failures come back as results carrying an error status.
    assert_eq!(responses[1]["result"]["status"], json!("error"));
    assert_eq!(
        responses[1]["result"]["message"],
        json!("No device initialized")
    );

    assert_eq!(responses[2]["error"]["code"], json!("invalid_params"));
    assert_eq!(responses[3]["error"]["code"], json!("unsupported_command"));

    assert_eq!(responses[4]["result"]["status"], json!("ok"));
    assert_eq!(responses[4]["result"]["id"], json!("osc"));
}
