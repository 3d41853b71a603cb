//! `patchwire-host` – host daemon serving an in-memory patch model.

use patchwire::config;
use patchwire::host::{HostConfig, HostDaemon, MemoryHost};
use std::env;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

#[tokio::main(flavor = "current_thread")]
async fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut args = env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut listen: Option<SocketAddr> = None;
    let mut reply_to: Option<SocketAddr> = None;
    let mut tick_ms: Option<u64> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_path = Some(PathBuf::from(required(&mut args, "--config")?)),
            "--listen" => listen = Some(parse_value(&mut args, "--listen")?),
            "--reply-to" => reply_to = Some(parse_value(&mut args, "--reply-to")?),
            "--tick-ms" => tick_ms = Some(parse_value(&mut args, "--tick-ms")?),
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "invalid command-line argument",
                ));
            }
        }
    }

    let mut config = match config_path {
        Some(path) => config::load_config::<HostConfig>(&path).map_err(io::Error::other)?,
        None => HostConfig::default(),
    };
    if let Some(addr) = listen {
        config.listen = addr;
    }
    if let Some(addr) = reply_to {
        config.reply_to = addr;
    }
    if let Some(ms) = tick_ms {
        config.tick_delay_ms = ms;
    }

    let daemon = HostDaemon::bind(&config, MemoryHost::new()).await?;
    eprintln!("patchwire-host listening on {}", daemon.local_addr()?);

    let dispatcher = daemon
        .run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to wait for ctrl-c");
            }
        })
        .await?;

    let session = dispatcher.session();
    eprintln!(
        "patchwire-host stopped with {} registered objects",
        session.registry_len()
    );
    Ok(())
}

fn required(args: &mut impl Iterator<Item = String>, flag: &str) -> io::Result<String> {
    args.next().ok_or_else(|| {
        eprintln!("{flag} requires an argument");
        print_usage();
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("missing value for {flag}"),
        )
    })
}

fn parse_value<T: std::str::FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &str,
) -> io::Result<T> {
    let raw = required(args, flag)?;
    raw.parse().map_err(|_| {
        eprintln!("Invalid value for {flag}: {raw}");
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid value for {flag}"),
        )
    })
}

fn print_usage() {
    eprintln!(
        "Usage: patchwire-host [--config PATH] [--listen ADDR] [--reply-to ADDR] [--tick-ms N]\n\
         \n\
         Options:\n\
           --config PATH     JSON host configuration file\n\
           --listen ADDR     Address commands arrive on (default: 127.0.0.1:7400)\n\
           --reply-to ADDR   Address replies are sent to (default: 127.0.0.1:7401)\n\
           --tick-ms N       Spacing between batch replay ticks (default: 20)\n"
    );
}
