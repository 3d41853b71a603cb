//! Patchwire CLI - issuer side of the OSC command bridge
//!
//! Serves the tool catalog over stdin/stdout, runs one-off tool calls, and
//! writes starter configuration files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use patchwire::service::ToolService;
use patchwire::{Bridge, BridgeConfig, config};
use std::net::IpAddr;
use std::path::PathBuf;
use tokio::io::{BufReader, BufWriter};

#[derive(Parser)]
#[command(name = "patchwire")]
#[command(about = "Build visual-programming patches remotely over OSC", long_about = None)]
struct Cli {
    /// JSON bridge configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address of the host daemon
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port the host listens on
    #[arg(long)]
    to_port: Option<u16>,

    /// Port replies arrive on
    #[arg(long)]
    from_port: Option<u16>,

    /// Reply timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Do not stamp sequence ids on payloads
    #[arg(long)]
    no_seq: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve line-delimited JSON tool requests on stdin/stdout
    Serve,

    /// Run a single tool and print its result
    Call {
        /// Tool name (see `list_tools`)
        tool: String,

        /// Tool parameters as a JSON object
        #[arg(default_value = "{}")]
        params: String,
    },

    /// Write the effective bridge configuration to a file
    InitConfig {
        /// Destination path
        path: PathBuf,
    },
}

impl Cli {
    fn bridge_config(&self) -> Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => config::load_config(path)?,
            None => BridgeConfig::default(),
        };
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.to_port {
            config.to_host_port = port;
        }
        if let Some(port) = self.from_port {
            config.from_host_port = port;
        }
        if let Some(timeout) = self.timeout_ms {
            config.timeout_ms = timeout;
        }
        if self.no_seq {
            config.sequence_ids = false;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Stdout carries the protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let bridge_config = cli.bridge_config()?;

    match cli.command {
        Commands::Serve => {
            let bridge = Bridge::connect(bridge_config)
                .await
                .context("Failed to open OSC bridge")?;
            let mut service = ToolService::new(bridge);
            let reader = BufReader::new(tokio::io::stdin());
            let writer = BufWriter::new(tokio::io::stdout());
            service.run(reader, writer).await?;
        }

        Commands::Call { tool, params } => {
            let params: serde_json::Value =
                serde_json::from_str(&params).context("Parameters are not valid JSON")?;
            let bridge = Bridge::connect(bridge_config)
                .await
                .context("Failed to open OSC bridge")?;
            let mut service = ToolService::new(bridge);
            let result = service.call(&tool, params).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Commands::InitConfig { path } => {
            config::write_config(&path, &bridge_config)?;
            println!("Wrote bridge configuration to {:?}", path);
        }
    }

    Ok(())
}
