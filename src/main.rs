use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rover_bridge::{BridgeConfig, BridgeServer};

/// Bridge TCP motion commands to the vehicle's serial motor controller
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON config file, missing fields use the defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on [default: 0.0.0.0:3000]
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Serial device of the motor controller [default: /dev/ttyUSB0]
    #[arg(short, long)]
    serial: Option<String>,

    /// Serial baudrate, must match the firmware [default: 9600]
    #[arg(short, long)]
    baud: Option<u32>,
}

impl Args {
    fn into_config(self) -> rover_bridge::Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::from_file(path)?,
            None => BridgeConfig::default(),
        };
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(serial) = self.serial {
            config.serial_port = serial;
        }
        if let Some(baud) = self.baud {
            config.baudrate = baud;
        }
        Ok(config)
    }
}

async fn run(args: Args) -> rover_bridge::Result<()> {
    let config = args.into_config()?;
    let server = BridgeServer::bind(config).await?;

    tokio::select! {
        _ = server.serve() => {}
        _ = tokio::signal::ctrl_c() => info!("Ctrl-C received"),
    }

    server.close().await
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    if let Err(e) = run(Args::parse()).await {
        eprintln!("Bridge error: {}", e);
        std::process::exit(1);
    }
}
