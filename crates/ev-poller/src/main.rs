//! EV Battery Telemetry Poller - Main Entry Point

use clap::Parser;
use ev_poller::{init_logging, AdapterKind, AppConfig, Poller};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "ev-poller", version)]
#[command(about = "Poll EV battery telemetry through an ELM327 adapter")]
struct Args {
    /// Configuration file (TOML). Without it ./ev-poller.toml is used
    /// when present. EV_POLLER__* variables override file values.
    #[arg(short, long, env = "EV_POLLER_CONFIG")]
    config: Option<PathBuf>,

    /// Answer from built-in sample responses instead of the adapter
    #[arg(long)]
    simulated: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;
    if args.simulated {
        config.adapter.kind = AdapterKind::Simulated;
    }
    init_logging(config.level()?)?;

    info!("=== EV Telemetry Poller v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Vehicle {}, adapter {:?}", config.vehicle, config.adapter.kind);

    let (poller, handle) = Poller::new(config)?;

    let shutdown = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received");
        }
        if let Err(e) = shutdown.shutdown().await {
            error!("Failed to stop poller: {}", e);
        }
    });

    let snapshot = poller.run().await?;
    info!("Final snapshot: {}", serde_json::to_string(&*snapshot)?);
    Ok(())
}
