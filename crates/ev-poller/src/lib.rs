//! EV Battery Telemetry Poller
//!
//! Ties the adapter link, the poll scheduler and the vehicle decoder
//! together in one tokio task and publishes telemetry snapshots.

pub mod config;
mod error;
mod poller;

pub use config::{AdapterConfig, AdapterKind, AppConfig, SchedulerSettings};
pub use error::PollerError;
pub use poller::{Control, Poller, PollerHandle};

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install the global fmt subscriber at `level`
pub fn init_logging(level: Level) -> Result<(), PollerError> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
