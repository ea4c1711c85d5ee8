//! `ledger-settle` daemon: runs the reminder scheduler over the in-memory
//! store until Ctrl-C.
//!
//! The config path comes from the first argument, then `LEDGER_SETTLE_CONFIG`.
//! Without either, defaults are used.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ledger_settle_backend::config::{load_config, SettleConfig};
use ledger_settle_backend::domain::{ContactDirectory, LogNotifier, SystemClock};
use ledger_settle_backend::storage::MemoryConnection;
use ledger_settle_backend::Backend;

const CONFIG_ENV_VAR: &str = "LEDGER_SETTLE_CONFIG";

fn config_path() -> Option<PathBuf> {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV_VAR).ok())
        .map(PathBuf::from)
}

#[tokio::main]
async fn main() -> Result<()> {
    let path = config_path();
    let config = match &path {
        Some(path) => load_config(path)?,
        None => SettleConfig::default(),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &path {
        Some(path) => info!("Using config {:?}", path),
        None => warn!("No config given (argument or {}); using defaults", CONFIG_ENV_VAR),
    }

    let directory = ContactDirectory::new(config.contacts.clone());
    info!("Contact directory loaded with {} entries", directory.len());

    let backend = Backend::new(
        Arc::new(MemoryConnection::new()),
        Arc::new(SystemClock),
        Arc::new(LogNotifier),
        Arc::new(directory),
        &config.scheduler,
    );

    backend
        .run_scheduler(&config.scheduler, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("Shut down cleanly");
    Ok(())
}
