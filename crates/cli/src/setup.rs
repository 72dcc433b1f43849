//! Shared command setup: configuration, dispatchers, registry and queues.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use config_loader::{ConfigLoader, ConfigurationStack};
use dispatcher::{create_dispatchers, DispatcherSet, LogDispatcher};
use distributor::{Distributor, FileQueue, MemoryQueue, Registry};

use crate::error::{CliError, Result};

/// Name of the dispatcher added when none is configured under it
pub const DEFAULT_DISPATCHER: &str = "log";

/// Load the configuration stack, checking every file exists
pub fn load_configuration(paths: &[PathBuf]) -> Result<ConfigurationStack> {
    for path in paths {
        if !path.exists() {
            return Err(CliError::config_not_found(path.display().to_string()));
        }
    }
    let stack = ConfigLoader::load_from_paths(paths)?;
    info!(layers = stack.len(), "Configuration loaded");
    Ok(stack)
}

/// Configured dispatchers, plus a `log` dispatcher when that name is free
pub async fn build_dispatchers(configuration: &ConfigurationStack) -> Result<DispatcherSet> {
    let mut set = create_dispatchers(&configuration.dispatchers()?).await?;
    if set.get(DEFAULT_DISPATCHER).is_none() {
        set.insert(Arc::new(LogDispatcher::new(DEFAULT_DISPATCHER)))?;
    }
    Ok(set)
}

/// Distributor over a file-backed durable queue and an in-memory transient queue
pub async fn build_distributor(
    dispatchers: &DispatcherSet,
    queue_dir: &Path,
) -> Result<Distributor<FileQueue, MemoryQueue>> {
    let registry = Registry::builder()
        .dispatchers(dispatchers)
        .with_builtins()
        .build();
    let durable = FileQueue::open(queue_dir).await?;
    info!(queue_dir = %queue_dir.display(), "Durable queue opened");
    Ok(Distributor::new(
        Arc::new(registry),
        durable,
        MemoryQueue::new("transient"),
    ))
}

/// Print per-dispatcher delivery counters
pub fn print_dispatcher_metrics(dispatchers: &DispatcherSet) {
    println!("Dispatchers:");
    for (name, snapshot) in dispatchers.metrics() {
        println!(
            "  {}: sent={}, failed={}, fields={}, last_latency={}us",
            name,
            snapshot.sent_count,
            snapshot.failure_count,
            snapshot.field_count,
            snapshot.last_latency_us
        );
    }
}
