//! Dispatcher factory - builds named dispatcher instances from configuration

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

use contracts::{DataDispatcher, DispatcherConfig, DispatcherType};

use crate::error::DispatcherError;
use crate::handle::DispatcherHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{FileDispatcher, LogDispatcher, NetworkDispatcher};

/// Named, metered dispatchers, built once at startup
#[derive(Default)]
pub struct DispatcherSet {
    handles: Vec<Arc<DispatcherHandle>>,
    by_name: HashMap<String, usize>,
}

impl DispatcherSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dispatcher under its keyword
    pub fn insert(&mut self, dispatcher: Arc<dyn DataDispatcher>) -> Result<(), DispatcherError> {
        let handle = DispatcherHandle::from_arc(dispatcher);
        let name = handle.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(DispatcherError::DuplicateName(name));
        }
        self.by_name.insert(name, self.handles.len());
        self.handles.push(Arc::new(handle));
        Ok(())
    }

    /// Dispatcher registered under `name`
    pub fn get(&self, name: &str) -> Option<Arc<dyn DataDispatcher>> {
        self.by_name
            .get(name)
            .map(|&idx| Arc::clone(&self.handles[idx]) as Arc<dyn DataDispatcher>)
    }

    /// All dispatchers, in insertion order
    pub fn iter(&self) -> impl Iterator<Item = Arc<dyn DataDispatcher>> + '_ {
        self.handles
            .iter()
            .map(|handle| Arc::clone(handle) as Arc<dyn DataDispatcher>)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Get metrics for all dispatchers
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }
}

/// Create one dispatcher from configuration
#[instrument(
    name = "dispatcher_create",
    skip(config),
    fields(dispatcher = %config.name, dispatcher_type = ?config.dispatcher_type)
)]
pub async fn create_dispatcher(
    config: &DispatcherConfig,
) -> Result<Arc<dyn DataDispatcher>, DispatcherError> {
    match config.dispatcher_type {
        DispatcherType::Log => Ok(Arc::new(LogDispatcher::new(&config.name))),
        DispatcherType::File => {
            let dispatcher = FileDispatcher::from_config(config)
                .await
                .map_err(|e| DispatcherError::creation(&config.name, e.to_string()))?;
            Ok(Arc::new(dispatcher))
        }
        DispatcherType::Udp => {
            let dispatcher = NetworkDispatcher::from_config(config)
                .await
                .map_err(|e| DispatcherError::creation(&config.name, e))?;
            Ok(Arc::new(dispatcher))
        }
    }
}

/// Create every configured dispatcher
#[instrument(name = "dispatchers_create", skip(configs), fields(count = configs.len()))]
pub async fn create_dispatchers(
    configs: &[DispatcherConfig],
) -> Result<DispatcherSet, DispatcherError> {
    let mut set = DispatcherSet::new();
    for config in configs {
        set.insert(create_dispatcher(config).await?)?;
    }
    info!(dispatchers = set.len(), "Dispatchers created");
    Ok(set)
}
