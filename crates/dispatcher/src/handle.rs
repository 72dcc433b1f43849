//! DispatcherHandle - wraps a dispatcher with delivery metrics

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, instrument};

use contracts::{DataDispatcher, DistributorError, OutboundFields};

use crate::metrics::DispatchMetrics;

/// Metered handle to a dispatcher
///
/// Implements `DataDispatcher` itself, so routes use it in place of the
/// wrapped dispatcher. Errors pass through unchanged.
pub struct DispatcherHandle {
    /// Dispatcher name
    name: String,
    inner: Arc<dyn DataDispatcher>,
    /// Shared metrics
    metrics: Arc<DispatchMetrics>,
}

impl DispatcherHandle {
    /// Wrap a dispatcher
    pub fn new<D: DataDispatcher + 'static>(dispatcher: D) -> Self {
        Self::from_arc(Arc::new(dispatcher))
    }

    /// Wrap a shared dispatcher
    pub fn from_arc(dispatcher: Arc<dyn DataDispatcher>) -> Self {
        Self {
            name: dispatcher.keyword().to_string(),
            inner: dispatcher,
            metrics: Arc::new(DispatchMetrics::new()),
        }
    }

    /// Get dispatcher name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }
}

#[async_trait]
impl DataDispatcher for DispatcherHandle {
    fn keyword(&self) -> &str {
        &self.name
    }

    #[instrument(name = "dispatcher_handle_send", skip(self, fields), fields(dispatcher = %self.name))]
    async fn send(&self, fields: &OutboundFields) -> Result<(), DistributorError> {
        let started = Instant::now();
        let result = self.inner.send(fields).await;
        self.metrics
            .set_last_latency_us(started.elapsed().as_micros() as u64);

        match &result {
            Ok(()) => self.metrics.record_sent(fields.len()),
            Err(e) => {
                self.metrics.inc_failure_count();
                error!(dispatcher = %self.name, error = %e, "Send failed");
            }
        }
        result
    }
}
