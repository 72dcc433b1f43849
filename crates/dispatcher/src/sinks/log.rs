//! LogDispatcher - logs outbound fields via tracing

use async_trait::async_trait;
use contracts::{DataDispatcher, DistributorError, OutboundFields};
use tracing::{info, instrument};

/// Dispatcher that logs the outbound record, for debugging and dry runs
pub struct LogDispatcher {
    name: String,
}

impl LogDispatcher {
    /// Create a new LogDispatcher with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl DataDispatcher for LogDispatcher {
    fn keyword(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_dispatcher_send",
        skip(self, fields),
        fields(dispatcher = %self.name, fields = fields.len())
    )]
    async fn send(&self, fields: &OutboundFields) -> Result<(), DistributorError> {
        let record = serde_json::to_string(fields)
            .map_err(|e| DistributorError::delivery(&self.name, e.to_string()))?;
        info!(dispatcher = %self.name, %record, "outbound record");
        Ok(())
    }
}
