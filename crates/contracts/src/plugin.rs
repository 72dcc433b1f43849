//! Plugin and collaborator traits
//!
//! - `OutboundRoute`: integration behind a route (context hook + dispatcher)
//! - `DataProvider`: submission enrichment (context + fields)
//! - `DataDispatcher`: sink receiving the built field map
//! - `ConditionEvaluator` / `DataProcessor`: gate evaluation and data mapping

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::{
    ConfigurationStack, Context, Data, DataProviderConfig, DistributorError, OutboundFields,
    RouteConfig, Submission,
};

/// Data output trait
///
/// All dispatcher implementations must implement this trait.
#[async_trait]
pub trait DataDispatcher: Send + Sync {
    /// Dispatcher keyword (used for logging/metrics)
    fn keyword(&self) -> &str;

    /// Deliver one field map
    ///
    /// # Errors
    /// Returns a delivery error; its message is preserved up to the queue
    async fn send(&self, fields: &OutboundFields) -> Result<(), DistributorError>;
}

/// Integration behind a configured route
pub trait OutboundRoute: Send + Sync {
    /// Integration keyword, matched against the route's `type`
    fn keyword(&self) -> &str;

    /// Register context before any job of the submission exists.
    ///
    /// Called for every configured route regardless of its enabled flag.
    fn add_context(&self, _context: &mut Context, _config: &RouteConfig) {}

    /// Dispatcher used to deliver this route's data
    fn dispatcher(&self, config: &RouteConfig) -> Result<Arc<dyn DataDispatcher>, DistributorError>;
}

/// Submission enrichment plugin
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Provider keyword (key in `distributor.dataProviders`)
    fn keyword(&self) -> &str;

    /// Register context; only called for enabled providers
    fn add_context(&self, _context: &mut Context, _config: &DataProviderConfig) {}

    /// Fields this provider contributes for the submission.
    ///
    /// Merging into the submission (honouring `mustExist` / `mustBeEmpty`)
    /// is done by the caller.
    async fn provide_fields(
        &self,
        submission: &Submission,
        config: &DataProviderConfig,
    ) -> Result<Data, DistributorError>;
}

/// Borrowed view handed to conditions and data mappers
#[derive(Debug, Clone, Copy)]
pub struct ProcessorContext<'a> {
    pub data: &'a Data,
    pub configuration: &'a ConfigurationStack,
    pub context: &'a Context,
}

/// Boolean condition evaluation
pub trait ConditionEvaluator: Send + Sync {
    /// Evaluate `condition` against submission data and context
    fn evaluate(&self, condition: &Value, context: &ProcessorContext<'_>) -> Result<bool, DistributorError>;
}

/// Data transformation engine
pub trait DataProcessor: Send + Sync {
    /// Build the processing context from a submission
    fn build_context<'a>(&self, submission: &'a Submission) -> ProcessorContext<'a> {
        ProcessorContext {
            data: &submission.data,
            configuration: &submission.configuration,
            context: &submission.context,
        }
    }

    /// Apply a data mapper group, producing the outbound record
    fn apply_mapper_group(&self, group: &Value, context: &ProcessorContext<'_>) -> Result<Data, DistributorError>;
}
