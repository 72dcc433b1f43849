//! # Distributor
//!
//! Submission distribution engine.
//!
//! Responsibilities:
//! - Fan a submission out over its configured routes and passes as jobs
//! - Pick the durable or transient queue and drive job lifecycle marks
//! - Run the per-route pipeline (gate, enrichment, data build, dispatch)
//! - Keyword registry of routes, data providers and dispatchers
//!
//! ## Usage
//!
//! ```ignore
//! use distributor::{Distributor, MemoryQueue, Registry};
//!
//! let registry = Registry::builder()
//!     .dispatchers(&dispatcher_set)
//!     .with_builtins()
//!     .build();
//!
//! let distributor = Distributor::new(registry, durable_queue, MemoryQueue::new("transient"));
//! let jobs = distributor.distribute(submission).await?;
//! ```

mod api;
mod distributor;
mod processor;
mod provider;
mod queue;
mod registry;
mod route;
mod routes;

pub use api::{EndPointStorage, SubmissionHandler};
pub use distributor::{DistributionOptions, Distributor};
pub use processor::SimpleDataProcessor;
pub use provider::{merge_provided_fields, StaticDataProvider};
pub use queue::{FileQueue, MemoryQueue};
pub use registry::{Registry, RegistryBuilder};
pub use route::{EnrichmentCache, RoutePipeline};
pub use routes::GenericRoute;

#[cfg(test)]
pub(crate) mod testing;
