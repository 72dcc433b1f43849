//! # Contracts
//!
//! Frozen interface contracts shared by every distributor crate: the
//! submission data model, the job model, the collaborator traits (queue,
//! condition evaluator, data processor) and the plugin traits (routes,
//! data providers, data dispatchers).
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Lifecycle
//! - A `Submission` is built at the intake boundary and only its `Context`
//!   is mutated afterwards (by route / data provider context hooks).
//! - Every route × pass becomes a `Job` owned by a `JobQueue`.

mod configuration;
mod context;
mod endpoint;
mod error;
mod job;
mod plugin;
mod queue;
mod submission;
mod value;

pub use configuration::*;
pub use context::Context;
pub use endpoint::EndPoint;
pub use error::*;
pub use job::{Job, JobStatus};
pub use plugin::*;
pub use queue::{JobQueue, LocalJobQueue};
pub use submission::Submission;
pub use value::*;
