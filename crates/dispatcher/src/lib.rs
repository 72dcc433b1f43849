//! # Dispatcher
//!
//! Data dispatcher module.
//!
//! Responsibilities:
//! - Built-in `DataDispatcher` sinks (log, file, UDP)
//! - Build named dispatcher instances from configuration
//! - Per-dispatcher delivery metrics

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{DataDispatcher, DispatcherConfig, DispatcherType, OutboundFields};
pub use dispatcher::{create_dispatchers, DispatcherSet};
pub use error::DispatcherError;
pub use handle::DispatcherHandle;
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use sinks::{FileDispatcher, LogDispatcher, NetworkDispatcher};
