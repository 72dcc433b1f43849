//! Dispatcher implementations
//!
//! Contains LogDispatcher, FileDispatcher, and NetworkDispatcher.

mod file;
mod log;
mod network;

pub use self::file::{FileDispatcher, FileDispatcherConfig};
pub use self::log::LogDispatcher;
pub use self::network::{NetworkDispatcher, NetworkDispatcherConfig, NetworkFormat};
