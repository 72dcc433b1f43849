//! # Queue Data
//!
//! Job identity and serialization.
//!
//! Responsibilities:
//! - Encode / decode submission field values into the tagged transport form
//! - Convert submissions to jobs and back (lossless)
//! - Content hashes for deduplication, correlation and caching
//! - Human readable job labels

pub mod codec;
pub mod factory;
pub mod hash;

pub use codec::{decode_data, decode_value, encode_data, encode_value, data_from_plain};
pub use factory::QueueDataFactory;
pub use hash::content_hash;
