//! Layered error definitions
//!
//! Categorized by source: configuration / data / delivery / codec / queue

use thiserror::Error;

/// Unified error type of the distribution pipeline
#[derive(Debug, Error)]
pub enum DistributorError {
    // ===== Configuration Errors =====
    /// Configuration document parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Missing or unresolvable configuration (mapper group, destination, ...)
    #[error("{message}")]
    Configuration { message: String },

    /// No outbound route registered for the configured integration keyword
    #[error("no outbound route registered for keyword \"{keyword}\" (route ID {route_id})")]
    UnknownRoute { keyword: String, route_id: String },

    /// Named end point missing or disabled
    #[error("End point \"{name}\" not found or disabled.")]
    EndPointNotFound { name: String },

    // ===== Data Errors =====
    /// Data build succeeded but yielded no fields
    #[error("No data generated for route \"{keyword}\" with ID {route_id}.")]
    EmptyData { keyword: String, route_id: String },

    /// Condition evaluation or data mapping failed
    #[error("data processing error: {message}")]
    DataProcessing { message: String },

    // ===== Delivery Errors =====
    /// Dispatcher raised during send; message kept verbatim
    #[error("{message}")]
    Delivery { dispatcher: String, message: String },

    // ===== Codec / Queue Errors =====
    /// Payload could not be decoded
    #[error(transparent)]
    Decode(#[from] CodecError),

    /// Queue storage or processing failure
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DistributorError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Route has no data mapper group id configured
    pub fn no_data_mapper_group_defined(keyword: &str, route_id: &str) -> Self {
        Self::configuration(format!(
            "No data mapper group defined in route \"{keyword}\" with ID {route_id}."
        ))
    }

    /// Route references a data mapper group that does not exist
    pub fn data_mapper_group_not_found(group_id: &str, keyword: &str, route_id: &str) -> Self {
        Self::configuration(format!(
            "No data mapper group configuration found for group ID \"{group_id}\" in outbound route \"{keyword}\" with ID {route_id}."
        ))
    }

    /// Create empty data error
    pub fn empty_data(keyword: impl Into<String>, route_id: impl Into<String>) -> Self {
        Self::EmptyData {
            keyword: keyword.into(),
            route_id: route_id.into(),
        }
    }

    /// Create data processing error
    pub fn data_processing(message: impl Into<String>) -> Self {
        Self::DataProcessing {
            message: message.into(),
        }
    }

    /// Create delivery error
    pub fn delivery(dispatcher: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Delivery {
            dispatcher: dispatcher.into(),
            message: message.into(),
        }
    }
}

/// Value / payload decoding errors
#[derive(Debug, Error)]
pub enum CodecError {
    /// The `type` tag of an encoded value is not recognized
    #[error("unknown value type \"{0}\"")]
    UnknownType(String),

    /// The job payload does not have the expected shape
    #[error("malformed job payload: {0}")]
    MalformedPayload(String),

    /// Underlying JSON (de)serialization error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CodecError {
    /// Create malformed payload error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload(message.into())
    }
}

/// Queue-level errors
#[derive(Debug, Error)]
pub enum QueueError {
    /// A job failed while being processed; carries the original message
    #[error("{message}")]
    Processing { message: String },

    /// Backing storage failed
    #[error("queue '{queue}' storage error: {message}")]
    Storage { queue: String, message: String },

    /// Job id unknown to the queue
    #[error("job {id} not found in queue '{queue}'")]
    NotFound { queue: String, id: u64 },

    /// Job is not pending, another worker owns it
    #[error("job {id} in queue '{queue}' cannot be claimed, status is {status}")]
    Claim {
        queue: String,
        id: u64,
        status: crate::JobStatus,
    },
}

impl QueueError {
    /// Wrap a pipeline failure, keeping its message intact
    pub fn processing(error: &DistributorError) -> Self {
        Self::Processing {
            message: error.to_string(),
        }
    }

    /// Create storage error
    pub fn storage(queue: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            queue: queue.into(),
            message: message.into(),
        }
    }
}
