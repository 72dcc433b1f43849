//! Submission - one inbound payload to distribute

use serde::{Deserialize, Serialize};

use crate::{ConfigurationStack, Context, Data};

/// Inbound data + layered configuration + mutable context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub data: Data,
    pub configuration: ConfigurationStack,
    #[serde(default)]
    pub context: Context,
}

impl Submission {
    /// Create a submission with an empty context
    pub fn new(data: Data, configuration: ConfigurationStack) -> Self {
        Self {
            data,
            configuration,
            context: Context::default(),
        }
    }

    /// Replace the context
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }
}
