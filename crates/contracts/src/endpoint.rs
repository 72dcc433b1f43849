//! EndPoint - named, pre-registered submission destination

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Named entry point that binds inbound submissions to a configuration document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EndPoint {
    #[validate(length(min = 1, message = "end point name cannot be empty"))]
    pub name: String,

    #[serde(default)]
    pub enabled: bool,

    /// Skip context enrichment for submissions of this end point
    #[serde(default)]
    pub disable_context: bool,

    /// Keep context entries supplied by the caller
    #[serde(default)]
    pub allow_context_override: bool,

    /// Configuration document (TOML or JSON) applied to submissions
    #[serde(default)]
    pub configuration_document: String,
}

impl EndPoint {
    pub fn new(name: impl Into<String>, configuration_document: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            disable_context: false,
            allow_context_override: false,
            configuration_document: configuration_document.into(),
        }
    }
}
