//! Configuration document parsing
//!
//! TOML (primary) and JSON documents are both parsed into a plain JSON tree,
//! which becomes one layer of the configuration stack.

use contracts::DistributorError;
use serde_json::Value;

/// Configuration document format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format (recommended)
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Infer format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Guess the format of an inline document (JSON when it opens with `{`)
    pub fn sniff(content: &str) -> Self {
        if content.trim_start().starts_with('{') {
            Self::Json
        } else {
            Self::Toml
        }
    }
}

/// Parse a TOML document
pub fn parse_toml(content: &str) -> Result<Value, DistributorError> {
    let document: Value = toml::from_str(content).map_err(|e| DistributorError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })?;
    ensure_table(document)
}

/// Parse a JSON document
pub fn parse_json(content: &str) -> Result<Value, DistributorError> {
    let document: Value =
        serde_json::from_str(content).map_err(|e| DistributorError::ConfigParse {
            message: format!("JSON parse error: {e}"),
            source: Some(Box::new(e)),
        })?;
    ensure_table(document)
}

/// Parse according to format
pub fn parse(content: &str, format: ConfigFormat) -> Result<Value, DistributorError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

fn ensure_table(document: Value) -> Result<Value, DistributorError> {
    match document {
        Value::Object(_) => Ok(document),
        other => Err(DistributorError::config_parse(format!(
            "configuration document must be a table, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTES_TOML: &str = r#"
[distributor.routes.routeB]
type = "generic"
weight = 20

[distributor.routes.routeA]
type = "generic"
weight = 10
[distributor.routes.routeA.config]
enabled = true
data = "mapperGroupId1"
"#;

    #[test]
    fn test_parse_toml_keeps_declaration_order() {
        let document = parse_toml(ROUTES_TOML).unwrap();
        let routes: Vec<&String> = document["distributor"]["routes"]
            .as_object()
            .unwrap()
            .keys()
            .collect();
        assert_eq!(routes, vec!["routeB", "routeA"]);
        assert_eq!(document["distributor"]["routes"]["routeA"]["config"]["enabled"], true);
    }

    #[test]
    fn test_parse_json_minimal() {
        let document = parse_json(r#"{ "distributor": { "async": true } }"#).unwrap();
        assert_eq!(document["distributor"]["async"], true);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let err = parse_toml("invalid toml [[[").unwrap_err();
        assert!(matches!(err, DistributorError::ConfigParse { .. }));
    }

    #[test]
    fn test_json_document_must_be_table() {
        assert!(parse_json("[1, 2]").is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }

    #[test]
    fn test_sniff() {
        assert_eq!(ConfigFormat::sniff("  {\"a\": 1}"), ConfigFormat::Json);
        assert_eq!(ConfigFormat::sniff("a = 1"), ConfigFormat::Toml);
    }
}
