//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration documents
//! - Resolve `includes` (included documents become lower precedence layers)
//! - Validate configuration legality
//! - Produce a `ConfigurationStack`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let stack = ConfigLoader::load_from_path(Path::new("distributor.toml")).unwrap();
//! println!("routes: {}", stack.routes().unwrap().len());
//! ```

mod parser;
mod validator;

pub use contracts::ConfigurationStack;
pub use parser::ConfigFormat;
pub use validator::{validate, ValidationReport};

use contracts::DistributorError;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const KEY_INCLUDES: &str = "includes";

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Include cycle
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<ConfigurationStack, DistributorError> {
        Self::load_from_paths(&[path.to_path_buf()])
    }

    /// Load several documents; later paths take precedence
    pub fn load_from_paths(paths: &[PathBuf]) -> Result<ConfigurationStack, DistributorError> {
        let mut stack = ConfigurationStack::default();
        let mut visiting = Vec::new();
        for path in paths {
            Self::load_layers(path, &mut stack, &mut visiting)?;
        }
        Self::finish(stack)
    }

    /// Load configuration from string
    ///
    /// `includes` are not resolved for inline documents.
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ConfigurationStack, DistributorError> {
        let mut document = parser::parse(content, format)?;
        if Self::take_includes(&mut document)?.is_some() {
            warn!("includes are ignored for inline configuration documents");
        }
        Self::finish(ConfigurationStack::single(document))
    }

    /// Parse one document without validating it
    pub fn parse_document(content: &str, format: ConfigFormat) -> Result<Value, DistributorError> {
        parser::parse(content, format)
    }

    /// Serialize the merged view of a stack to TOML
    pub fn to_toml(stack: &ConfigurationStack) -> Result<String, DistributorError> {
        let merged = stack.get(&[]).unwrap_or_default();
        toml::to_string_pretty(&merged)
            .map_err(|e| DistributorError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize the merged view of a stack to JSON
    pub fn to_json(stack: &ConfigurationStack) -> Result<String, DistributorError> {
        let merged = stack.get(&[]).unwrap_or_default();
        serde_json::to_string_pretty(&merged)
            .map_err(|e| DistributorError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, DistributorError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            DistributorError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            DistributorError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, DistributorError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Push `path` and its includes (first) onto the stack
    fn load_layers(
        path: &Path,
        stack: &mut ConfigurationStack,
        visiting: &mut Vec<PathBuf>,
    ) -> Result<(), DistributorError> {
        if visiting.iter().any(|p| p == path) {
            return Err(DistributorError::config_parse(format!(
                "include cycle detected at {}",
                path.display()
            )));
        }

        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        let mut document = parser::parse(&content, format)?;

        visiting.push(path.to_path_buf());
        if let Some(includes) = Self::take_includes(&mut document)? {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            for include in includes {
                Self::load_layers(&base.join(include), stack, visiting)?;
            }
        }
        visiting.pop();

        debug!(path = %path.display(), "configuration layer loaded");
        stack.push(document);
        Ok(())
    }

    /// Remove and return the `includes` list of a document
    fn take_includes(document: &mut Value) -> Result<Option<Vec<String>>, DistributorError> {
        let Some(includes) = document.as_object_mut().and_then(|m| m.remove(KEY_INCLUDES)) else {
            return Ok(None);
        };
        serde_json::from_value(includes).map(Some).map_err(|e| {
            DistributorError::config_validation(KEY_INCLUDES, format!("list of paths expected: {e}"))
        })
    }

    /// Validate and surface warnings
    fn finish(stack: ConfigurationStack) -> Result<ConfigurationStack, DistributorError> {
        let report = validator::validate(&stack)?;
        for warning in &report.warnings {
            warn!("{warning}");
        }
        Ok(stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MINIMAL_TOML: &str = r#"
[distributor]
async = false
enableStorage = true

[distributor.routes.routeId1]
type = "generic"
weight = 10
[distributor.routes.routeId1.config]
enabled = true
data = "mapperGroupId1"
dispatcher = "log"

[dataProcessing.dataMapperGroups.mapperGroupId1]
passthroughFields = true
"#;

    #[test]
    fn test_load_from_str_toml() {
        let stack = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let routes = stack.routes().unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].keyword, "generic");
        assert_eq!(
            stack.route_config("routeId1", 0).unwrap().param_str("dispatcher"),
            Some("log")
        );
    }

    #[test]
    fn test_round_trip_json() {
        let stack = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&stack).unwrap();
        let stack2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(stack.routes().unwrap(), stack2.routes().unwrap());
    }

    #[test]
    fn test_round_trip_toml() {
        let stack = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let toml = ConfigLoader::to_toml(&stack).unwrap();
        let stack2 = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(
            stack.route_config("routeId1", 0).unwrap(),
            stack2.route_config("routeId1", 0).unwrap()
        );
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = MINIMAL_TOML.replace("data = \"mapperGroupId1\"", "data = \"missing\"");
        let result = ConfigLoader::load_from_str(&content, ConfigFormat::Toml);
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[test]
    fn test_includes_are_lower_precedence() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.toml"), MINIMAL_TOML).unwrap();
        fs::write(
            dir.path().join("site.json"),
            r#"{ "includes": ["base.toml"], "distributor": { "async": true } }"#,
        )
        .unwrap();

        let stack = ConfigLoader::load_from_path(&dir.path().join("site.json")).unwrap();
        assert_eq!(stack.len(), 2);
        assert!(stack.settings().unwrap().run_async);
        assert!(stack.layers()[1].get("includes").is_none());
    }

    #[test]
    fn test_include_cycle_fails() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.toml"), "includes = [\"b.toml\"]").unwrap();
        fs::write(dir.path().join("b.toml"), "includes = [\"a.toml\"]").unwrap();

        let err = ConfigLoader::load_from_path(&dir.path().join("a.toml")).unwrap_err();
        assert!(err.to_string().contains("include cycle"), "got: {err}");
    }

    #[test]
    fn test_later_paths_override() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.toml"), MINIMAL_TOML).unwrap();
        fs::write(
            dir.path().join("b.toml"),
            "[distributor.routes.routeId1.config]\nenabled = false\n",
        )
        .unwrap();

        let stack = ConfigLoader::load_from_paths(&[
            dir.path().join("a.toml"),
            dir.path().join("b.toml"),
        ])
        .unwrap();
        assert!(!stack.route_config("routeId1", 0).unwrap().enabled);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = ConfigLoader::load_from_path(Path::new("config.yaml")).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }
}
