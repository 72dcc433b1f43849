//! ConfigurationStack - layered configuration documents
//!
//! Layers are kept as parsed documents and merged lazily on lookup: later
//! layers override earlier ones key by key, non-object values replace.
//! Typed accessors expose the slices each concern needs (distributor
//! settings, route / pass config, mapper groups, conditions, providers).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::Range;

use crate::{DistributorError, EndPoint};

/// Term in `enableDataProviders` that enables every provider
pub const ALL_DATA_PROVIDERS: &str = "all";

const KEY_DISTRIBUTOR: &str = "distributor";
const KEY_ROUTES: &str = "routes";
const KEY_DATA_PROVIDERS: &str = "dataProviders";
const KEY_DISPATCHERS: &str = "dispatchers";
const KEY_DATA_PROCESSING: &str = "dataProcessing";
const KEY_DATA_MAPPER_GROUPS: &str = "dataMapperGroups";
const KEY_CONDITIONS: &str = "conditions";
const KEY_ENDPOINTS: &str = "endpoints";

/// Ordered stack of configuration documents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigurationStack(Vec<Value>);

impl ConfigurationStack {
    pub fn new(layers: Vec<Value>) -> Self {
        Self(layers)
    }

    /// Stack made of one document
    pub fn single(layer: Value) -> Self {
        Self(vec![layer])
    }

    /// Push a layer with the highest precedence
    pub fn push(&mut self, layer: Value) {
        self.0.push(layer);
    }

    pub fn layers(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merged value at `path`
    pub fn get(&self, path: &[&str]) -> Option<Value> {
        let mut merged: Option<Value> = None;
        for layer in &self.0 {
            let Some(found) = lookup(layer, path) else {
                continue;
            };
            match merged.as_mut() {
                Some(current) => merge_values(current, found),
                None => merged = Some(found.clone()),
            }
        }
        merged
    }

    /// Global distributor settings (`async`, `enableStorage`)
    pub fn settings(&self) -> Result<DistributorSettings, DistributorError> {
        match self.get(&[KEY_DISTRIBUTOR]) {
            Some(value) => serde_json::from_value(value).map_err(|e| {
                DistributorError::configuration(format!("invalid distributor settings: {e}"))
            }),
            None => Ok(DistributorSettings::default()),
        }
    }

    /// All configured routes, ascending by weight; ties keep declaration order
    pub fn routes(&self) -> Result<Vec<RouteDescriptor>, DistributorError> {
        let Some(Value::Object(routes)) = self.get(&[KEY_DISTRIBUTOR, KEY_ROUTES]) else {
            return Ok(Vec::new());
        };

        let mut descriptors = Vec::with_capacity(routes.len());
        for (route_id, entry) in routes {
            let entry = parse_route_entry(&route_id, entry)?;
            descriptors.push(RouteDescriptor {
                route_id,
                keyword: entry.keyword,
                weight: entry.weight,
                pass_count: entry.passes.len().max(1),
            });
        }
        // sort_by_key is stable
        descriptors.sort_by_key(|route| route.weight);
        Ok(descriptors)
    }

    /// Descriptor of one route
    pub fn route(&self, route_id: &str) -> Result<RouteDescriptor, DistributorError> {
        let entry = self.route_entry(route_id)?;
        Ok(RouteDescriptor {
            route_id: route_id.to_string(),
            keyword: entry.keyword,
            weight: entry.weight,
            pass_count: entry.passes.len().max(1),
        })
    }

    /// Configuration slice of a route for one pass
    ///
    /// The pass slice is the route `config` merged with `passes[pass]`.
    pub fn route_config(&self, route_id: &str, pass: usize) -> Result<RouteConfig, DistributorError> {
        let entry = self.route_entry(route_id)?;
        let pass_count = entry.passes.len().max(1);
        if pass >= pass_count {
            return Err(DistributorError::configuration(format!(
                "Route with ID {route_id} has no pass {pass} ({pass_count} declared)."
            )));
        }

        let mut config = Value::Object(entry.config);
        if let Some(overrides) = entry.passes.get(pass) {
            merge_values(&mut config, &Value::Object(overrides.clone()));
        }

        serde_json::from_value(config).map_err(|e| {
            DistributorError::configuration(format!(
                "invalid configuration for route ID {route_id}, pass {pass}: {e}"
            ))
        })
    }

    /// Data mapper group definition
    pub fn data_mapper_group(&self, group_id: &str) -> Option<Value> {
        self.get(&[KEY_DATA_PROCESSING, KEY_DATA_MAPPER_GROUPS, group_id])
    }

    /// Named condition definition (for `reference` conditions)
    pub fn condition(&self, condition_id: &str) -> Option<Value> {
        self.get(&[KEY_DATA_PROCESSING, KEY_CONDITIONS, condition_id])
    }

    /// Keywords of all configured data providers, in declaration order
    pub fn data_provider_keywords(&self) -> Vec<String> {
        match self.get(&[KEY_DISTRIBUTOR, KEY_DATA_PROVIDERS]) {
            Some(Value::Object(providers)) => providers.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Configuration of one data provider; unconfigured providers are disabled
    pub fn data_provider_config(&self, keyword: &str) -> Result<DataProviderConfig, DistributorError> {
        match self.get(&[KEY_DISTRIBUTOR, KEY_DATA_PROVIDERS, keyword]) {
            Some(value) => serde_json::from_value(value).map_err(|e| {
                DistributorError::configuration(format!(
                    "invalid configuration for data provider \"{keyword}\": {e}"
                ))
            }),
            None => Ok(DataProviderConfig::default()),
        }
    }

    /// Named dispatcher instances (`distributor.dispatchers`), in declaration order
    pub fn dispatchers(&self) -> Result<Vec<DispatcherConfig>, DistributorError> {
        let Some(Value::Object(dispatchers)) = self.get(&[KEY_DISTRIBUTOR, KEY_DISPATCHERS]) else {
            return Ok(Vec::new());
        };
        dispatchers
            .into_iter()
            .map(|(name, entry)| {
                let mut config: DispatcherConfig = serde_json::from_value(entry).map_err(|e| {
                    DistributorError::configuration(format!(
                        "invalid configuration for dispatcher \"{name}\": {e}"
                    ))
                })?;
                config.name = name;
                Ok(config)
            })
            .collect()
    }

    /// Named submission end points
    pub fn end_points(&self) -> Result<Vec<EndPoint>, DistributorError> {
        match self.get(&[KEY_ENDPOINTS]) {
            Some(value) => serde_json::from_value(value).map_err(|e| {
                DistributorError::configuration(format!("invalid end point list: {e}"))
            }),
            None => Ok(Vec::new()),
        }
    }

    fn route_entry(&self, route_id: &str) -> Result<RouteEntry, DistributorError> {
        let entry = self
            .get(&[KEY_DISTRIBUTOR, KEY_ROUTES, route_id])
            .ok_or_else(|| {
                DistributorError::configuration(format!(
                    "No route configuration found for route ID {route_id}."
                ))
            })?;
        parse_route_entry(route_id, entry)
    }
}

/// Recursively merge `overlay` into `target`
pub fn merge_values(target: &mut Value, overlay: &Value) {
    match (target, overlay) {
        (Value::Object(target), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match target.get_mut(key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, overlay) => *target = overlay.clone(),
    }
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

fn parse_route_entry(route_id: &str, entry: Value) -> Result<RouteEntry, DistributorError> {
    serde_json::from_value(entry).map_err(|e| {
        DistributorError::configuration(format!("invalid route entry for route ID {route_id}: {e}"))
    })
}

fn default_true() -> bool {
    true
}

fn default_enabled_data_providers() -> Vec<String> {
    vec![ALL_DATA_PROVIDERS.to_string()]
}

/// Raw route entry inside `distributor.routes`
#[derive(Debug, Deserialize)]
struct RouteEntry {
    #[serde(rename = "type", default)]
    keyword: String,
    #[serde(default)]
    weight: i64,
    #[serde(default)]
    config: Map<String, Value>,
    #[serde(default)]
    passes: Vec<Map<String, Value>>,
}

/// Global distributor settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributorSettings {
    /// Defer job execution to a later queue sweep
    #[serde(rename = "async", default)]
    pub run_async: bool,

    /// Use the durable queue instead of the transient one
    #[serde(default = "default_true")]
    pub enable_storage: bool,
}

impl DistributorSettings {
    /// Settings for one route pass: route values override, absent ones inherit
    pub fn for_route(&self, route: &RouteConfig) -> Self {
        Self {
            run_async: route.run_async.unwrap_or(self.run_async),
            enable_storage: route.enable_storage.unwrap_or(self.enable_storage),
        }
    }
}

impl Default for DistributorSettings {
    fn default() -> Self {
        Self {
            run_async: false,
            enable_storage: true,
        }
    }
}

/// Identity of one configured route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    /// Route id (key in `distributor.routes`)
    pub route_id: String,
    /// Integration keyword (`type`)
    pub keyword: String,
    /// Ordering weight, ascending
    pub weight: i64,
    /// Number of declared passes, at least 1
    pub pass_count: usize,
}

impl RouteDescriptor {
    /// Pass indices of this route
    pub fn passes(&self) -> Range<usize> {
        0..self.pass_count
    }
}

/// Resolved configuration of one route pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Gate condition; absent or empty means "always pass"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<Value>,

    /// Data mapper group id
    #[serde(default)]
    pub data: String,

    /// Route-scoped data provider selection
    #[serde(default = "default_enabled_data_providers")]
    pub enable_data_providers: Vec<String>,

    /// Overrides `distributor.async`; absent or null inherits
    #[serde(rename = "async", default, skip_serializing_if = "Option::is_none")]
    pub run_async: Option<bool>,

    /// Overrides `distributor.enableStorage`; absent or null inherits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_storage: Option<bool>,

    /// Integration specific parameters
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            gate: None,
            data: String::new(),
            enable_data_providers: default_enabled_data_providers(),
            run_async: None,
            enable_storage: None,
            params: Map::new(),
        }
    }
}

impl RouteConfig {
    /// Gate condition if one is configured
    pub fn gate_condition(&self) -> Option<&Value> {
        match &self.gate {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) if map.is_empty() => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(gate) => Some(gate),
        }
    }

    /// Whether the route allows the given data provider
    pub fn data_provider_enabled(&self, keyword: &str) -> bool {
        self.enable_data_providers
            .iter()
            .any(|term| term == ALL_DATA_PROVIDERS || term == keyword)
    }

    /// String parameter
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

/// Configuration of one data provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataProviderConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Only fill fields that already exist
    #[serde(default)]
    pub must_exist: bool,

    /// Only fill fields that are empty
    #[serde(default = "default_true")]
    pub must_be_empty: bool,

    /// Provider specific parameters
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl Default for DataProviderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            must_exist: false,
            must_be_empty: true,
            params: Map::new(),
        }
    }
}

/// Built-in dispatcher kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatcherType {
    /// Log the fields
    Log,
    /// Append JSON lines to a file
    File,
    /// UDP datagrams
    Udp,
}

/// One configured dispatcher instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Instance name, referenced by routes
    #[serde(default)]
    pub name: String,

    #[serde(rename = "type")]
    pub dispatcher_type: DispatcherType,

    /// Type specific parameters
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl DispatcherConfig {
    /// String parameter
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stack() -> ConfigurationStack {
        ConfigurationStack::new(vec![
            json!({
                "distributor": {
                    "routes": {
                        "routeB": { "type": "generic", "weight": 20, "config": { "enabled": true, "data": "g1" } },
                        "routeA": { "type": "generic", "weight": 10, "config": { "enabled": false, "data": "g1" } },
                        "routeC": { "type": "generic", "weight": 20, "config": { "enabled": true, "data": "g1" },
                                    "passes": [{ "data": "g2" }, { "data": "g3" }] }
                    }
                }
            }),
            json!({
                "distributor": {
                    "async": true,
                    "routes": { "routeA": { "config": { "enabled": true } } }
                }
            }),
        ])
    }

    #[test]
    fn test_later_layer_overrides() {
        let config = stack().route_config("routeA", 0).unwrap();
        assert!(config.enabled);
        assert_eq!(config.data, "g1");
    }

    #[test]
    fn test_routes_sorted_by_weight_stable() {
        let ids: Vec<String> = stack()
            .routes()
            .unwrap()
            .into_iter()
            .map(|r| r.route_id)
            .collect();
        assert_eq!(ids, vec!["routeA", "routeB", "routeC"]);
    }

    #[test]
    fn test_pass_slices() {
        let stack = stack();
        assert_eq!(stack.route("routeC").unwrap().pass_count, 2);
        assert_eq!(stack.route_config("routeC", 1).unwrap().data, "g3");
        assert!(stack.route_config("routeC", 2).is_err());
        assert!(stack.route_config("missing", 0).is_err());
    }

    #[test]
    fn test_settings_defaults() {
        let settings = stack().settings().unwrap();
        assert!(settings.run_async);
        assert!(settings.enable_storage);
        assert_eq!(
            ConfigurationStack::default().settings().unwrap(),
            DistributorSettings::default()
        );
    }

    #[test]
    fn test_route_settings_inherit_or_override() {
        let stack = ConfigurationStack::single(json!({
            "distributor": {
                "async": false,
                "enableStorage": false,
                "routes": {
                    "inherits": { "type": "generic", "config": { "async": null } },
                    "deferred": { "type": "generic", "config": { "async": true },
                                  "passes": [{}, { "async": false, "enableStorage": true }] }
                }
            }
        }));
        let global = stack.settings().unwrap();

        let inherits = stack.route_config("inherits", 0).unwrap();
        assert_eq!(inherits.run_async, None);
        assert!(!inherits.params.contains_key("async"));
        assert_eq!(global.for_route(&inherits), global);

        let deferred = global.for_route(&stack.route_config("deferred", 0).unwrap());
        assert!(deferred.run_async);
        assert!(!deferred.enable_storage);

        let stored = global.for_route(&stack.route_config("deferred", 1).unwrap());
        assert!(!stored.run_async);
        assert!(stored.enable_storage);
    }

    #[test]
    fn test_empty_gate_is_no_gate() {
        let mut config = RouteConfig::default();
        assert!(config.gate_condition().is_none());
        config.gate = Some(json!({}));
        assert!(config.gate_condition().is_none());
        config.gate = Some(json!({ "type": "true" }));
        assert!(config.gate_condition().is_some());
    }

    #[test]
    fn test_dispatchers_take_their_key_as_name() {
        let stack = ConfigurationStack::single(json!({
            "distributor": { "dispatchers": {
                "audit": { "type": "file", "path": "audit.jsonl" },
                "console": { "type": "log" }
            } }
        }));
        let dispatchers = stack.dispatchers().unwrap();
        assert_eq!(dispatchers.len(), 2);
        assert_eq!(dispatchers[0].name, "audit");
        assert_eq!(dispatchers[0].dispatcher_type, DispatcherType::File);
        assert_eq!(dispatchers[0].param_str("path"), Some("audit.jsonl"));
        assert_eq!(dispatchers[1].dispatcher_type, DispatcherType::Log);
    }

    #[test]
    fn test_data_provider_selection() {
        let mut config = RouteConfig::default();
        assert!(config.data_provider_enabled("anything"));
        config.enable_data_providers = vec!["static".to_string()];
        assert!(config.data_provider_enabled("static"));
        assert!(!config.data_provider_enabled("other"));
    }
}
