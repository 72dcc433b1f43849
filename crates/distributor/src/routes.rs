//! Built-in outbound routes

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{Context, DataDispatcher, DistributorError, OutboundRoute, RouteConfig};

/// Route delivering to one of the registered dispatchers
///
/// The dispatcher is picked by the route config's `dispatcher` key. A
/// `context` table in the route config is added to the submission context.
#[derive(Clone, Default)]
pub struct GenericRoute {
    dispatchers: HashMap<String, Arc<dyn DataDispatcher>>,
}

impl GenericRoute {
    pub const KEYWORD: &'static str = "generic";

    pub fn new(dispatchers: HashMap<String, Arc<dyn DataDispatcher>>) -> Self {
        Self { dispatchers }
    }

    /// Names of the dispatchers this route can deliver to
    pub fn dispatcher_names(&self) -> impl Iterator<Item = &str> {
        self.dispatchers.keys().map(String::as_str)
    }
}

impl OutboundRoute for GenericRoute {
    fn keyword(&self) -> &str {
        Self::KEYWORD
    }

    fn add_context(&self, context: &mut Context, config: &RouteConfig) {
        if let Some(serde_json::Value::Object(entries)) = config.params.get("context") {
            for (key, value) in entries {
                context.set(key.clone(), value.clone());
            }
        }
    }

    fn dispatcher(&self, config: &RouteConfig) -> Result<Arc<dyn DataDispatcher>, DistributorError> {
        let name = config.param_str("dispatcher").unwrap_or_default();
        if name.is_empty() {
            return Err(DistributorError::configuration(format!(
                "No dispatcher defined for outbound route \"{}\".",
                Self::KEYWORD
            )));
        }
        self.dispatchers.get(name).cloned().ok_or_else(|| {
            DistributorError::configuration(format!(
                "Dispatcher \"{name}\" not found for outbound route \"{}\".",
                Self::KEYWORD
            ))
        })
    }
}
