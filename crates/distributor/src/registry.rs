//! Plugin registry - keyword lookup of routes, data providers and dispatchers
//!
//! Built once at startup with `RegistryBuilder`, read-only afterwards and
//! shared by every distribution through an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use contracts::{ConditionEvaluator, DataDispatcher, DataProcessor, DataProvider, OutboundRoute};
use dispatcher::DispatcherSet;

use crate::processor::SimpleDataProcessor;
use crate::provider::StaticDataProvider;
use crate::routes::GenericRoute;

/// Read-only plugin directory
pub struct Registry {
    routes: HashMap<String, Arc<dyn OutboundRoute>>,
    /// Registration order is the order of `enableDataProviders = ["all"]`
    data_providers: Vec<Arc<dyn DataProvider>>,
    dispatchers: HashMap<String, Arc<dyn DataDispatcher>>,
    condition_evaluator: Arc<dyn ConditionEvaluator>,
    data_processor: Arc<dyn DataProcessor>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Route registered for an integration keyword
    pub fn route(&self, keyword: &str) -> Option<&Arc<dyn OutboundRoute>> {
        self.routes.get(keyword)
    }

    pub fn route_keywords(&self) -> Vec<&str> {
        let mut keywords: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        keywords.sort_unstable();
        keywords
    }

    pub fn data_provider(&self, keyword: &str) -> Option<&Arc<dyn DataProvider>> {
        self.data_providers
            .iter()
            .find(|provider| provider.keyword() == keyword)
    }

    /// All data providers, in registration order
    pub fn data_providers(&self) -> &[Arc<dyn DataProvider>] {
        &self.data_providers
    }

    pub fn dispatcher(&self, name: &str) -> Option<&Arc<dyn DataDispatcher>> {
        self.dispatchers.get(name)
    }

    pub fn condition_evaluator(&self) -> &dyn ConditionEvaluator {
        self.condition_evaluator.as_ref()
    }

    pub fn data_processor(&self) -> &dyn DataProcessor {
        self.data_processor.as_ref()
    }
}

/// Builder for `Registry`
///
/// Later registrations under the same keyword replace earlier ones.
#[derive(Default)]
pub struct RegistryBuilder {
    routes: HashMap<String, Arc<dyn OutboundRoute>>,
    data_providers: Vec<Arc<dyn DataProvider>>,
    dispatchers: HashMap<String, Arc<dyn DataDispatcher>>,
    condition_evaluator: Option<Arc<dyn ConditionEvaluator>>,
    data_processor: Option<Arc<dyn DataProcessor>>,
    builtins: bool,
}

impl RegistryBuilder {
    pub fn route(mut self, route: Arc<dyn OutboundRoute>) -> Self {
        self.routes.insert(route.keyword().to_string(), route);
        self
    }

    pub fn data_provider(mut self, provider: Arc<dyn DataProvider>) -> Self {
        self.data_providers
            .retain(|existing| existing.keyword() != provider.keyword());
        self.data_providers.push(provider);
        self
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn DataDispatcher>) -> Self {
        self.dispatchers
            .insert(dispatcher.keyword().to_string(), dispatcher);
        self
    }

    /// Register every dispatcher of a configured set
    pub fn dispatchers(mut self, set: &DispatcherSet) -> Self {
        for dispatcher in set.iter() {
            self = self.dispatcher(dispatcher);
        }
        self
    }

    pub fn condition_evaluator(mut self, evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        self.condition_evaluator = Some(evaluator);
        self
    }

    pub fn data_processor(mut self, processor: Arc<dyn DataProcessor>) -> Self {
        self.data_processor = Some(processor);
        self
    }

    /// Add `GenericRoute` (over the registered dispatchers) and
    /// `StaticDataProvider` unless their keywords are already taken
    pub fn with_builtins(mut self) -> Self {
        self.builtins = true;
        self
    }

    pub fn build(mut self) -> Registry {
        if self.builtins {
            if !self.routes.contains_key(GenericRoute::KEYWORD) {
                let route = GenericRoute::new(self.dispatchers.clone());
                self.routes
                    .insert(GenericRoute::KEYWORD.to_string(), Arc::new(route));
            }
            if !self
                .data_providers
                .iter()
                .any(|provider| provider.keyword() == StaticDataProvider::KEYWORD)
            {
                self.data_providers.push(Arc::new(StaticDataProvider::new()));
            }
        }

        let simple = Arc::new(SimpleDataProcessor::new());
        let registry = Registry {
            routes: self.routes,
            data_providers: self.data_providers,
            dispatchers: self.dispatchers,
            condition_evaluator: self
                .condition_evaluator
                .unwrap_or_else(|| simple.clone() as Arc<dyn ConditionEvaluator>),
            data_processor: self
                .data_processor
                .unwrap_or_else(|| simple as Arc<dyn DataProcessor>),
        };

        for keyword in registry.route_keywords() {
            debug!(keyword, "Route registered");
        }
        info!(
            routes = registry.routes.len(),
            data_providers = registry.data_providers.len(),
            dispatchers = registry.dispatchers.len(),
            "Registry built"
        );
        registry
    }
}
