//! Route pipeline - one route × pass execution
//!
//! ```text
//! enabled? ─no─▶ skipped
//!    │
//! gate? ───false─▶ skipped
//!    │
//! enrichment (route-scoped data providers)
//!    │
//! data build (mapper group) ─empty─▶ error
//!    │
//! dispatch
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, instrument, warn};

use contracts::{
    Data, DataProvider, DataProviderConfig, DistributorError, RouteConfig, RouteDescriptor,
    Submission, ALL_DATA_PROVIDERS,
};
use observability::{record_dispatch, record_route_outcome, RouteOutcome};
use queue_data::QueueDataFactory;

use crate::provider::merge_provided_fields;
use crate::registry::Registry;

type CacheSlot = Arc<OnceCell<Data>>;

/// Memoized provider output, keyed by the cache key of the submission the
/// provider sees and the provider keyword
///
/// One cache spans the jobs of a distribution (or a queue sweep), so passes
/// and routes of the same submission share enrichment work. The map lock is
/// only held for slot lookup; concurrent misses on one key call the
/// provider once.
#[derive(Debug, Default)]
pub struct EnrichmentCache {
    entries: Mutex<HashMap<(String, String), CacheSlot>>,
}

impl EnrichmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of filled entries
    pub async fn len(&self) -> usize {
        self.entries
            .lock()
            .await
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    /// Cached fields of `provider`, calling it on a miss
    async fn provide(
        &self,
        cache_key: &str,
        provider: &dyn DataProvider,
        submission: &Submission,
        config: &DataProviderConfig,
    ) -> Result<Data, DistributorError> {
        let slot = {
            let mut entries = self.entries.lock().await;
            Arc::clone(
                entries
                    .entry((cache_key.to_string(), provider.keyword().to_string()))
                    .or_default(),
            )
        };
        if let Some(fields) = slot.get() {
            debug!(provider = provider.keyword(), "Enrichment cache hit");
            return Ok(fields.clone());
        }
        let fields = slot
            .get_or_try_init(|| provider.provide_fields(submission, config))
            .await?;
        Ok(fields.clone())
    }
}

/// Executes single route passes against the registry's plugins
#[derive(Clone)]
pub struct RoutePipeline {
    registry: Arc<Registry>,
    factory: QueueDataFactory,
}

impl RoutePipeline {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            factory: QueueDataFactory::new(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Run one route pass
    ///
    /// Returns `true` when data was dispatched, `false` when the route is
    /// disabled or its gate does not pass.
    ///
    /// # Errors
    /// Configuration errors (mapper group, dispatcher), empty output and
    /// delivery errors.
    #[instrument(name = "route_process", skip(self, submission, cache))]
    pub async fn process(
        &self,
        submission: &mut Submission,
        route_id: &str,
        pass: usize,
        cache: &EnrichmentCache,
    ) -> Result<bool, DistributorError> {
        let result = self.run(submission, route_id, pass, cache).await;
        let outcome = match &result {
            Ok(true) => RouteOutcome::Dispatched,
            Ok(false) => RouteOutcome::Skipped,
            Err(_) => RouteOutcome::Failed,
        };
        record_route_outcome(route_id, outcome);
        result
    }

    async fn run(
        &self,
        submission: &mut Submission,
        route_id: &str,
        pass: usize,
        cache: &EnrichmentCache,
    ) -> Result<bool, DistributorError> {
        let route = submission.configuration.route(route_id)?;
        let config = submission.configuration.route_config(route_id, pass)?;

        if !config.enabled {
            debug!(
                "Route \"{}\" with ID {} is disabled.",
                route.keyword, route.route_id
            );
            return Ok(false);
        }

        if let Some(gate) = config.gate_condition() {
            let processor = self.registry.data_processor();
            let context = processor.build_context(submission);
            if !self.registry.condition_evaluator().evaluate(gate, &context)? {
                debug!(
                    "Gate not passed for route \"{}\" with ID {}.",
                    route.keyword, route.route_id
                );
                return Ok(false);
            }
        }

        self.enrich(submission, &config, cache).await?;

        let data = self.build_data(submission, &route, &config)?;
        if data.is_empty() {
            return Err(DistributorError::empty_data(&route.keyword, &route.route_id));
        }

        self.dispatch(&route, &config, &data).await?;
        Ok(true)
    }

    /// Apply the route's data providers that are also enabled globally
    async fn enrich(
        &self,
        submission: &mut Submission,
        config: &RouteConfig,
        cache: &EnrichmentCache,
    ) -> Result<(), DistributorError> {
        let providers = self.route_providers(config);
        if providers.is_empty() {
            return Ok(());
        }

        for provider in providers {
            let provider_config = submission
                .configuration
                .data_provider_config(provider.keyword())?;
            if !provider_config.enabled {
                continue;
            }

            // keyed on the data as merged so far, earlier providers differ per route
            let cache_key = self.factory.cache_key(submission);
            let provided = cache
                .provide(&cache_key, provider.as_ref(), submission, &provider_config)
                .await?;
            let written = merge_provided_fields(&mut submission.data, provided, &provider_config);
            debug!(provider = provider.keyword(), written, "Data provider applied");
        }
        Ok(())
    }

    /// Providers selected by `enableDataProviders`, in application order
    fn route_providers(&self, config: &RouteConfig) -> Vec<Arc<dyn DataProvider>> {
        if config
            .enable_data_providers
            .iter()
            .any(|term| term == ALL_DATA_PROVIDERS)
        {
            return self.registry.data_providers().to_vec();
        }

        config
            .enable_data_providers
            .iter()
            .filter_map(|keyword| match self.registry.data_provider(keyword) {
                Some(provider) => Some(Arc::clone(provider)),
                None => {
                    warn!(provider = %keyword, "Data provider not registered");
                    None
                }
            })
            .collect()
    }

    fn build_data(
        &self,
        submission: &Submission,
        route: &RouteDescriptor,
        config: &RouteConfig,
    ) -> Result<Data, DistributorError> {
        if config.data.is_empty() {
            return Err(DistributorError::no_data_mapper_group_defined(
                &route.keyword,
                &route.route_id,
            ));
        }

        let group = submission
            .configuration
            .data_mapper_group(&config.data)
            .ok_or_else(|| {
                DistributorError::data_mapper_group_not_found(
                    &config.data,
                    &route.keyword,
                    &route.route_id,
                )
            })?;

        let processor = self.registry.data_processor();
        let context = processor.build_context(submission);
        processor.apply_mapper_group(&group, &context)
    }

    async fn dispatch(
        &self,
        route: &RouteDescriptor,
        config: &RouteConfig,
        data: &Data,
    ) -> Result<(), DistributorError> {
        let outbound = self
            .registry
            .route(&route.keyword)
            .ok_or_else(|| DistributorError::UnknownRoute {
                keyword: route.keyword.clone(),
                route_id: route.route_id.clone(),
            })?;
        let dispatcher = outbound.dispatcher(config)?;

        let fields = data.to_fields();
        let started = Instant::now();
        let result = dispatcher.send(&fields).await;
        record_dispatch(
            dispatcher.keyword(),
            result.is_ok(),
            started.elapsed().as_secs_f64() * 1000.0,
        );
        result?;

        info!(
            route_id = %route.route_id,
            keyword = %route.keyword,
            dispatcher = dispatcher.keyword(),
            fields = fields.len(),
            "Route data dispatched"
        );
        Ok(())
    }
}
