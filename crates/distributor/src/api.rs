//! Submission intake - named end points and the submission handler

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::{info, instrument};
use validator::Validate;

use config_loader::{ConfigFormat, ConfigLoader};
use contracts::{
    ConfigurationStack, Context, Data, DistributorError, EndPoint, Job, JobQueue, Submission,
};

use crate::distributor::{DistributionOptions, Distributor};
use crate::queue::MemoryQueue;

/// Directory of named end points
#[derive(Debug, Default)]
pub struct EndPointStorage {
    end_points: RwLock<BTreeMap<String, EndPoint>>,
}

impl EndPointStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage seeded with the `endpoints` of a configuration
    pub fn from_configuration(configuration: &ConfigurationStack) -> Result<Self, DistributorError> {
        let storage = Self::new();
        for end_point in configuration.end_points()? {
            storage.add(end_point)?;
        }
        Ok(storage)
    }

    /// Register a new end point
    ///
    /// # Errors
    /// Invalid end point or name already taken
    pub fn add(&self, end_point: EndPoint) -> Result<(), DistributorError> {
        validate_end_point(&end_point)?;
        let mut end_points = self.write();
        if end_points.contains_key(&end_point.name) {
            return Err(DistributorError::config_validation(
                "endpoints",
                format!("end point '{}' already exists", end_point.name),
            ));
        }
        end_points.insert(end_point.name.clone(), end_point);
        Ok(())
    }

    /// Replace an existing end point
    pub fn update(&self, end_point: EndPoint) -> Result<(), DistributorError> {
        validate_end_point(&end_point)?;
        let mut end_points = self.write();
        match end_points.get_mut(&end_point.name) {
            Some(existing) => {
                *existing = end_point;
                Ok(())
            }
            None => Err(DistributorError::EndPointNotFound {
                name: end_point.name,
            }),
        }
    }

    pub fn remove(&self, name: &str) -> Option<EndPoint> {
        self.write().remove(name)
    }

    pub fn get_by_name(&self, name: &str) -> Option<EndPoint> {
        self.read().get(name).cloned()
    }

    /// All end points, by name
    pub fn all(&self) -> Vec<EndPoint> {
        self.read().values().cloned().collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, EndPoint>> {
        self.end_points
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, EndPoint>> {
        self.end_points
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn validate_end_point(end_point: &EndPoint) -> Result<(), DistributorError> {
    end_point
        .validate()
        .map_err(|e| DistributorError::config_validation("endpoints", e.to_string()))
}

/// Builds submissions and hands them to the distributor
pub struct SubmissionHandler<D, T = MemoryQueue> {
    distributor: Arc<Distributor<D, T>>,
    end_points: EndPointStorage,
    /// Layers placed below every end point document
    base_configuration: ConfigurationStack,
}

impl<D: JobQueue, T: JobQueue> SubmissionHandler<D, T> {
    pub fn new(distributor: Arc<Distributor<D, T>>, end_points: EndPointStorage) -> Self {
        Self {
            distributor,
            end_points,
            base_configuration: ConfigurationStack::default(),
        }
    }

    /// Global layers that end point documents override
    pub fn with_base_configuration(mut self, configuration: ConfigurationStack) -> Self {
        self.base_configuration = configuration;
        self
    }

    pub fn end_points(&self) -> &EndPointStorage {
        &self.end_points
    }

    pub fn distributor(&self) -> &Arc<Distributor<D, T>> {
        &self.distributor
    }

    /// Distribute `data` with an explicit configuration
    pub async fn submit(
        &self,
        configuration: ConfigurationStack,
        data: Data,
    ) -> Result<Vec<Job>, DistributorError> {
        self.submit_with_context(configuration, data, Context::new())
            .await
    }

    /// Distribute `data` with an explicit configuration and initial context
    pub async fn submit_with_context(
        &self,
        configuration: ConfigurationStack,
        data: Data,
        context: Context,
    ) -> Result<Vec<Job>, DistributorError> {
        let submission = Submission::new(data, configuration).with_context(context);
        self.distributor.distribute(submission).await
    }

    /// Distribute `data` through an end point
    ///
    /// Caller context is only kept when the end point allows overrides.
    ///
    /// # Errors
    /// `EndPointNotFound` for a disabled end point, configuration errors for
    /// an unreadable document.
    #[instrument(name = "submit_to_end_point", skip(self, end_point, data, context), fields(end_point = %end_point.name))]
    pub async fn submit_to_end_point(
        &self,
        end_point: &EndPoint,
        data: Data,
        context: Context,
    ) -> Result<Vec<Job>, DistributorError> {
        if !end_point.enabled {
            return Err(DistributorError::EndPointNotFound {
                name: end_point.name.clone(),
            });
        }

        let mut configuration = self.base_configuration.clone();
        let document = end_point.configuration_document.trim();
        if !document.is_empty() {
            configuration.push(ConfigLoader::parse_document(
                document,
                ConfigFormat::sniff(document),
            )?);
        }

        let context = if end_point.allow_context_override {
            context
        } else {
            Context::new()
        };
        let submission = Submission::new(data, configuration).with_context(context);
        let options = DistributionOptions {
            skip_context: end_point.disable_context,
        };

        let jobs = self
            .distributor
            .distribute_with_options(submission, options)
            .await?;
        info!(jobs = jobs.len(), "End point submission distributed");
        Ok(jobs)
    }

    /// Distribute `data` through the end point registered as `name`
    pub async fn submit_to_end_point_by_name(
        &self,
        name: &str,
        data: Data,
        context: Context,
    ) -> Result<Vec<Job>, DistributorError> {
        let end_point = self
            .end_points
            .get_by_name(name)
            .ok_or_else(|| DistributorError::EndPointNotFound {
                name: name.to_string(),
            })?;
        self.submit_to_end_point(&end_point, data, context).await
    }

    /// Names of the enabled end points
    pub fn end_point_names(&self) -> Vec<String> {
        self.end_points
            .all()
            .into_iter()
            .filter(|end_point| end_point.enabled)
            .map(|end_point| end_point.name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::testing::{SpyDispatcher, SpyQueue};
    use contracts::{DataDispatcher, FieldValue, JobStatus};
    use queue_data::QueueDataFactory;

    const DOCUMENT: &str = r#"
[distributor]
enableStorage = false

[distributor.routes.routeId1]
type = "generic"
weight = 1

[distributor.routes.routeId1.config]
enabled = true
data = "passthrough"
dispatcher = "spy"
context = { channel = "endpoint" }

[dataProcessing.dataMapperGroups.passthrough]
passthroughFields = true
"#;

    fn handler(spy: &Arc<SpyDispatcher>) -> SubmissionHandler<SpyQueue, SpyQueue> {
        let registry = Registry::builder()
            .dispatcher(Arc::clone(spy) as Arc<dyn DataDispatcher>)
            .with_builtins()
            .build();
        let distributor = Distributor::new(
            Arc::new(registry),
            SpyQueue::new("durable"),
            SpyQueue::new("transient"),
        );

        let storage = EndPointStorage::new();
        storage.add(EndPoint::new("contact", DOCUMENT)).unwrap();
        let mut disabled = EndPoint::new("archive", DOCUMENT);
        disabled.enabled = false;
        storage.add(disabled).unwrap();

        SubmissionHandler::new(Arc::new(distributor), storage)
    }

    fn data() -> Data {
        [("field1", FieldValue::from("value1"))].into_iter().collect()
    }

    fn caller_context() -> Context {
        [("ip", "127.0.0.1")].into_iter().collect()
    }

    #[test]
    fn test_storage_crud() {
        let storage = EndPointStorage::new();
        storage.add(EndPoint::new("contact", "")).unwrap();
        assert!(storage.add(EndPoint::new("contact", "")).is_err());
        assert!(storage.add(EndPoint::new("", "")).is_err());

        let mut updated = EndPoint::new("contact", "{}");
        updated.disable_context = true;
        storage.update(updated.clone()).unwrap();
        assert_eq!(storage.get_by_name("contact"), Some(updated));
        assert!(storage.update(EndPoint::new("missing", "")).is_err());

        assert!(storage.remove("contact").is_some());
        assert!(storage.all().is_empty());
    }

    #[test]
    fn test_storage_from_configuration() {
        let configuration = ConfigurationStack::single(serde_json::json!({
            "endpoints": [{ "name": "contact", "enabled": true }, { "name": "newsletter" }]
        }));
        let storage = EndPointStorage::from_configuration(&configuration).unwrap();
        assert_eq!(storage.all().len(), 2);
        assert!(!storage.get_by_name("newsletter").unwrap().enabled);
    }

    #[test]
    fn test_end_point_names_lists_enabled_only() {
        let spy = Arc::new(SpyDispatcher::new("spy"));
        assert_eq!(handler(&spy).end_point_names(), vec!["contact".to_string()]);
    }

    #[tokio::test]
    async fn test_submit_to_end_point_by_name() {
        let spy = Arc::new(SpyDispatcher::new("spy"));
        let handler = handler(&spy);

        let jobs = handler
            .submit_to_end_point_by_name("contact", data(), caller_context())
            .await
            .unwrap();

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Done);
        assert_eq!(spy.sent()[0]["field1"], serde_json::json!("value1"));

        // caller context dropped, route context added
        let stored = QueueDataFactory::new().to_submission(&jobs[0]).unwrap();
        assert_eq!(stored.context.get("ip"), None);
        assert_eq!(stored.context.get_str("channel"), Some("endpoint"));
    }

    #[tokio::test]
    async fn test_end_point_context_flags() {
        let spy = Arc::new(SpyDispatcher::new("spy"));
        let handler = handler(&spy);
        let mut end_point = EndPoint::new("custom", DOCUMENT);
        end_point.allow_context_override = true;
        end_point.disable_context = true;

        let jobs = handler
            .submit_to_end_point(&end_point, data(), caller_context())
            .await
            .unwrap();

        let stored = QueueDataFactory::new().to_submission(&jobs[0]).unwrap();
        assert_eq!(stored.context.get_str("ip"), Some("127.0.0.1"));
        assert_eq!(stored.context.get("channel"), None);
    }

    #[tokio::test]
    async fn test_disabled_or_unknown_end_point() {
        let spy = Arc::new(SpyDispatcher::new("spy"));
        let handler = handler(&spy);

        for name in ["archive", "missing"] {
            let err = handler
                .submit_to_end_point_by_name(name, data(), Context::new())
                .await
                .unwrap_err();
            assert!(matches!(err, DistributorError::EndPointNotFound { .. }));
        }
        assert!(spy.sent().is_empty());
    }

    #[tokio::test]
    async fn test_submit_with_explicit_configuration() {
        let spy = Arc::new(SpyDispatcher::new("spy"));
        let handler = handler(&spy);
        let configuration = ConfigurationStack::single(
            ConfigLoader::parse_document(DOCUMENT, ConfigFormat::Toml).unwrap(),
        );

        let jobs = handler.submit(configuration, data()).await.unwrap();
        assert_eq!(jobs[0].status, JobStatus::Done);
        assert_eq!(handler.distributor().transient_queue().count("mark_as_done"), 1);
    }
}
