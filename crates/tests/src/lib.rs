//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Contract round trips through the public codec / job factory
//! - Distribution scenarios from TOML configuration to dispatch
//! - File-backed dispatchers and the durable file queue

#[cfg(test)]
mod contract_tests {
    use contracts::{ConfigurationStack, Context, Data, FieldValue, FileReference, JobStatus, Submission};
    use queue_data::{decode_data, encode_data, QueueDataFactory};
    use serde_json::json;

    fn submission() -> Submission {
        let data: Data = [
            ("name", FieldValue::from("Jane")),
            ("topics", FieldValue::discrete_multi(["sales".into(), "support".into()])),
            (
                "cv",
                FieldValue::File(FileReference {
                    file_name: "cv.pdf".into(),
                    public_url: "https://example.org/cv.pdf".into(),
                    relative_path: "uploads/cv.pdf".into(),
                    mime_type: "application/pdf".into(),
                }),
            ),
        ]
        .into_iter()
        .collect();
        let context: Context = [("gdpr", "yes")].into_iter().collect();
        Submission::new(
            data,
            ConfigurationStack::new(vec![
                json!({ "distributor": { "async": false } }),
                json!({ "distributor": { "enableStorage": true } }),
            ]),
        )
        .with_context(context)
    }

    #[test]
    fn test_codec_round_trip_through_serde() {
        let original = submission();
        let encoded = encode_data(&original.data);
        let text = serde_json::to_string(&encoded).unwrap();
        let decoded = decode_data(&serde_json::from_str(&text).unwrap()).unwrap();
        assert_eq!(decoded, original.data);
    }

    #[test]
    fn test_job_round_trip_through_storage_format() {
        let factory = QueueDataFactory::new();
        let original = submission();
        let job = factory.to_job(&original, "routeId1", 1, JobStatus::Pending);

        let stored = serde_json::to_string(&job).unwrap();
        let restored_job: contracts::Job = serde_json::from_str(&stored).unwrap();
        let restored = factory.to_submission(&restored_job).unwrap();

        assert_eq!(restored, original);
        assert_eq!(factory.pass_of(&restored_job).unwrap(), 1);
        assert_eq!(factory.job_hash(&restored_job), factory.submission_hash(&original));
    }
}

#[cfg(test)]
mod e2e_tests {
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        ConfigurationStack, Data, DataDispatcher, DistributorError, FieldValue, Job, JobQueue,
        JobStatus, OutboundFields, QueueError, Submission,
    };
    use dispatcher::create_dispatchers;
    use distributor::{Distributor, FileQueue, MemoryQueue, Registry};
    use queue_data::QueueDataFactory;
    use serde_json::json;

    /// Dispatcher recording what it receives
    #[derive(Default)]
    struct RecordingDispatcher {
        sent: Mutex<Vec<OutboundFields>>,
    }

    impl RecordingDispatcher {
        fn sent(&self) -> Vec<OutboundFields> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DataDispatcher for RecordingDispatcher {
        fn keyword(&self) -> &str {
            "recorder"
        }

        async fn send(&self, fields: &OutboundFields) -> Result<(), DistributorError> {
            self.sent.lock().unwrap().push(fields.clone());
            Ok(())
        }
    }

    /// Queue wrapper counting the operations called on it
    struct CountingQueue<Q> {
        inner: Q,
        calls: Mutex<Vec<&'static str>>,
    }

    impl<Q> CountingQueue<Q> {
        fn new(inner: Q) -> Self {
            Self {
                inner,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn count(&self, operation: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|call| **call == operation)
                .count()
        }

        fn total(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn record(&self, operation: &'static str) {
            self.calls.lock().unwrap().push(operation);
        }
    }

    impl<Q: JobQueue + Sync> JobQueue for CountingQueue<Q> {
        fn name(&self) -> &str {
            self.inner.name()
        }

        async fn add_job(&self, job: Job) -> Result<Job, QueueError> {
            self.record("add_job");
            self.inner.add_job(job).await
        }

        async fn mark_list_as_pending(&self, jobs: &[Job]) -> Result<(), QueueError> {
            self.record("mark_list_as_pending");
            self.inner.mark_list_as_pending(jobs).await
        }

        async fn mark_as_running(&self, job: &Job) -> Result<(), QueueError> {
            self.record("mark_as_running");
            self.inner.mark_as_running(job).await
        }

        async fn mark_as_done(&self, job: &Job) -> Result<(), QueueError> {
            self.record("mark_as_done");
            self.inner.mark_as_done(job).await
        }

        async fn mark_as_failed(&self, job: &Job, message: &str) -> Result<(), QueueError> {
            self.record("mark_as_failed");
            self.inner.mark_as_failed(job, message).await
        }

        async fn fetch_pending(&self, limit: usize) -> Result<Vec<Job>, QueueError> {
            self.record("fetch_pending");
            self.inner.fetch_pending(limit).await
        }
    }

    type TestDistributor = Distributor<CountingQueue<FileQueue>, CountingQueue<MemoryQueue>>;

    async fn setup(queue_dir: &Path) -> (TestDistributor, Arc<RecordingDispatcher>) {
        let recorder = Arc::new(RecordingDispatcher::default());
        let registry = Registry::builder()
            .dispatcher(Arc::clone(&recorder) as Arc<dyn DataDispatcher>)
            .with_builtins()
            .build();
        let durable = FileQueue::open(queue_dir).await.unwrap();
        let distributor = Distributor::new(
            Arc::new(registry),
            CountingQueue::new(durable),
            CountingQueue::new(MemoryQueue::new("transient")),
        );
        (distributor, recorder)
    }

    fn configuration(toml: &str) -> ConfigurationStack {
        ConfigurationStack::single(ConfigLoader::parse_document(toml, ConfigFormat::Toml).unwrap())
    }

    fn data() -> Data {
        [
            ("field1", FieldValue::from("value1")),
            ("field2", FieldValue::from("value2")),
        ]
        .into_iter()
        .collect()
    }

    fn one_route(settings: &str, route_extra: &str, group: &str) -> String {
        format!(
            r#"
[distributor]
{settings}

[distributor.routes.routeId1]
type = "generic"
weight = 10

[distributor.routes.routeId1.config]
enabled = true
data = "mapperGroupId1"
dispatcher = "recorder"
{route_extra}

[dataProcessing.dataMapperGroups.mapperGroupId1]
{group}
"#
        )
    }

    /// Sync, storage enabled, one route, passthrough mapper
    #[tokio::test]
    async fn test_sync_distribution_with_storage() {
        let dir = tempfile::tempdir().unwrap();
        let (distributor, recorder) = setup(dir.path()).await;
        let config = configuration(&one_route(
            "async = false\nenableStorage = true",
            "",
            "passthroughFields = true",
        ));

        let jobs = distributor
            .distribute(Submission::new(data(), config))
            .await
            .unwrap();

        let durable = distributor.durable_queue();
        assert_eq!(durable.count("add_job"), 1);
        assert_eq!(durable.count("mark_list_as_pending"), 1);
        assert_eq!(durable.count("mark_as_running"), 1);
        assert_eq!(durable.count("mark_as_done"), 1);
        assert_eq!(durable.count("mark_as_failed"), 0);
        assert_eq!(distributor.transient_queue().total(), 0);

        let sent = recorder.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            serde_json::to_value(&sent[0]).unwrap(),
            json!({ "field1": "value1", "field2": "value2" })
        );

        let stored = durable.inner.get(jobs[0].id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Done);
    }

    /// Async, storage enabled: jobs are only added, the sweep runs them later
    #[tokio::test]
    async fn test_async_distribution_defers_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let config = configuration(&one_route(
            "async = true\nenableStorage = true",
            "",
            "passthroughFields = true",
        ));

        {
            let (distributor, recorder) = setup(dir.path()).await;
            distributor
                .distribute(Submission::new(data(), config))
                .await
                .unwrap();

            let durable = distributor.durable_queue();
            assert_eq!(durable.count("add_job"), 1);
            assert_eq!(durable.total(), 1);
            assert!(recorder.sent().is_empty());
        }

        // a fresh worker on the same queue directory picks the job up
        let (worker, recorder) = setup(dir.path()).await;
        let jobs = worker.process_queue(10).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Done);
        assert_eq!(recorder.sent().len(), 1);
        assert!(worker.process_queue(10).await.unwrap().is_empty());
    }

    /// A gate that does not pass skips the route without dispatch
    #[tokio::test]
    async fn test_gate_not_passed() {
        let dir = tempfile::tempdir().unwrap();
        let (distributor, recorder) = setup(dir.path()).await;
        let config = configuration(&one_route(
            "async = false\nenableStorage = true",
            r#"gate = { type = "equals", field = "field1", value = "value2" }"#,
            "passthroughFields = true",
        ));

        let job = QueueDataFactory::new().to_job(
            &Submission::new(data(), config),
            "routeId1",
            0,
            JobStatus::Pending,
        );

        assert!(!distributor.process_job(&job).await.unwrap());
        assert!(recorder.sent().is_empty());
    }

    /// An empty mapper output is a failure naming the route
    #[tokio::test]
    async fn test_empty_mapper_output_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (distributor, recorder) = setup(dir.path()).await;
        let config = configuration(&one_route(
            "async = false\nenableStorage = true",
            "",
            "passthroughFields = false",
        ));

        let job = QueueDataFactory::new().to_job(
            &Submission::new(data(), config.clone()),
            "routeId1",
            0,
            JobStatus::Pending,
        );
        let err = distributor.process_job(&job).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "No data generated for route \"generic\" with ID routeId1."
        );

        // through distribute, the queue records the failure with that message
        let jobs = distributor
            .distribute(Submission::new(data(), config))
            .await
            .unwrap();
        assert_eq!(distributor.durable_queue().count("mark_as_failed"), 1);
        let stored = distributor.durable_queue().inner.get(jobs[0].id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.status_message, err.to_string());
        assert!(recorder.sent().is_empty());
    }

    /// Two routes with two passes each, every pass remapping differently
    #[tokio::test]
    async fn test_passes_do_not_share_output() {
        let dir = tempfile::tempdir().unwrap();
        let (distributor, recorder) = setup(dir.path()).await;
        let config = configuration(
            r#"
[distributor]
enableStorage = false

[distributor.routes.routeId2]
type = "generic"
weight = 20
config = { enabled = true, dispatcher = "recorder", data = "swap" }
passes = [{ data = "copy1" }, { data = "copy2" }]

[distributor.routes.routeId1]
type = "generic"
weight = 10
config = { enabled = true, dispatcher = "recorder", data = "identity" }
passes = [{}, { data = "swap" }]

[dataProcessing.dataMapperGroups.identity]
fields = { field1 = { field = "field1" }, field2 = { field = "field2" } }

[dataProcessing.dataMapperGroups.swap]
fields = { field1 = { field = "field2" }, field2 = { field = "field1" } }

[dataProcessing.dataMapperGroups.copy1]
fields = { field1 = { field = "field1" }, field2 = { field = "field1" } }

[dataProcessing.dataMapperGroups.copy2]
fields = { field1 = { field = "field2" }, field2 = { field = "field2" } }
"#,
        );

        let jobs = distributor
            .distribute(Submission::new(data(), config))
            .await
            .unwrap();
        assert_eq!(jobs.len(), 4);
        assert!(jobs.iter().all(|job| job.status == JobStatus::Done));
        assert_eq!(distributor.transient_queue().count("mark_as_done"), 4);

        let sent: Vec<serde_json::Value> = recorder
            .sent()
            .iter()
            .map(|fields| serde_json::to_value(fields).unwrap())
            .collect();
        assert_eq!(
            sent,
            vec![
                json!({ "field1": "value1", "field2": "value2" }),
                json!({ "field1": "value2", "field2": "value1" }),
                json!({ "field1": "value1", "field2": "value1" }),
                json!({ "field1": "value2", "field2": "value2" }),
            ]
        );
    }

    /// Dispatchers built from configuration deliver to their sinks
    #[tokio::test]
    async fn test_configured_file_dispatcher() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("audit.jsonl");
        let config_path = dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            format!(
                r#"
[distributor]
enableStorage = false

[distributor.dispatchers.audit]
type = "file"
path = "{}"

[distributor.routes.routeId1]
type = "generic"
weight = 1
config = {{ enabled = true, data = "passthrough", dispatcher = "audit" }}

[dataProcessing.dataMapperGroups.passthrough]
passthroughFields = true
"#,
                output.display()
            ),
        )
        .unwrap();

        let config = ConfigLoader::load_from_path(&config_path).unwrap();
        let dispatchers = create_dispatchers(&config.dispatchers().unwrap())
            .await
            .unwrap();
        let registry = Registry::builder()
            .dispatchers(&dispatchers)
            .with_builtins()
            .build();
        let distributor = Distributor::new(
            Arc::new(registry),
            MemoryQueue::new("durable"),
            MemoryQueue::new("transient"),
        );

        distributor
            .distribute(Submission::new(data(), config))
            .await
            .unwrap();

        let content = std::fs::read_to_string(&output).unwrap();
        let line: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(line["fields"], json!({ "field1": "value1", "field2": "value2" }));
        assert_eq!(dispatchers.metrics()[0].1.sent_count, 1);
        assert!(distributor.transient_queue().jobs()[0].status == JobStatus::Done);
    }
}
