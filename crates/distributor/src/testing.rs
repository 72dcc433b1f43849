//! Spy collaborators shared by the unit tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use std::sync::Arc;

use contracts::{
    Context, Data, DataDispatcher, DataProvider, DataProviderConfig, DistributorError, Job,
    JobQueue, OutboundFields, OutboundRoute, QueueError, RouteConfig, Submission,
};

use crate::queue::MemoryQueue;

/// Dispatcher recording every field map it receives
pub struct SpyDispatcher {
    name: String,
    fail_with: Option<String>,
    sent: Mutex<Vec<OutboundFields>>,
}

impl SpyDispatcher {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail_with: None,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Dispatcher whose every send fails with `message`
    pub fn failing(name: &str, message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::new(name)
        }
    }

    pub fn sent(&self) -> Vec<OutboundFields> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataDispatcher for SpyDispatcher {
    fn keyword(&self) -> &str {
        &self.name
    }

    async fn send(&self, fields: &OutboundFields) -> Result<(), DistributorError> {
        if let Some(message) = &self.fail_with {
            return Err(DistributorError::delivery(&self.name, message));
        }
        self.sent.lock().unwrap().push(fields.clone());
        Ok(())
    }
}

/// Route counting its context hook calls, delivering to a fixed dispatcher
pub struct SpyRoute {
    keyword: String,
    dispatcher: Arc<dyn DataDispatcher>,
    pub context_calls: AtomicUsize,
}

impl SpyRoute {
    pub fn new(keyword: &str, dispatcher: Arc<dyn DataDispatcher>) -> Self {
        Self {
            keyword: keyword.to_string(),
            dispatcher,
            context_calls: AtomicUsize::new(0),
        }
    }

    pub fn context_calls(&self) -> usize {
        self.context_calls.load(Ordering::SeqCst)
    }
}

impl OutboundRoute for SpyRoute {
    fn keyword(&self) -> &str {
        &self.keyword
    }

    fn add_context(&self, context: &mut Context, _config: &RouteConfig) {
        self.context_calls.fetch_add(1, Ordering::SeqCst);
        context.set(format!("{}Seen", self.keyword), true);
    }

    fn dispatcher(&self, _config: &RouteConfig) -> Result<Arc<dyn DataDispatcher>, DistributorError> {
        Ok(Arc::clone(&self.dispatcher))
    }
}

/// Provider returning fixed fields and counting its calls
pub struct SpyProvider {
    keyword: String,
    fields: Data,
    pub context_calls: AtomicUsize,
    pub field_calls: AtomicUsize,
}

impl SpyProvider {
    pub fn new(keyword: &str, fields: Data) -> Self {
        Self {
            keyword: keyword.to_string(),
            fields,
            context_calls: AtomicUsize::new(0),
            field_calls: AtomicUsize::new(0),
        }
    }

    pub fn field_calls(&self) -> usize {
        self.field_calls.load(Ordering::SeqCst)
    }

    pub fn context_calls(&self) -> usize {
        self.context_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataProvider for SpyProvider {
    fn keyword(&self) -> &str {
        &self.keyword
    }

    fn add_context(&self, context: &mut Context, _config: &DataProviderConfig) {
        self.context_calls.fetch_add(1, Ordering::SeqCst);
        context.set(format!("{}Seen", self.keyword), true);
    }

    async fn provide_fields(
        &self,
        _submission: &Submission,
        _config: &DataProviderConfig,
    ) -> Result<Data, DistributorError> {
        self.field_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.fields.clone())
    }
}

/// Provider deriving a field from the data it is handed
pub struct CopyProvider {
    keyword: String,
    from: String,
    to: String,
    pub field_calls: AtomicUsize,
}

impl CopyProvider {
    pub fn new(keyword: &str, from: &str, to: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            field_calls: AtomicUsize::new(0),
        }
    }

    pub fn field_calls(&self) -> usize {
        self.field_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataProvider for CopyProvider {
    fn keyword(&self) -> &str {
        &self.keyword
    }

    fn add_context(&self, _context: &mut Context, _config: &DataProviderConfig) {}

    async fn provide_fields(
        &self,
        submission: &Submission,
        _config: &DataProviderConfig,
    ) -> Result<Data, DistributorError> {
        self.field_calls.fetch_add(1, Ordering::SeqCst);
        let mut fields = Data::new();
        if let Some(value) = submission.data.get(&self.from) {
            fields.insert(self.to.clone(), value.clone());
        }
        Ok(fields)
    }
}

/// Queue recording every call made on it, backed by a `MemoryQueue`
pub struct SpyQueue {
    inner: MemoryQueue,
    calls: Mutex<Vec<String>>,
}

impl SpyQueue {
    pub fn new(name: &str) -> Self {
        Self {
            inner: MemoryQueue::new(name),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Number of calls of `operation`
    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.as_str() == operation)
            .count()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.inner.jobs()
    }

    fn record(&self, operation: &str) {
        self.calls.lock().unwrap().push(operation.to_string());
    }
}

impl JobQueue for SpyQueue {
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
