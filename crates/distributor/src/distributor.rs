//! Distribution orchestrator
//!
//! `distribute` turns a submission into one job per route × pass:
//!
//! 1. every configured route registers context (enabled or not)
//! 2. every globally enabled data provider registers context
//! 3. jobs are created in ascending route weight, passes in order
//! 4. each route pass resolves `async` / `enableStorage` (route config
//!    over the global settings). Async jobs stay pending on the durable
//!    queue for a later sweep; sync jobs run right away, in creation
//!    order, on the durable (storage enabled) or transient queue
//!
//! Job failures are recorded by the queue (`mark_as_failed`), never
//! returned from `distribute`; remaining jobs keep running.

use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use contracts::{
    DistributorError, DistributorSettings, Job, JobQueue, JobStatus, QueueError,
    RouteDescriptor, Submission,
};
use observability::{record_job_created, record_job_finished, record_queue_sweep};
use queue_data::QueueDataFactory;

use crate::queue::MemoryQueue;
use crate::registry::Registry;
use crate::route::{EnrichmentCache, RoutePipeline};

/// Per-call distribution switches
#[derive(Debug, Clone, Copy, Default)]
pub struct DistributionOptions {
    /// Skip the route / data provider context hooks
    pub skip_context: bool,
}

/// Queue and timing of one job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// Durable queue, left pending for a sweep
    Deferred,
    /// Durable queue, run now
    Durable,
    /// Transient queue, run now
    Transient,
}

impl Placement {
    fn of(settings: DistributorSettings) -> Self {
        if settings.run_async {
            Self::Deferred
        } else if settings.enable_storage {
            Self::Durable
        } else {
            Self::Transient
        }
    }
}

/// Orchestrator over a durable and a transient queue
pub struct Distributor<D, T = MemoryQueue> {
    pipeline: RoutePipeline,
    durable: D,
    transient: T,
    factory: QueueDataFactory,
}

impl<D: JobQueue, T: JobQueue> Distributor<D, T> {
    pub fn new(registry: Arc<Registry>, durable: D, transient: T) -> Self {
        Self {
            pipeline: RoutePipeline::new(registry),
            durable,
            transient,
            factory: QueueDataFactory::new(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.pipeline.registry()
    }

    pub fn durable_queue(&self) -> &D {
        &self.durable
    }

    pub fn transient_queue(&self) -> &T {
        &self.transient
    }

    /// Distribute a submission with default options
    pub async fn distribute(&self, submission: Submission) -> Result<Vec<Job>, DistributorError> {
        self.distribute_with_options(submission, DistributionOptions::default())
            .await
    }

    /// Distribute a submission
    ///
    /// Returns the created jobs with the status they ended in.
    ///
    /// # Errors
    /// Configuration that cannot be read and queue failures. Failing jobs
    /// are not errors here.
    #[instrument(
        name = "distribute",
        skip(self, submission, options),
        fields(hash = %self.factory.submission_hash(&submission))
    )]
    pub async fn distribute_with_options(
        &self,
        mut submission: Submission,
        options: DistributionOptions,
    ) -> Result<Vec<Job>, DistributorError> {
        let routes = submission.configuration.routes()?;

        if !options.skip_context {
            self.add_context(&mut submission, &routes)?;
        }

        let settings = submission.configuration.settings()?;
        let mut jobs = Vec::new();
        let mut forced_storage = false;
        for route in &routes {
            for pass in route.passes() {
                let resolved = match submission.configuration.route_config(&route.route_id, pass) {
                    Ok(config) => settings.for_route(&config),
                    // an unreadable slice fails the job once it runs
                    Err(_) => settings,
                };
                forced_storage |= resolved.run_async && !resolved.enable_storage;
                let placement = Placement::of(resolved);

                let job = self
                    .factory
                    .to_job(&submission, &route.route_id, pass, JobStatus::Pending);
                let job = match placement {
                    Placement::Transient => self.transient.add_job(job).await?,
                    Placement::Deferred | Placement::Durable => self.durable.add_job(job).await?,
                };
                record_job_created(&route.route_id, self.queue_name(placement));
                jobs.push((placement, job));
            }
        }
        if forced_storage {
            warn!("Asynchronous distribution requires storage, jobs are stored anyway");
        }

        let deferred = jobs
            .iter()
            .filter(|(placement, _)| *placement == Placement::Deferred)
            .count();
        if deferred > 0 {
            info!(queue = self.durable.name(), jobs = deferred, "Jobs deferred");
        }

        self.mark_pending(&self.durable, &jobs, Placement::Durable)
            .await?;
        self.mark_pending(&self.transient, &jobs, Placement::Transient)
            .await?;

        let cache = EnrichmentCache::new();
        let mut processed = 0;
        for (placement, job) in jobs.iter_mut() {
            match placement {
                Placement::Deferred => continue,
                Placement::Durable => self.run_job(&self.durable, job, &cache).await?,
                Placement::Transient => self.run_job(&self.transient, job, &cache).await?,
            }
            processed += 1;
        }
        if processed > 0 {
            info!(jobs = processed, "Jobs processed");
        }

        Ok(jobs.into_iter().map(|(_, job)| job).collect())
    }

    /// Run one job's route pass
    ///
    /// Returns `false` when the route was skipped. Failures come back as
    /// `QueueError::Processing` carrying the original message.
    pub async fn process_job(&self, job: &Job) -> Result<bool, QueueError> {
        self.process_job_cached(job, &EnrichmentCache::new()).await
    }

    /// Run up to `limit` pending jobs of the durable queue
    #[instrument(name = "process_queue", skip(self), fields(queue = %self.durable.name()))]
    pub async fn process_queue(&self, limit: usize) -> Result<Vec<Job>, DistributorError> {
        let mut jobs = self.durable.fetch_pending(limit).await?;
        record_queue_sweep(self.durable.name(), jobs.len());
        info!(jobs = jobs.len(), "Processing deferred jobs");

        let cache = EnrichmentCache::new();
        for job in jobs.iter_mut() {
            self.run_job(&self.durable, job, &cache).await?;
        }
        Ok(jobs)
    }

    fn add_context(
        &self,
        submission: &mut Submission,
        routes: &[RouteDescriptor],
    ) -> Result<(), DistributorError> {
        let registry = self.pipeline.registry();

        for route in routes {
            let Some(outbound) = registry.route(&route.keyword) else {
                warn!(
                    route_id = %route.route_id,
                    keyword = %route.keyword,
                    "No outbound route registered, context not added"
                );
                continue;
            };
            let config = submission.configuration.route_config(&route.route_id, 0)?;
            outbound.add_context(&mut submission.context, &config);
        }

        for provider in registry.data_providers() {
            let config = submission
                .configuration
                .data_provider_config(provider.keyword())?;
            if config.enabled {
                provider.add_context(&mut submission.context, &config);
            }
        }

        debug!(entries = submission.context.len(), "Context added");
        Ok(())
    }

    fn queue_name(&self, placement: Placement) -> &str {
        match placement {
            Placement::Transient => self.transient.name(),
            Placement::Deferred | Placement::Durable => self.durable.name(),
        }
    }

    /// Mark the jobs about to run on `queue` as pending, in one call
    async fn mark_pending<Q: JobQueue>(
        &self,
        queue: &Q,
        jobs: &[(Placement, Job)],
        placement: Placement,
    ) -> Result<(), DistributorError> {
        let batch: Vec<Job> = jobs
            .iter()
            .filter(|(p, _)| *p == placement)
            .map(|(_, job)| job.clone())
            .collect();
        if !batch.is_empty() {
            queue.mark_list_as_pending(&batch).await?;
        }
        Ok(())
    }

    /// Claim, run and finish one job, mirroring each mark on `job`
    async fn run_job<Q: JobQueue>(
        &self,
        queue: &Q,
        job: &mut Job,
        cache: &EnrichmentCache,
    ) -> Result<(), DistributorError> {
        match queue.mark_as_running(job).await {
            Ok(()) => job.transition(JobStatus::Running, ""),
            Err(e @ QueueError::Claim { .. }) => {
                warn!(job_id = job.id, error = %e, "Job already claimed");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        match self.process_job_cached(job, cache).await {
            Ok(_) => {
                queue.mark_as_done(job).await?;
                job.transition(JobStatus::Done, "");
            }
            Err(e) => {
                let message = e.to_string();
                queue.mark_as_failed(job, &message).await?;
                job.transition(JobStatus::Failed, message);
            }
        }
        record_job_finished(job);
        Ok(())
    }

    async fn process_job_cached(
        &self,
        job: &Job,
        cache: &EnrichmentCache,
    ) -> Result<bool, QueueError> {
        self.execute(job, cache).await.map_err(|e| {
            error!(job_id = job.id, label = %job.label, error = %e, "Job failed");
            QueueError::processing(&e)
        })
    }

    async fn execute(&self, job: &Job, cache: &EnrichmentCache) -> Result<bool, DistributorError> {
        let mut submission = self.factory.to_submission(job)?;
        let route_id = self.factory.route_of(job)?;
        let pass = self.factory.pass_of(job)?;
        self.pipeline
            .process(&mut submission, &route_id, pass, cache)
            .await
    }
}
