//! Distribution metrics
//!
//! Prometheus-facing recorders (through the `metrics` facade) plus an
//! in-memory aggregator for per-run summaries.

use contracts::{Job, JobStatus};
use metrics::{counter, gauge, histogram};
use std::collections::BTreeMap;

/// Result of one route execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Dispatched,
    Skipped,
    Failed,
}

impl RouteOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dispatched => "dispatched",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

/// Record a job placed on a queue
pub fn record_job_created(route_id: &str, queue: &str) {
    counter!(
        "distributor_jobs_created_total",
        "route" => route_id.to_string(),
        "queue" => queue.to_string()
    )
    .increment(1);
}

/// Record the outcome of a route execution
pub fn record_route_outcome(route_id: &str, outcome: RouteOutcome) {
    counter!(
        "distributor_route_outcome_total",
        "route" => route_id.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record one dispatcher call
pub fn record_dispatch(dispatcher: &str, success: bool, latency_ms: f64) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "distributor_dispatch_total",
        "dispatcher" => dispatcher.to_string(),
        "status" => status
    )
    .increment(1);
    histogram!("distributor_dispatch_latency_ms", "dispatcher" => dispatcher.to_string())
        .record(latency_ms);
}

/// Record a job reaching a terminal status
pub fn record_job_finished(job: &Job) {
    counter!("distributor_jobs_finished_total", "status" => job.status.as_str()).increment(1);
}

/// Record the size of a deferred queue sweep
pub fn record_queue_sweep(queue: &str, jobs: usize) {
    gauge!("distributor_queue_sweep_jobs", "queue" => queue.to_string()).set(jobs as f64);
}

/// Per-run job statistics
///
/// Aggregates in memory, for summaries printed by the CLI.
#[derive(Debug, Clone, Default)]
pub struct DistributionStats {
    /// Jobs seen
    pub total_jobs: u64,

    /// Jobs per status
    pub status_counts: BTreeMap<&'static str, u64>,

    /// Failed jobs per route label
    pub failures: BTreeMap<String, String>,

    /// Time from creation to last status change (ms)
    pub turnaround_stats: RunningStats,
}

impl DistributionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one job
    pub fn update(&mut self, job: &Job) {
        self.total_jobs += 1;
        *self.status_counts.entry(job.status.as_str()).or_insert(0) += 1;

        if job.status == JobStatus::Failed {
            self.failures
                .insert(job.label.clone(), job.status_message.clone());
        }

        if job.status.is_terminal() {
            let turnaround = job.changed - job.created;
            self.turnaround_stats
                .push(turnaround.num_microseconds().unwrap_or(i64::MAX) as f64 / 1000.0);
        }
    }

    /// Number of jobs with `status`
    pub fn count(&self, status: JobStatus) -> u64 {
        self.status_counts.get(status.as_str()).copied().unwrap_or(0)
    }

    /// Build summary report
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_jobs: self.total_jobs,
            pending: self.count(JobStatus::Pending),
            done: self.count(JobStatus::Done),
            failed: self.count(JobStatus::Failed),
            failure_rate: if self.total_jobs > 0 {
                self.count(JobStatus::Failed) as f64 / self.total_jobs as f64 * 100.0
            } else {
                0.0
            },
            turnaround_ms: StatsSummary::from(&self.turnaround_stats),
            failures: self.failures.clone(),
        }
    }

    /// Reset statistics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Metrics summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_jobs: u64,
    pub pending: u64,
    pub done: u64,
    pub failed: u64,
    pub failure_rate: f64,
    pub turnaround_ms: StatsSummary,
    pub failures: BTreeMap<String, String>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Distribution Summary ===")?;
        writeln!(f, "Total jobs: {}", self.total_jobs)?;
        writeln!(f, "Pending (deferred): {}", self.pending)?;
        writeln!(f, "Done: {}", self.done)?;
        writeln!(f, "Failed: {} ({:.2}%)", self.failed, self.failure_rate)?;
        writeln!(f, "Turnaround (ms): {}", self.turnaround_ms)?;

        if !self.failures.is_empty() {
            writeln!(f, "Failures:")?;
            for (label, message) in &self.failures {
                writeln!(f, "  {}: {}", label, message)?;
            }
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a sample
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
