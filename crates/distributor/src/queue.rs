//! Job queues
//!
//! - `MemoryQueue`: transient, in-process
//! - `FileQueue`: durable, one JSON document per job in a directory
//!
//! Both claim a job on `mark_as_running` only while it is pending, so a
//! job runs at most once even with several workers sweeping.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use contracts::{Job, JobQueue, JobStatus, QueueError};

fn claim(queue: &str, job: &mut Job) -> Result<(), QueueError> {
    if job.status != JobStatus::Pending {
        return Err(QueueError::Claim {
            queue: queue.to_string(),
            id: job.id,
            status: job.status,
        });
    }
    job.transition(JobStatus::Running, "");
    Ok(())
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    jobs: BTreeMap<u64, Job>,
}

/// Transient in-process queue
#[derive(Debug)]
pub struct MemoryQueue {
    name: String,
    state: Mutex<MemoryState>,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Snapshot of all jobs, by id
    pub fn jobs(&self) -> Vec<Job> {
        self.lock().jobs.values().cloned().collect()
    }

    pub fn get(&self, id: u64) -> Option<Job> {
        self.lock().jobs.get(&id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // a poisoned lock still holds consistent job records
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(
        &self,
        id: u64,
        apply: impl FnOnce(&mut Job) -> Result<(), QueueError>,
    ) -> Result<(), QueueError> {
        let mut state = self.lock();
        let job = state.jobs.get_mut(&id).ok_or_else(|| QueueError::NotFound {
            queue: self.name.clone(),
            id,
        })?;
        apply(job)
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl JobQueue for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add_job(&self, mut job: Job) -> Result<Job, QueueError> {
        let mut state = self.lock();
        state.next_id += 1;
        job.id = state.next_id;
        state.jobs.insert(job.id, job.clone());
        debug!(queue = %self.name, job_id = job.id, label = %job.label, "Job added");
        Ok(job)
    }

    async fn mark_list_as_pending(&self, jobs: &[Job]) -> Result<(), QueueError> {
        for job in jobs {
            self.update(job.id, |stored| {
                stored.transition(JobStatus::Pending, "");
                Ok(())
            })?;
        }
        Ok(())
    }

    async fn mark_as_running(&self, job: &Job) -> Result<(), QueueError> {
        let queue = self.name.clone();
        self.update(job.id, |stored| claim(&queue, stored))
    }

    async fn mark_as_done(&self, job: &Job) -> Result<(), QueueError> {
        self.update(job.id, |stored| {
            stored.transition(JobStatus::Done, "");
            Ok(())
        })
    }

    async fn mark_as_failed(&self, job: &Job, message: &str) -> Result<(), QueueError> {
        self.update(job.id, |stored| {
            stored.transition(JobStatus::Failed, message);
            Ok(())
        })
    }

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<Job>, QueueError> {
        Ok(self
            .lock()
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Lock acquisition attempts before a job lock is reported as held
const LOCK_ATTEMPTS: u32 = 200;
const LOCK_RETRY: Duration = Duration::from_millis(5);

/// Durable queue storing `<id>.json` files in a directory
///
/// Several handles, in one process or many, may share a directory. Job
/// files are published with `hard_link`, which fails when the id is taken,
/// and every read-modify-write holds a `<id>.lock` file created with
/// `create_new`. A lock left behind by a crashed process has to be removed
/// by hand.
///
/// Finished jobs stay on disk until `remove_finished` prunes them.
#[derive(Debug)]
pub struct FileQueue {
    name: String,
    dir: PathBuf,
    /// Next id to try; other handles may have taken it already
    next_id: tokio::sync::Mutex<u64>,
    /// Distinguishes temporary files of this handle
    tmp_seq: AtomicU64,
}

impl FileQueue {
    /// Open (creating if needed) the queue directory
    #[instrument(name = "file_queue_open", skip(dir), fields(dir = %dir.as_ref().display()))]
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, QueueError> {
        let dir = dir.as_ref().to_path_buf();
        let name = format!("file:{}", dir.display());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| QueueError::storage(&name, e.to_string()))?;

        let mut last_id = 0;
        for id in Self::stored_ids(&name, &dir).await? {
            last_id = last_id.max(id);
        }
        debug!(queue = %name, last_id, "File queue opened");

        Ok(Self {
            name,
            dir,
            next_id: tokio::sync::Mutex::new(last_id),
            tmp_seq: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load one stored job
    pub async fn get(&self, id: u64) -> Result<Job, QueueError> {
        let path = self.job_path(id);
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(QueueError::NotFound {
                    queue: self.name.clone(),
                    id,
                })
            }
            Err(e) => return Err(self.storage_error(e)),
        };
        serde_json::from_slice(&content).map_err(|e| self.storage_error(e))
    }

    /// All stored jobs, by id
    pub async fn jobs(&self) -> Result<Vec<Job>, QueueError> {
        let mut jobs = Vec::new();
        for id in Self::stored_ids(&self.name, &self.dir).await? {
            match self.get(id).await {
                Ok(job) => jobs.push(job),
                // pruned by another handle since the listing
                Err(QueueError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(jobs)
    }

    /// Delete done and failed jobs last changed more than `older_than` ago
    ///
    /// Returns the number of removed jobs.
    #[instrument(name = "file_queue_prune", skip(self), fields(queue = %self.name))]
    pub async fn remove_finished(&self, older_than: Duration) -> Result<usize, QueueError> {
        let max_age =
            chrono::Duration::from_std(older_than).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut removed = 0;
        for job in self.jobs().await? {
            if !job.status.is_terminal() || job.changed > cutoff {
                continue;
            }
            let lock = self.lock_job(job.id).await?;
            // re-read under the lock, the job may have been requeued
            let result = match self.get(job.id).await {
                Ok(stored) if stored.status.is_terminal() && stored.changed <= cutoff => {
                    tokio::fs::remove_file(self.job_path(job.id))
                        .await
                        .map(|_| true)
                        .map_err(|e| self.storage_error(e))
                }
                Ok(_) | Err(QueueError::NotFound { .. }) => Ok(false),
                Err(e) => Err(e),
            };
            self.unlock_job(lock).await;
            if result? {
                removed += 1;
            }
        }
        info!(removed, "Finished jobs pruned");
        Ok(removed)
    }

    fn job_path(&self, id: u64) -> PathBuf {
        self.dir.join(format!("{id:020}.json"))
    }

    fn lock_path(&self, id: u64) -> PathBuf {
        self.dir.join(format!("{id:020}.lock"))
    }

    fn storage_error(&self, error: impl ToString) -> QueueError {
        QueueError::storage(&self.name, error.to_string())
    }

    /// Write `job` to a temporary file unique to this handle
    async fn write_tmp(&self, job: &Job) -> Result<PathBuf, QueueError> {
        let content = serde_json::to_vec_pretty(job).map_err(|e| self.storage_error(e))?;
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .dir
            .join(format!("{:020}.{}.{seq}.tmp", job.id, std::process::id()));
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| self.storage_error(e))?;
        Ok(tmp)
    }

    /// Publish a new job file; `false` when the id is already taken
    async fn create(&self, job: &Job) -> Result<bool, QueueError> {
        let tmp = self.write_tmp(job).await?;
        let linked = tokio::fs::hard_link(&tmp, self.job_path(job.id)).await;
        let _ = tokio::fs::remove_file(&tmp).await;
        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(self.storage_error(e)),
        }
    }

    /// Replace an existing job file
    async fn replace(&self, job: &Job) -> Result<(), QueueError> {
        let tmp = self.write_tmp(job).await?;
        tokio::fs::rename(&tmp, self.job_path(job.id))
            .await
            .map_err(|e| self.storage_error(e))
    }

    async fn lock_job(&self, id: u64) -> Result<PathBuf, QueueError> {
        let path = self.lock_path(id);
        for _ in 0..LOCK_ATTEMPTS {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(_) => return Ok(path),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    tokio::time::sleep(LOCK_RETRY).await;
                }
                Err(e) => return Err(self.storage_error(e)),
            }
        }
        Err(self.storage_error(format!("job {id} is locked by another handle")))
    }

    async fn unlock_job(&self, lock: PathBuf) {
        if let Err(e) = tokio::fs::remove_file(&lock).await {
            warn!(queue = %self.name, lock = %lock.display(), error = %e, "Job lock not removed");
        }
    }

    async fn update(
        &self,
        id: u64,
        apply: impl FnOnce(&mut Job) -> Result<(), QueueError>,
    ) -> Result<(), QueueError> {
        let lock = self.lock_job(id).await?;
        let result = async {
            let mut stored = self.get(id).await?;
            apply(&mut stored)?;
            self.replace(&stored).await
        }
        .await;
        self.unlock_job(lock).await;
        result
    }

    async fn stored_ids(name: &str, dir: &Path) -> Result<Vec<u64>, QueueError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| QueueError::storage(name, e.to_string()))?;
        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| QueueError::storage(name, e.to_string()))?
        {
            let file_name = entry.file_name();
            let Some(stem) = file_name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            if let Ok(id) = stem.parse::<u64>() {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }
}

impl JobQueue for FileQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add_job(&self, mut job: Job) -> Result<Job, QueueError> {
        let mut next_id = self.next_id.lock().await;
        loop {
            *next_id += 1;
            job.id = *next_id;
            if self.create(&job).await? {
                break;
            }
            debug!(queue = %self.name, job_id = job.id, "Job id taken, retrying");
        }
        debug!(queue = %self.name, job_id = job.id, label = %job.label, "Job stored");
        Ok(job)
    }

    async fn mark_list_as_pending(&self, jobs: &[Job]) -> Result<(), QueueError> {
        for job in jobs {
            self.update(job.id, |stored| {
                stored.transition(JobStatus::Pending, "");
                Ok(())
            })
            .await?;
        }
        Ok(())
    }

    async fn mark_as_running(&self, job: &Job) -> Result<(), QueueError> {
        let queue = self.name.clone();
        self.update(job.id, |stored| claim(&queue, stored)).await
    }

    async fn mark_as_done(&self, job: &Job) -> Result<(), QueueError> {
        self.update(job.id, |stored| {
            stored.transition(JobStatus::Done, "");
            Ok(())
        })
        .await
    }

    async fn mark_as_failed(&self, job: &Job, message: &str) -> Result<(), QueueError> {
        let message = message.to_string();
        self.update(job.id, move |stored| {
            stored.transition(JobStatus::Failed, message);
            Ok(())
        })
        .await
    }

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<Job>, QueueError> {
        let mut pending = Vec::new();
        for job in self.jobs().await? {
            if pending.len() >= limit {
                break;
            }
            if job.status == JobStatus::Pending {
                pending.push(job);
            }
        }
        Ok(pending)
    }
}
