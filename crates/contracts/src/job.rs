//! Job - one route × pass execution of a submission

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Job status; transitions are owned by the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    /// `done` and `failed` are terminal
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queued unit of work
///
/// `data` holds the serialized payload: route id, pass and the encoded
/// submission. The id is assigned by the queue on `add_job`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub hash: String,
    pub data: Value,
    pub created: DateTime<Utc>,
    pub changed: DateTime<Utc>,
    #[serde(default)]
    pub status_message: String,
}

impl Job {
    /// New unsaved job with the given payload
    pub fn new(data: Value, status: JobStatus) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            status,
            label: String::new(),
            hash: String::new(),
            data,
            created: now,
            changed: now,
            status_message: String::new(),
        }
    }

    /// Move to `status`, stamping the change time
    pub fn transition(&mut self, status: JobStatus, message: impl Into<String>) {
        self.status = status;
        self.status_message = message.into();
        self.changed = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_terminal() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_transition_keeps_message() {
        let mut job = Job::new(json!({}), JobStatus::Pending);
        job.transition(JobStatus::Failed, "boom");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.status_message, "boom");
        assert!(job.changed >= job.created);
    }
}
