//! QueueDataFactory - submission ↔ job conversion
//!
//! Job payload layout:
//!
//! ```json
//! {
//!   "routeId": "routeId1",
//!   "pass": 0,
//!   "submission": { "data": {...}, "configuration": [...], "context": {...} }
//! }
//! ```

use contracts::{CodecError, ConfigurationStack, Context, Job, JobStatus, Submission};
use serde_json::{json, Map, Value};
use tracing::trace;

use crate::codec::{decode_data, encode_data};
use crate::hash::content_hash;

pub const KEY_ROUTE_ID: &str = "routeId";
pub const KEY_PASS: &str = "pass";
pub const KEY_SUBMISSION: &str = "submission";
pub const KEY_DATA: &str = "data";
pub const KEY_CONFIGURATION: &str = "configuration";
pub const KEY_CONTEXT: &str = "context";

/// Converts submissions to jobs and back, and derives their identities
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueDataFactory;

impl QueueDataFactory {
    pub fn new() -> Self {
        Self
    }

    /// Hash over data and context; configuration is not part of it
    pub fn submission_hash(&self, submission: &Submission) -> String {
        content_hash(&json!({
            KEY_DATA: encode_data(&submission.data),
            KEY_CONTEXT: context_value(&submission.context),
        }))
    }

    /// Hash over the job's data and context; route, pass and configuration
    /// are excluded, so all jobs of one submission share it
    pub fn job_hash(&self, job: &Job) -> String {
        let submission = job.data.get(KEY_SUBMISSION);
        let field = |key: &str| {
            submission
                .and_then(|s| s.get(key))
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new()))
        };
        content_hash(&json!({
            KEY_DATA: field(KEY_DATA),
            KEY_CONTEXT: field(KEY_CONTEXT),
        }))
    }

    /// Hash over data, context and configuration, for memoizing work that
    /// depends on configuration
    pub fn cache_key(&self, submission: &Submission) -> String {
        content_hash(&json!({
            KEY_DATA: encode_data(&submission.data),
            KEY_CONTEXT: context_value(&submission.context),
            KEY_CONFIGURATION: configuration_value(&submission.configuration),
        }))
    }

    /// `{hash}#{route}#{pass}`; the submission hash is used when `hash` is empty
    pub fn submission_label(&self, submission: &Submission, route: &str, pass: usize, hash: &str) -> String {
        let hash = if hash.is_empty() {
            self.submission_hash(submission)
        } else {
            hash.to_string()
        };
        format_label(&hash, route, pass)
    }

    /// Label of a job, built from its stored hash (or its content hash)
    pub fn job_label(&self, job: &Job) -> Result<String, CodecError> {
        let hash = if job.hash.is_empty() {
            self.job_hash(job)
        } else {
            job.hash.clone()
        };
        Ok(format_label(&hash, &self.route_of(job)?, self.pass_of(job)?))
    }

    /// Encode a submission into a job for `route` / `pass`
    pub fn to_job(&self, submission: &Submission, route: &str, pass: usize, status: JobStatus) -> Job {
        let payload = json!({
            KEY_ROUTE_ID: route,
            KEY_PASS: pass,
            KEY_SUBMISSION: {
                KEY_DATA: encode_data(&submission.data),
                KEY_CONFIGURATION: configuration_value(&submission.configuration),
                KEY_CONTEXT: context_value(&submission.context),
            },
        });

        let hash = self.submission_hash(submission);
        let mut job = Job::new(payload, status);
        job.label = format_label(&hash, route, pass);
        job.hash = hash;
        trace!(label = %job.label, "submission converted to job");
        job
    }

    /// Decode the submission stored in a job
    ///
    /// # Errors
    /// `CodecError` when the payload is malformed
    pub fn to_submission(&self, job: &Job) -> Result<Submission, CodecError> {
        let submission = job
            .data
            .get(KEY_SUBMISSION)
            .ok_or_else(|| CodecError::malformed("missing submission"))?;

        let data = match submission.get(KEY_DATA) {
            Some(data) => decode_data(data)?,
            None => return Err(CodecError::malformed("missing submission data")),
        };

        let configuration = match submission.get(KEY_CONFIGURATION) {
            Some(Value::Array(layers)) => ConfigurationStack::new(layers.clone()),
            Some(Value::Null) | None => ConfigurationStack::default(),
            Some(other) => {
                return Err(CodecError::malformed(format!(
                    "configuration stack expected, got {other}"
                )))
            }
        };

        let context = match submission.get(KEY_CONTEXT) {
            Some(Value::Object(entries)) => entries
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            Some(Value::Array(items)) if items.is_empty() => Context::default(),
            Some(Value::Null) | None => Context::default(),
            Some(other) => {
                return Err(CodecError::malformed(format!("context map expected, got {other}")))
            }
        };

        Ok(Submission {
            data,
            configuration,
            context,
        })
    }

    /// Route id stored in the payload
    pub fn route_of(&self, job: &Job) -> Result<String, CodecError> {
        job.data
            .get(KEY_ROUTE_ID)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CodecError::malformed("missing route id"))
    }

    /// Pass stored in the payload; absent means the first pass
    pub fn pass_of(&self, job: &Job) -> Result<usize, CodecError> {
        match job.data.get(KEY_PASS) {
            None | Some(Value::Null) => Ok(0),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(|pass| pass as usize)
                .ok_or_else(|| CodecError::malformed(format!("invalid pass {n}"))),
            // passes written as strings by older producers
            Some(Value::String(s)) if s.is_empty() => Ok(0),
            Some(Value::String(s)) => s
                .parse()
                .map_err(|_| CodecError::malformed(format!("invalid pass \"{s}\""))),
            Some(other) => Err(CodecError::malformed(format!("invalid pass {other}"))),
        }
    }
}

fn format_label(hash: &str, route: &str, pass: usize) -> String {
    format!("{hash}#{route}#{pass}")
}

fn context_value(context: &Context) -> Value {
    Value::Object(
        context
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    )
}

fn configuration_value(configuration: &ConfigurationStack) -> Value {
    Value::Array(configuration.layers().to_vec())
}
