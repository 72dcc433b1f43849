//! FileDispatcher - appends outbound records to a JSON lines file

use async_trait::async_trait;
use chrono::Utc;
use contracts::{DataDispatcher, DispatcherConfig, DistributorError, OutboundFields};
use serde::Serialize;
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, instrument};

/// Configuration for FileDispatcher
#[derive(Debug, Clone)]
pub struct FileDispatcherConfig {
    /// Output file, created on first write
    pub path: PathBuf,
}

impl FileDispatcherConfig {
    /// Create config from dispatcher params
    pub fn from_config(config: &DispatcherConfig) -> Self {
        let path = config
            .param_str("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("./output/{}.jsonl", config.name)));

        Self { path }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Line<'a> {
    dispatcher: &'a str,
    sent_at: String,
    fields: &'a OutboundFields,
}

/// Dispatcher that appends one JSON line per outbound record
pub struct FileDispatcher {
    name: String,
    config: FileDispatcherConfig,
    // serializes appends from concurrent jobs
    write_lock: Mutex<()>,
}

impl FileDispatcher {
    /// Create a new FileDispatcher, creating the parent directory
    pub async fn new(name: impl Into<String>, config: FileDispatcherConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        Ok(Self {
            name: name.into(),
            config,
            write_lock: Mutex::new(()),
        })
    }

    /// Create from dispatcher configuration (for factory)
    pub async fn from_config(config: &DispatcherConfig) -> std::io::Result<Self> {
        Self::new(&config.name, FileDispatcherConfig::from_config(config)).await
    }

    /// Output file path
    pub fn path(&self) -> &PathBuf {
        &self.config.path
    }

    async fn append_line(&self, fields: &OutboundFields) -> std::io::Result<()> {
        let line = Line {
            dispatcher: &self.name,
            sent_at: Utc::now().to_rfc3339(),
            fields,
        };
        let mut bytes = serde_json::to_vec(&line)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        bytes.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.path)
            .await?;
        file.write_all(&bytes).await?;
        file.flush().await
    }
}

#[async_trait]
impl DataDispatcher for FileDispatcher {
    fn keyword(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_dispatcher_send",
        skip(self, fields),
        fields(dispatcher = %self.name, fields = fields.len())
    )]
    async fn send(&self, fields: &OutboundFields) -> Result<(), DistributorError> {
        self.append_line(fields).await.map_err(|e| {
            error!(dispatcher = %self.name, error = %e, "Write failed");
            DistributorError::delivery(&self.name, e.to_string())
        })?;
        debug!(dispatcher = %self.name, path = %self.config.path.display(), "record appended");
        Ok(())
    }
}
