// src/storage/jsonl.rs

//! Line-delimited JSON sink: one classification record per line.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::ClassificationRecord;
use crate::storage::RecordSink;

/// JSONL file sink. Writes are serialized through an internal lock so
/// concurrent workers never interleave partial lines.
pub struct JsonlSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlSink {
    /// Create a sink at the given path. Unless `append` is set, an
    /// existing file is removed so the run starts fresh.
    pub async fn create(path: impl Into<PathBuf>, append: bool) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        if !append && tokio::fs::try_exists(&path).await? {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Read all records back from a JSONL file. Used by `pageclass info`
    /// and by tests.
    pub async fn read_all(path: impl AsRef<Path>) -> Result<Vec<ClassificationRecord>> {
        let content = tokio::fs::read_to_string(path).await?;
        let mut records = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(line)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl RecordSink for JsonlSink {
    async fn persist(&self, record: &ClassificationRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
