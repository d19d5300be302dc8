// src/storage/mod.rs

//! Storage abstractions for classification records.
//!
//! The pipeline offers each accepted record to the sink exactly once;
//! everything past that boundary is the sink's concern.

pub mod jsonl;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ClassificationRecord;

// Re-export for convenience
pub use jsonl::JsonlSink;

/// Append-only sink for accepted classification records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persist one accepted record.
    async fn persist(&self, record: &ClassificationRecord) -> Result<()>;
}
