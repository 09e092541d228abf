// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Downstream metadata recording.
//!
//! Once a bot's task stops cleanly, the artifact it uploaded is handed to
//! the processing pipeline as a metadata record. Delivery is at least
//! once; the pipeline deduplicates on bot id.

use async_trait::async_trait;
use tracing::info;

/// Metadata describing one finished recording.
#[derive(Debug, Clone)]
pub struct ArtifactRecord {
    /// Bot that produced the recording.
    pub bot_id: String,
    /// Object key of the uploaded archive, if a launch staged one.
    pub archive_key: Option<String>,
    /// Meeting title, if known.
    pub title: Option<String>,
    /// User the recording belongs to.
    pub owner_id: String,
}

/// Recorder errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RecorderError {
    /// The pipeline is unreachable.
    #[error("Recorder unavailable: {0}")]
    Unavailable(String),
    /// The pipeline rejected the record.
    #[error("Record rejected: {0}")]
    Rejected(String),
}

/// Hands finished recordings to the processing pipeline.
#[async_trait]
pub trait MetadataRecorder: Send + Sync {
    /// Whether the pipeline is ready to accept records. Recording passes
    /// are skipped entirely while this is false.
    async fn health_check(&self) -> bool;

    /// Deliver one artifact record.
    async fn record_artifact(&self, record: &ArtifactRecord) -> Result<(), RecorderError>;
}

/// Recorder that only logs. Used when no processing pipeline is wired up.
#[derive(Debug, Default)]
pub struct LogRecorder;

#[async_trait]
impl MetadataRecorder for LogRecorder {
    async fn health_check(&self) -> bool {
        true
    }

    async fn record_artifact(&self, record: &ArtifactRecord) -> Result<(), RecorderError> {
        info!(
            bot_id = %record.bot_id,
            archive_key = ?record.archive_key,
            owner_id = %record.owner_id,
            "Recording finished artifact"
        );
        Ok(())
    }
}

/// Mock recorder for testing. Remembers every delivered record and can be
/// flipped unhealthy.
#[derive(Default)]
pub struct MockRecorder {
    /// If true, `health_check` reports the pipeline as down.
    pub unhealthy: std::sync::atomic::AtomicBool,
    records: tokio::sync::Mutex<Vec<ArtifactRecord>>,
}

impl MockRecorder {
    /// Create a healthy mock recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records delivered so far.
    pub async fn delivered(&self) -> Vec<ArtifactRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl MetadataRecorder for MockRecorder {
    async fn health_check(&self) -> bool {
        !self.unhealthy.load(std::sync::atomic::Ordering::SeqCst)
    }

    async fn record_artifact(&self, record: &ArtifactRecord) -> Result<(), RecorderError> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}
