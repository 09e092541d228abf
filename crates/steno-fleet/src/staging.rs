// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Artifact upload staging.
//!
//! Workers cannot reach the artifact bucket with their own credentials, so
//! every launch stages two presigned upload URLs ahead of time: one for the
//! raw audio stream and one for the combined archive. The worker uploads to
//! whatever it was handed and never learns a secret.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::sigv4::SigningKey;

/// Content type of the raw audio artifact.
pub const AUDIO_CONTENT_TYPE: &str = "audio/opus";
/// Content type of the combined archive artifact.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/x-tar";

/// Staging errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StagingError {
    /// URL issuance failed.
    #[error("Failed to issue upload URL for {key}: {details}")]
    IssueFailed {
        /// Object key the URL was requested for.
        key: String,
        /// What went wrong.
        details: String,
    },
}

/// Upload destinations staged for a single launch.
#[derive(Debug, Clone)]
pub struct StagedArtifacts {
    /// Presigned PUT URL for the raw audio stream.
    pub audio_url: String,
    /// Presigned PUT URL for the combined archive.
    pub archive_url: String,
    /// Object key the archive URL points at, persisted on the bot record
    /// so downstream processing can find the upload.
    pub archive_key: String,
}

/// Issues time-limited upload URLs for recording artifacts.
#[async_trait]
pub trait ArtifactStaging: Send + Sync {
    /// Issue a presigned PUT URL for `key` with the given content type and
    /// object metadata, valid for `ttl`.
    async fn issue_upload_url(
        &self,
        key: &str,
        content_type: &str,
        metadata: &[(String, String)],
        ttl: Duration,
    ) -> Result<String, StagingError>;
}

/// Stage the audio and archive upload URLs for one bot launch.
///
/// Object keys are namespaced by owner and bot so uploads from different
/// meetings can never collide. One request id is minted per launch attempt
/// and shared by both keys, so downstream processing can pair the audio
/// and archive of the same attempt by leaf name.
pub async fn stage_artifacts(
    staging: &dyn ArtifactStaging,
    owner_id: &str,
    bot_id: &str,
    metadata: &[(String, String)],
    ttl: Duration,
) -> Result<StagedArtifacts, StagingError> {
    let request_id = Uuid::new_v4();
    let audio_key = format!("raw_recordings/{owner_id}/{bot_id}/{request_id}.opus");
    let archive_key = format!("raw_combined/{owner_id}/{bot_id}/{request_id}.tar");

    let audio_url = staging
        .issue_upload_url(&audio_key, AUDIO_CONTENT_TYPE, metadata, ttl)
        .await?;
    let archive_url = staging
        .issue_upload_url(&archive_key, ARCHIVE_CONTENT_TYPE, metadata, ttl)
        .await?;

    Ok(StagedArtifacts {
        audio_url,
        archive_url,
        archive_key,
    })
}

/// S3 presigning backend.
pub struct S3Staging {
    signer: SigningKey,
    bucket: String,
}

impl S3Staging {
    /// Build a presigner for the given bucket.
    pub fn new(signer: SigningKey, bucket: impl Into<String>) -> Self {
        Self {
            signer,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ArtifactStaging for S3Staging {
    async fn issue_upload_url(
        &self,
        key: &str,
        content_type: &str,
        metadata: &[(String, String)],
        ttl: Duration,
    ) -> Result<String, StagingError> {
        // Presigning is pure computation, no round trip to the bucket.
        Ok(self.signer.presign_put(
            &self.bucket,
            key,
            content_type,
            metadata,
            ttl.as_secs(),
            Utc::now(),
        ))
    }
}

/// Mock staging backend for testing. Hands out deterministic URLs and
/// remembers every key it issued.
#[derive(Default)]
pub struct MockStaging {
    issued: tokio::sync::Mutex<Vec<String>>,
}

impl MockStaging {
    /// Create a new mock staging backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys issued so far, in issue order.
    pub async fn issued_keys(&self) -> Vec<String> {
        self.issued.lock().await.clone()
    }
}

#[async_trait]
impl ArtifactStaging for MockStaging {
    async fn issue_upload_url(
        &self,
        key: &str,
        _content_type: &str,
        _metadata: &[(String, String)],
        _ttl: Duration,
    ) -> Result<String, StagingError> {
        self.issued.lock().await.push(key.to_string());
        Ok(format!("https://staging.mock/{key}?sig=test"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stage_artifacts_keys_and_urls() {
        let staging = MockStaging::new();
        let staged = stage_artifacts(
            &staging,
            "user-1",
            "bot-1",
            &[("id".to_string(), "bot-1".to_string())],
            Duration::from_secs(8_000),
        )
        .await
        .unwrap();

        assert!(staged.audio_url.contains("raw_recordings/user-1/bot-1/"));
        assert!(staged.audio_url.ends_with(".opus?sig=test"));
        assert!(staged.archive_url.contains("raw_combined/user-1/bot-1/"));
        assert!(staged.archive_key.starts_with("raw_combined/user-1/bot-1/"));
        assert!(staged.archive_key.ends_with(".tar"));

        let keys = staging.issued_keys().await;
        assert_eq!(keys.len(), 2);
    }

    #[tokio::test]
    async fn test_one_attempt_shares_a_request_id() {
        let staging = MockStaging::new();
        stage_artifacts(&staging, "user-1", "bot-1", &[], Duration::from_secs(60))
            .await
            .unwrap();

        // Both keys of one attempt carry the same leaf name, so the audio
        // and archive of an attempt can be paired downstream.
        let keys = staging.issued_keys().await;
        let audio_leaf = keys[0].rsplit('/').next().unwrap().trim_end_matches(".opus");
        let archive_leaf = keys[1].rsplit('/').next().unwrap().trim_end_matches(".tar");
        assert_eq!(audio_leaf, archive_leaf);
    }

    #[tokio::test]
    async fn test_repeat_staging_never_collides() {
        let staging = MockStaging::new();
        let first = stage_artifacts(&staging, "u", "b", &[], Duration::from_secs(60))
            .await
            .unwrap();
        let second = stage_artifacts(&staging, "u", "b", &[], Duration::from_secs(60))
            .await
            .unwrap();
        assert_ne!(first.archive_key, second.archive_key);
        assert_ne!(first.audio_url, second.audio_url);
    }
}
