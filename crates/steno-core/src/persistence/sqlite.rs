// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed bot store.
//!
//! Used for embedded deployments and tests; production runs on the
//! PostgreSQL backend.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

use crate::bot::{BotPatch, BotRecord, BotStatus, NewBot};
use crate::credentials::CredentialDirectory;
use crate::error::CoreError;

use super::{BOT_COLUMNS, BotStore};

/// SQLite-backed bot store.
#[derive(Clone)]
pub struct SqliteBotStore {
    pool: SqlitePool,
}

impl SqliteBotStore {
    /// Create a new store from an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create and initialize a store from a database file path.
    ///
    /// Creates parent directories and the database file if needed, then
    /// runs all migrations.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::DatabaseError {
                operation: "create_dir".to_string(),
                details: format!("failed to create directory {:?}: {}", parent, e),
            })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| CoreError::database("connect", e))?;

        Self::migrated(pool).await
    }

    /// Create and initialize an in-memory store. Intended for tests.
    pub async fn in_memory() -> Result<Self, CoreError> {
        // A single connection keeps the in-memory database alive and shared.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| CoreError::database("connect", e))?;

        Self::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> Result<Self, CoreError> {
        crate::migrations::run_sqlite(&pool)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "migrate".to_string(),
                details: e.to_string(),
            })?;
        tracing::debug!("SQLite bot store migrated");
        Ok(Self { pool })
    }

    /// The underlying pool, for wiring collaborators onto the same database.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl BotStore for SqliteBotStore {
    async fn create(&self, new_bot: &NewBot) -> Result<BotRecord, CoreError> {
        let now = Utc::now();
        let record = BotRecord {
            id: Uuid::new_v4().to_string(),
            name: new_bot.name.clone(),
            title: new_bot.title.clone(),
            meeting_url: new_bot.meeting_url.clone(),
            platform: new_bot.platform.clone(),
            recording_mode: new_bot.recording_mode.as_str().to_string(),
            join_at: new_bot.join_at.unwrap_or(now),
            credential_id: new_bot.credential_id.clone(),
            task_handle: None,
            retry_count: 0,
            status: BotStatus::Pending.as_str().to_string(),
            archive_key: None,
            metadata: new_bot.metadata.clone(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO bots (id, name, title, meeting_url, platform, recording_mode,
                              join_at, credential_id, retry_count, status, metadata,
                              created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.title)
        .bind(&record.meeting_url)
        .bind(&record.platform)
        .bind(&record.recording_mode)
        .bind(record.join_at)
        .bind(&record.credential_id)
        .bind(&record.status)
        .bind(&record.metadata)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::database("create_bot", e))?;

        Ok(record)
    }

    async fn get(&self, bot_id: &str) -> Result<Option<BotRecord>, CoreError> {
        sqlx::query_as::<_, BotRecord>(&format!(
            "SELECT {BOT_COLUMNS} FROM bots WHERE id = ?"
        ))
        .bind(bot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CoreError::database("get_bot", e))
    }

    async fn update_fields(&self, bot_id: &str, patch: &BotPatch) -> Result<(), CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE bots
            SET status = COALESCE(?, status),
                task_handle = COALESCE(?, task_handle),
                archive_key = COALESCE(?, archive_key),
                retry_count = COALESCE(?, retry_count),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(patch.status.map(|s| s.as_str()))
        .bind(&patch.task_handle)
        .bind(&patch.archive_key)
        .bind(patch.retry_count)
        .bind(Utc::now())
        .bind(bot_id)
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::database("update_bot", e))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::BotNotFound {
                bot_id: bot_id.to_string(),
            });
        }
        Ok(())
    }

    async fn find_pending_due(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BotRecord>, CoreError> {
        sqlx::query_as::<_, BotRecord>(&format!(
            "SELECT {BOT_COLUMNS} FROM bots \
             WHERE status = ? AND join_at BETWEEN ? AND ? \
             ORDER BY created_at ASC"
        ))
        .bind(BotStatus::Pending.as_str())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::database("find_pending_due", e))
    }

    async fn find_started_created_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<BotRecord>, CoreError> {
        sqlx::query_as::<_, BotRecord>(&format!(
            "SELECT {BOT_COLUMNS} FROM bots \
             WHERE status = ? AND task_handle IS NOT NULL AND created_at >= ? \
             ORDER BY created_at ASC"
        ))
        .bind(BotStatus::Started.as_str())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::database("find_started_created_since", e))
    }

    async fn find_unreconciled_with_task_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<BotRecord>, CoreError> {
        sqlx::query_as::<_, BotRecord>(&format!(
            "SELECT {BOT_COLUMNS} FROM bots \
             WHERE task_handle IS NOT NULL AND status NOT IN (?, ?) AND created_at >= ? \
             ORDER BY created_at ASC"
        ))
        .bind(BotStatus::Completed.as_str())
        .bind(BotStatus::Failed.as_str())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::database("find_unreconciled_with_task_since", e))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<BotRecord>, CoreError> {
        sqlx::query_as::<_, BotRecord>(&format!(
            "SELECT {BOT_COLUMNS} FROM bots ORDER BY created_at DESC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::database("list_bots", e))
    }

    async fn count(&self) -> Result<i64, CoreError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bots")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CoreError::database("count_bots", e))
    }
}

#[async_trait]
impl CredentialDirectory for SqliteBotStore {
    async fn owner_of(&self, credential_id: &str) -> Result<Option<String>, CoreError> {
        sqlx::query_scalar::<_, String>("SELECT user_id FROM api_keys WHERE id = ?")
            .bind(credential_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CoreError::database("owner_of", e))
    }
}
