// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence interfaces and backends for steno-core.
//!
//! The fleet only ever mutates a single bot row at a time; there are no
//! multi-row transactions across bots. Every method here is a single
//! atomic statement against one row or a range query.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresBotStore;
pub use self::sqlite::SqliteBotStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::bot::{BotPatch, BotRecord, NewBot};
use crate::error::CoreError;

/// Bot record store used by the fleet coordinator.
#[async_trait]
pub trait BotStore: Send + Sync {
    /// Persist a new bot in `PENDING` with a fresh id, returning the record.
    async fn create(&self, new_bot: &NewBot) -> Result<BotRecord, CoreError>;

    /// Fetch a bot by id.
    async fn get(&self, bot_id: &str) -> Result<Option<BotRecord>, CoreError>;

    /// Apply a partial update to a single bot row atomically.
    ///
    /// Returns [`CoreError::BotNotFound`] if the row does not exist.
    async fn update_fields(&self, bot_id: &str, patch: &BotPatch) -> Result<(), CoreError>;

    /// All `PENDING` bots whose join time falls within `[from, to]`,
    /// oldest-created first.
    async fn find_pending_due(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BotRecord>, CoreError>;

    /// All `STARTED` bots with a task handle, created at or after `cutoff`.
    async fn find_started_created_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<BotRecord>, CoreError>;

    /// Bots holding a task handle whose local record has not reached
    /// `COMPLETED` or `FAILED`, created at or after `cutoff`.
    async fn find_unreconciled_with_task_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<BotRecord>, CoreError>;

    /// Page through bots, newest-created first.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<BotRecord>, CoreError>;

    /// Total number of bot records.
    async fn count(&self) -> Result<i64, CoreError>;
}

/// Columns selected for every [`BotRecord`] query.
pub(crate) const BOT_COLUMNS: &str = "id, name, title, meeting_url, platform, recording_mode, \
     join_at, credential_id, task_handle, retry_count, status, archive_key, metadata, \
     created_at, updated_at";
