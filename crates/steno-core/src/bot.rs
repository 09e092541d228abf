// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bot record types and lifecycle states.
//!
//! A bot is one scheduled or in-progress meeting-recording session. Its
//! lifecycle is driven by the fleet coordinator: records move through
//! `PENDING → STARTED → {COMPLETED | FAILED | STOPPED}`, with `FAILED`
//! bots eligible for re-initiation while their retry budget lasts.

use chrono::{DateTime, Utc};

/// Lifecycle status of a bot.
///
/// Stored as uppercase text in the `bots.status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotStatus {
    /// Created but not yet launched (waiting for its join time).
    Pending,
    /// A remote task is (believed to be) running for this bot.
    Started,
    /// The task stopped without an infrastructure error. Terminal.
    Completed,
    /// The task stopped with an infrastructure error, or reconciliation
    /// failed. Terminal once the retry budget is exhausted.
    Failed,
    /// Explicitly stopped by the owner. Terminal.
    Stopped,
}

impl BotStatus {
    /// The database representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Started => "STARTED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Stopped => "STOPPED",
        }
    }

    /// Parse a database status string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "STARTED" => Some(Self::Started),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            "STOPPED" => Some(Self::Stopped),
            _ => None,
        }
    }

    /// Whether no further automatic transitions are possible from this
    /// status. `FAILED` is excluded: it may transition back to `STARTED`
    /// through re-initiation while under the retry budget.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped)
    }
}

impl std::fmt::Display for BotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the worker records the meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingMode {
    /// Record the active speaker video.
    SpeakerView,
    /// Record the gallery video.
    GalleryView,
    /// Record audio only.
    #[default]
    AudioOnly,
}

impl RecordingMode {
    /// The database representation of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpeakerView => "SPEAKER_VIEW",
            Self::GalleryView => "GALLERY_VIEW",
            Self::AudioOnly => "AUDIO_ONLY",
        }
    }

    /// Parse a database mode string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SPEAKER_VIEW" => Some(Self::SpeakerView),
            "GALLERY_VIEW" => Some(Self::GalleryView),
            "AUDIO_ONLY" => Some(Self::AudioOnly),
            _ => None,
        }
    }
}

/// Bot record from the persistence layer.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct BotRecord {
    /// Unique identifier (UUID, generated at creation).
    pub id: String,
    /// Display name the worker joins the meeting with.
    pub name: String,
    /// Optional meeting title, forwarded downstream with the artifact.
    pub title: Option<String>,
    /// URL of the meeting to record.
    pub meeting_url: String,
    /// Resolved meeting platform (see [`crate::platform::MeetingPlatform`]).
    pub platform: String,
    /// Recording mode (see [`RecordingMode`]).
    pub recording_mode: String,
    /// When the bot should join the meeting.
    pub join_at: DateTime<Utc>,
    /// Credential that created this bot. Immutable.
    pub credential_id: String,
    /// External task handle, set once the bot has been launched.
    /// A bot never holds two live handles: a re-launch supersedes the
    /// previous handle in place.
    pub task_handle: Option<String>,
    /// Automatic re-initiations performed so far.
    pub retry_count: i32,
    /// Current lifecycle status (see [`BotStatus`]).
    pub status: String,
    /// Object key of the combined archive, set when artifacts are staged.
    pub archive_key: Option<String>,
    /// Free-form caller metadata.
    pub metadata: Option<serde_json::Value>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last modified.
    pub updated_at: DateTime<Utc>,
}

impl BotRecord {
    /// Parsed lifecycle status. `None` if the stored value is unknown.
    pub fn lifecycle(&self) -> Option<BotStatus> {
        BotStatus::parse(&self.status)
    }

    /// Whether the stored status equals the given one.
    pub fn has_status(&self, status: BotStatus) -> bool {
        self.status == status.as_str()
    }
}

/// Parameters for creating a new bot record.
///
/// Everything here is immutable after creation; runtime state (status,
/// task handle, retry count, archive key) lives on the record itself.
#[derive(Debug, Clone)]
pub struct NewBot {
    /// Display name the worker joins the meeting with.
    pub name: String,
    /// URL of the meeting to record.
    pub meeting_url: String,
    /// Resolved platform, as stored text.
    pub platform: String,
    /// Recording mode.
    pub recording_mode: RecordingMode,
    /// Desired join time. `None` means "join now".
    pub join_at: Option<DateTime<Utc>>,
    /// Optional meeting title.
    pub title: Option<String>,
    /// Free-form caller metadata.
    pub metadata: Option<serde_json::Value>,
    /// Owning credential.
    pub credential_id: String,
}

/// Partial update applied atomically to a single bot row.
///
/// `None` fields are left untouched. There is deliberately no way to
/// null out a field: runtime state only ever moves forward.
#[derive(Debug, Clone, Default)]
pub struct BotPatch {
    /// New lifecycle status.
    pub status: Option<BotStatus>,
    /// New external task handle (supersedes the previous one).
    pub task_handle: Option<String>,
    /// Archive object key staged for this launch.
    pub archive_key: Option<String>,
    /// New retry count.
    pub retry_count: Option<i32>,
}

impl BotPatch {
    /// Patch that only changes the lifecycle status.
    pub fn status(status: BotStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}
