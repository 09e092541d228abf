// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Task runtime abstraction.
//!
//! The fleet treats the container orchestrator as a remote authority it can
//! launch into, stop, and interrogate, but never trusts to push state back.
//! Everything the coordinator knows about a task it learned by asking.

use async_trait::async_trait;

/// Task runtime errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RuntimeError {
    /// The launch request was accepted but no task started.
    #[error("Runtime started no tasks")]
    NoTasksStarted,

    /// The runtime has no record of the task handle.
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// The runtime rejected the request.
    #[error("Runtime API error {code}: {message}")]
    Api {
        /// Error type returned by the runtime API.
        code: String,
        /// Human-readable message returned by the runtime API.
        message: String,
    },

    /// The request never reached the runtime or the response was unreadable.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The runtime response did not decode.
    #[error("Response decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Snapshot of a task as the runtime last saw it.
#[derive(Debug, Clone)]
pub struct TaskDescription {
    /// Task handle the snapshot describes.
    pub handle: String,
    /// Runtime lifecycle status, e.g. `RUNNING` or `STOPPED`.
    pub last_status: String,
    /// Machine-readable stop code, present once the task stopped for a
    /// reason the runtime can classify.
    pub stop_code: Option<String>,
    /// Free-text stop reason, if the runtime recorded one.
    pub stopped_reason: Option<String>,
    /// Task definition the task was launched from.
    pub task_definition: String,
    /// Container name the command override targeted.
    pub container_name: Option<String>,
    /// Command override the task was launched with.
    pub command: Option<Vec<String>>,
}

impl TaskDescription {
    /// Whether the runtime reports the task as stopped.
    pub fn is_stopped(&self) -> bool {
        self.last_status.eq_ignore_ascii_case("STOPPED")
    }
}

/// Client for the external task runtime.
#[async_trait]
pub trait TaskRuntime: Send + Sync {
    /// Launch `count` tasks from `task_definition`, overriding the command
    /// of `container_name`. Returns one handle per started task.
    ///
    /// Returns [`RuntimeError::NoTasksStarted`] when the request was
    /// accepted but the started-task list came back empty.
    async fn run_task(
        &self,
        task_definition: &str,
        container_name: &str,
        command: &[String],
        count: u32,
    ) -> Result<Vec<String>>;

    /// Stop the task identified by `handle`.
    async fn stop_task(&self, handle: &str) -> Result<()>;

    /// Describe the task identified by `handle`.
    async fn describe_task(&self, handle: &str) -> Result<TaskDescription>;

    /// List the handles of tasks currently known to the runtime.
    async fn list_tasks(&self) -> Result<Vec<String>>;
}
