// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for steno-fleet.

use thiserror::Error;

/// Fleet errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Task runtime call failed.
    #[error("Runtime error: {0}")]
    Runtime(#[from] crate::runtime::RuntimeError),

    /// Core persistence operation failed.
    #[error("Core error: {0}")]
    Core(#[from] steno_core::error::CoreError),

    /// The meeting URL did not match any supported platform.
    #[error("Unsupported meeting URL: {0}")]
    UnsupportedMeetingUrl(String),

    /// Bot was not found.
    #[error("Bot not found: {0}")]
    BotNotFound(String),

    /// Upload URL staging failed.
    #[error("Staging error: {0}")]
    Staging(#[from] crate::staging::StagingError),

    /// The runtime accepted the launch request but started nothing.
    #[error("Launch failed for bot {0}: no task started")]
    LaunchFailed(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type using the fleet Error.
pub type Result<T> = std::result::Result<T, Error>;
