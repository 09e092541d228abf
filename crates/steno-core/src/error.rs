// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for steno-core.

use thiserror::Error;

/// Result type using CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur while reading or mutating bot records.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoreError {
    /// Bot was not found in the record store.
    #[error("bot '{bot_id}' not found")]
    BotNotFound {
        /// The bot ID that was not found.
        bot_id: String,
    },

    /// A record field failed validation.
    #[error("invalid value for {field}: {message}")]
    ValidationError {
        /// The field that failed validation.
        field: String,
        /// The validation error message.
        message: String,
    },

    /// Database operation failed.
    #[error("database error during {operation}: {details}")]
    DatabaseError {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },
}

impl CoreError {
    /// Wrap a sqlx error with the name of the failed operation.
    pub fn database(operation: &str, err: sqlx::Error) -> Self {
        Self::DatabaseError {
            operation: operation.to_string(),
            details: err.to_string(),
        }
    }
}
