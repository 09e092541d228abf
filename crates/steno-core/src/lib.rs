// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Steno Core - Durable Bot Records
//!
//! Core owns the data model of the steno fleet: the durable record of
//! every meeting-recording bot, its lifecycle status, and the persistence
//! backends the fleet coordinator mutates one row at a time.
//!
//! # Bot Status State Machine
//!
//! ```text
//!                  ┌─────────┐
//!                  │ PENDING │
//!                  └────┬────┘
//!                       │ launch
//!                       ▼
//!                  ┌─────────┐
//!        ┌─────────│ STARTED │─────────┐
//!        │         └────┬────┘         │
//!        │              │              │
//!   clean stop     infra stop       leave
//!        │              │              │
//!        ▼              ▼              ▼
//!  ┌───────────┐   ┌────────┐   ┌─────────┐
//!  │ COMPLETED │   │ FAILED │   │ STOPPED │
//!  └───────────┘   └───┬────┘   └─────────┘
//!                      │
//!                      │ reinitiate (retry_count < max_retries)
//!                      ▼
//!                  ┌─────────┐
//!                  │ STARTED │
//!                  └─────────┘
//! ```
//!
//! `COMPLETED` and `STOPPED` are terminal. `FAILED` becomes terminal once
//! the retry budget is exhausted.
//!
//! # Modules
//!
//! - [`bot`]: Bot record types, lifecycle states, and partial updates
//! - [`platform`]: Meeting URL to platform resolution
//! - [`persistence`]: The [`persistence::BotStore`] trait with PostgreSQL
//!   and SQLite backends
//! - [`credentials`]: Owning-credential to user resolution
//! - [`migrations`]: Embedded database migrations
//! - [`error`]: Error types for record operations

#![deny(missing_docs)]

/// Bot record types, lifecycle states, and partial updates.
pub mod bot;

/// Owning-credential lookup.
pub mod credentials;

/// Error types for steno-core.
pub mod error;

/// Embedded database migrations.
pub mod migrations;

/// Bot record persistence trait and backends.
pub mod persistence;

/// Meeting platform resolution.
pub mod platform;

pub use bot::{BotPatch, BotRecord, BotStatus, NewBot, RecordingMode};
pub use error::CoreError;
pub use platform::{MeetingPlatform, resolve_platform};
