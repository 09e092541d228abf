// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Steno Fleet - Meeting Bot Coordinator
//!
//! Launches ephemeral recording bots into an external task runtime, tracks
//! them in durable records, and recovers from infrastructure failures. The
//! runtime is treated as an unreliable remote authority: it never calls
//! back, so the fleet polls it and reconciles what it learns into the
//! store.
//!
//! # Architecture
//!
//! ```text
//!                     ┌──────────────────┐
//!   create/stop ─────▶│  BotCoordinator  │◀───── workers (sync, launch,
//!                     └───┬────┬────┬────┘               record, retry)
//!                         │    │    │
//!            ┌────────────┘    │    └────────────┐
//!            ▼                 ▼                 ▼
//!      ┌──────────┐     ┌────────────┐    ┌───────────┐
//!      │ BotStore │     │ TaskRuntime│    │  Staging  │
//!      │ (records)│     │   (ECS)    │    │ (S3 PUT)  │
//!      └──────────┘     └────────────┘    └───────────┘
//! ```
//!
//! # Modules
//!
//! - [`coordinator`]: Bot lifecycle operations
//! - [`runtime`]: Task runtime clients and stop-code classification
//! - [`staging`]: Presigned artifact upload URLs
//! - [`template`]: Platform dispatch and worker command construction
//! - [`workers`]: Periodic reconciliation, launch, and record loops
//! - [`retry`]: Relaunch queue worker
//! - [`recorder`]: Downstream metadata recording
//! - [`sigv4`]: Request signing shared by runtime and staging
//! - [`config`]: Environment configuration
//! - [`error`]: Error types

#![deny(missing_docs)]

/// Environment configuration.
pub mod config;

/// Bot lifecycle coordination.
pub mod coordinator;

/// Error types for steno-fleet.
pub mod error;

/// Downstream metadata recording.
pub mod recorder;

/// Relaunch queue worker.
pub mod retry;

/// Task runtime clients.
pub mod runtime;

/// Request signing.
pub mod sigv4;

/// Artifact upload staging.
pub mod staging;

/// Launch plan construction.
pub mod template;

/// Background workers.
pub mod workers;

pub use config::Config;
pub use coordinator::{BotCoordinator, CreateBotRequest, SyncReport};
pub use error::{Error, Result};
