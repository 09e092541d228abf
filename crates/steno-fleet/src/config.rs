// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for steno-fleet.

use std::time::Duration;

use steno_core::platform::MeetingPlatform;

/// Task template a platform launch resolves to.
#[derive(Debug, Clone)]
pub struct TaskTemplate {
    /// Task definition family or ARN registered with the task runtime.
    pub task_definition: String,
    /// Container name inside the task definition that receives the
    /// command override.
    pub container_name: String,
}

/// Fleet configuration loaded from environment variables.
///
/// Loaded once at startup and shared immutably; nothing mutates it after
/// `from_env` returns.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL for bot records
    pub database_url: String,
    /// Access key id for signing runtime and staging requests
    pub access_key: String,
    /// Secret access key for signing runtime and staging requests
    pub secret_key: String,
    /// Region the task runtime and artifact bucket live in
    pub region: String,
    /// Cluster the fleet launches tasks into
    pub cluster: String,
    /// Subnet for task networking
    pub subnet: String,
    /// Security group for task networking
    pub security_group: String,
    /// Bucket recording artifacts are uploaded to
    pub artifact_bucket: String,
    /// Task template for Google Meet bots
    pub google_template: TaskTemplate,
    /// Task template for Zoom bots
    pub zoom_template: TaskTemplate,
    /// Task template for Teams bots
    pub teams_template: TaskTemplate,
    /// Maximum automatic relaunches per bot
    pub max_retries: i32,
    /// How far ahead of join_at a scheduled launch pass looks
    pub launch_lookahead: Duration,
    /// How far back reconciliation looks for launched bots
    pub sync_window: Duration,
    /// Maximum seconds a worker waits inside the meeting before giving up
    pub worker_max_wait_secs: u64,
    /// Lifetime of issued artifact upload URLs
    pub upload_ttl: Duration,
    /// Interval between reconciliation passes
    pub sync_interval: Duration,
    /// Interval between scheduled launch passes
    pub launch_interval: Duration,
    /// Interval between metadata recording passes
    pub record_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: require("STENO_DATABASE_URL")?,
            access_key: require("STENO_AWS_ACCESS_KEY")?,
            secret_key: require("STENO_AWS_SECRET_KEY")?,
            region: require("STENO_AWS_REGION")?,
            cluster: require("STENO_CLUSTER")?,
            subnet: require("STENO_SUBNET")?,
            security_group: require("STENO_SECURITY_GROUP")?,
            artifact_bucket: require("STENO_ARTIFACT_BUCKET")?,
            google_template: TaskTemplate {
                task_definition: require("STENO_TASK_DEFINITION_GOOGLE")?,
                container_name: require("STENO_CONTAINER_GOOGLE")?,
            },
            zoom_template: TaskTemplate {
                task_definition: require("STENO_TASK_DEFINITION_ZOOM")?,
                container_name: require("STENO_CONTAINER_ZOOM")?,
            },
            teams_template: TaskTemplate {
                task_definition: require("STENO_TASK_DEFINITION_TEAMS")?,
                container_name: require("STENO_CONTAINER_TEAMS")?,
            },
            max_retries: parse_or("STENO_MAX_RETRIES", 2)?,
            launch_lookahead: secs_or("STENO_LAUNCH_LOOKAHEAD_SECS", 600)?,
            sync_window: secs_or("STENO_SYNC_WINDOW_SECS", 86_400)?,
            worker_max_wait_secs: parse_or("STENO_WORKER_MAX_WAIT_SECS", 8_100)?,
            upload_ttl: secs_or("STENO_UPLOAD_TTL_SECS", 8_000)?,
            sync_interval: secs_or("STENO_SYNC_INTERVAL_SECS", 300)?,
            launch_interval: secs_or("STENO_LAUNCH_INTERVAL_SECS", 600)?,
            record_interval: secs_or("STENO_RECORD_INTERVAL_SECS", 60)?,
        })
    }

    /// The task template registered for a platform.
    pub fn template_for(&self, platform: MeetingPlatform) -> &TaskTemplate {
        match platform {
            MeetingPlatform::GoogleMeet => &self.google_template,
            MeetingPlatform::Zoom => &self.zoom_template,
            MeetingPlatform::Teams => &self.teams_template,
        }
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name))
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue(name)),
        Err(_) => Ok(default),
    }
}

fn secs_or(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    Ok(Duration::from_secs(parse_or(name, default)?))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    /// An environment variable holds an unparseable value.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
