// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Background workers driving the coordinator on a cadence.
//!
//! Three loops, each owning one concern:
//! - [`SyncWorker`] reconciles launched bots against runtime truth
//! - [`LaunchWorker`] launches PENDING bots whose join time is near
//! - [`RecordWorker`] delivers finished recordings to the processing
//!   pipeline, skipping passes while the pipeline is unhealthy
//!
//! Each worker runs until its shutdown handle is notified.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::coordinator::BotCoordinator;
use crate::recorder::MetadataRecorder;

/// Background worker reconciling launched bots.
pub struct SyncWorker {
    coordinator: Arc<BotCoordinator>,
    interval: Duration,
    shutdown: Arc<Notify>,
}

impl SyncWorker {
    /// Create a sync worker running every `interval`.
    pub fn new(coordinator: Arc<BotCoordinator>, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run the reconciliation loop until shutdown.
    pub async fn run(&self) {
        info!(interval_secs = self.interval.as_secs(), "Sync worker started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Sync worker received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.coordinator.synchronize().await {
                        error!(error = %e, "Reconciliation pass failed");
                    }
                }
            }
        }

        info!("Sync worker stopped");
    }
}

/// Background worker launching scheduled bots.
pub struct LaunchWorker {
    coordinator: Arc<BotCoordinator>,
    interval: Duration,
    shutdown: Arc<Notify>,
}

impl LaunchWorker {
    /// Create a launch worker running every `interval`.
    pub fn new(coordinator: Arc<BotCoordinator>, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run the scheduled launch loop until shutdown.
    pub async fn run(&self) {
        info!(interval_secs = self.interval.as_secs(), "Launch worker started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Launch worker received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(self.interval) => {
                    match self.coordinator.run_scheduled_launches().await {
                        Ok(0) => {}
                        Ok(launched) => debug!(launched, "Scheduled launch pass finished"),
                        Err(e) => error!(error = %e, "Scheduled launch pass failed"),
                    }
                }
            }
        }

        info!("Launch worker stopped");
    }
}

/// Background worker delivering finished recordings downstream.
pub struct RecordWorker {
    coordinator: Arc<BotCoordinator>,
    recorder: Arc<dyn MetadataRecorder>,
    interval: Duration,
    shutdown: Arc<Notify>,
}

impl RecordWorker {
    /// Create a record worker running every `interval`.
    pub fn new(
        coordinator: Arc<BotCoordinator>,
        recorder: Arc<dyn MetadataRecorder>,
        interval: Duration,
    ) -> Self {
        Self {
            coordinator,
            recorder,
            interval,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run the recording loop until shutdown. Passes are skipped while the
    /// pipeline reports unhealthy so records are never fired into a dead
    /// endpoint.
    pub async fn run(&self) {
        info!(interval_secs = self.interval.as_secs(), "Record worker started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Record worker received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(self.interval) => {
                    if !self.recorder.health_check().await {
                        debug!("Processing pipeline unhealthy, skipping record pass");
                        continue;
                    }
                    match self.coordinator.record_completed(self.recorder.as_ref()).await {
                        Ok(0) => {}
                        Ok(recorded) => info!(recorded, "Record pass finished"),
                        Err(e) => error!(error = %e, "Record pass failed"),
                    }
                }
            }
        }

        info!("Record worker stopped");
    }
}
