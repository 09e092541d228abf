// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Retry queue worker.
//!
//! Reconciliation enqueues the id of every bot that failed for
//! infrastructure reasons. This worker drains the queue and asks the
//! coordinator to evaluate each one for a relaunch. Delivery is at least
//! once; [`BotCoordinator::reinitiate`] rechecks status and budget on
//! every evaluation, so duplicates are harmless.

use std::sync::Arc;

use tokio::sync::Notify;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::coordinator::BotCoordinator;

/// Background worker evaluating relaunches for failed bots.
pub struct RetryWorker {
    coordinator: Arc<BotCoordinator>,
    rx: mpsc::UnboundedReceiver<String>,
    shutdown: Arc<Notify>,
}

impl RetryWorker {
    /// Create a retry worker draining `rx`.
    pub fn new(coordinator: Arc<BotCoordinator>, rx: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            coordinator,
            rx,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Drain the retry queue until shutdown or until every sender is gone.
    pub async fn run(mut self) {
        info!("Retry worker started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Retry worker received shutdown signal");
                    break;
                }

                item = self.rx.recv() => {
                    let Some(bot_id) = item else {
                        info!("Retry queue closed");
                        break;
                    };
                    if let Err(e) = self.coordinator.reinitiate(&bot_id).await {
                        error!(bot_id = %bot_id, error = %e, "Relaunch evaluation failed");
                    }
                }
            }
        }

        info!("Retry worker stopped");
    }
}
