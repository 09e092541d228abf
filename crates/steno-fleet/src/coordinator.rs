// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bot lifecycle coordination.
//!
//! The coordinator owns every transition a bot record can make: creation,
//! launch into the task runtime, reconciliation against runtime truth,
//! relaunch after infrastructure failures, and operator-initiated stops.
//! The runtime never pushes state here; the coordinator always pulls.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use steno_core::bot::{BotPatch, BotRecord, BotStatus, NewBot, RecordingMode};
use steno_core::credentials::CredentialDirectory;
use steno_core::persistence::BotStore;
use steno_core::platform::{MeetingPlatform, resolve_platform};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::recorder::{ArtifactRecord, MetadataRecorder};
use crate::runtime::{TaskRuntime, is_infra_failure};
use crate::staging::{ArtifactStaging, stage_artifacts};
use crate::template::build_launch_plan;

/// Request to create a bot.
#[derive(Debug, Clone)]
pub struct CreateBotRequest {
    /// Display name the bot joins the meeting under.
    pub name: String,
    /// Meeting URL the bot should join.
    pub meeting_url: String,
    /// Meeting title, if the caller knows it.
    pub title: Option<String>,
    /// Recording mode for the session.
    pub recording_mode: RecordingMode,
    /// When the bot should join. Absent means immediately.
    pub join_at: Option<DateTime<Utc>>,
    /// Caller-supplied metadata carried on the record.
    pub metadata: Option<serde_json::Value>,
    /// Credential the bot is created under.
    pub credential_id: String,
}

/// Counts from one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Bots examined this pass.
    pub examined: usize,
    /// Bots moved to COMPLETED.
    pub completed: usize,
    /// Bots moved to FAILED.
    pub failed: usize,
}

/// Coordinates bot lifecycle against the store and the task runtime.
pub struct BotCoordinator {
    store: Arc<dyn BotStore>,
    credentials: Arc<dyn CredentialDirectory>,
    runtime: Arc<dyn TaskRuntime>,
    staging: Arc<dyn ArtifactStaging>,
    config: Config,
    retry_tx: mpsc::UnboundedSender<String>,
}

impl BotCoordinator {
    /// Create a coordinator. `retry_tx` receives the id of every bot that
    /// failed for infrastructure reasons and should be evaluated for a
    /// relaunch.
    pub fn new(
        store: Arc<dyn BotStore>,
        credentials: Arc<dyn CredentialDirectory>,
        runtime: Arc<dyn TaskRuntime>,
        staging: Arc<dyn ArtifactStaging>,
        config: Config,
        retry_tx: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            store,
            credentials,
            runtime,
            staging,
            config,
            retry_tx,
        }
    }

    /// Create a bot record. The meeting URL must resolve to a supported
    /// platform or nothing is persisted.
    ///
    /// A bot with no join time, or a join time already in the past, is
    /// launched immediately; otherwise it stays PENDING until a scheduled
    /// launch pass picks it up.
    pub async fn create(&self, request: CreateBotRequest) -> Result<BotRecord> {
        let platform = resolve_platform(&request.meeting_url)
            .ok_or_else(|| Error::UnsupportedMeetingUrl(request.meeting_url.clone()))?;

        let bot = self
            .store
            .create(&NewBot {
                name: request.name,
                meeting_url: request.meeting_url,
                platform: platform.as_str().to_string(),
                recording_mode: request.recording_mode,
                join_at: request.join_at,
                title: request.title,
                metadata: request.metadata,
                credential_id: request.credential_id,
            })
            .await?;

        info!(bot_id = %bot.id, platform = %platform, join_at = %bot.join_at, "Bot created");

        let immediate = request.join_at.is_none_or(|at| at <= Utc::now());
        if immediate {
            self.launch(&bot.id).await?;
            // Re-read so the caller sees the launched state.
            return Ok(self
                .store
                .get(&bot.id)
                .await?
                .ok_or_else(|| Error::BotNotFound(bot.id.clone()))?);
        }

        Ok(bot)
    }

    /// Launch a bot into the task runtime.
    ///
    /// Stages upload URLs, resolves the platform launch plan, starts one
    /// task, and records the handle with status STARTED. There is no guard
    /// against launching a bot that already has a live task; callers
    /// serialize launches per bot, and a second call starts a second task
    /// whose handle overwrites the first.
    pub async fn launch(&self, bot_id: &str) -> Result<()> {
        let bot = self
            .store
            .get(bot_id)
            .await?
            .ok_or_else(|| Error::BotNotFound(bot_id.to_string()))?;

        let platform = resolve_platform(&bot.meeting_url)
            .ok_or_else(|| Error::UnsupportedMeetingUrl(bot.meeting_url.clone()))?;

        let owner_id = self
            .credentials
            .owner_of(&bot.credential_id)
            .await?
            .ok_or_else(|| {
                Error::Other(format!("Credential {} has no owner", bot.credential_id))
            })?;

        let staged = stage_artifacts(
            self.staging.as_ref(),
            &owner_id,
            &bot.id,
            &upload_metadata(&bot, &owner_id, platform),
            self.config.upload_ttl,
        )
        .await?;

        let plan = build_launch_plan(
            &self.config,
            platform,
            &bot.meeting_url,
            &bot.name,
            &staged.archive_url,
            &staged.audio_url,
        );

        let handles = self
            .runtime
            .run_task(&plan.task_definition, &plan.container_name, &plan.command, 1)
            .await?;
        let handle = handles
            .into_iter()
            .next()
            .ok_or_else(|| Error::LaunchFailed(bot.id.clone()))?;

        self.store
            .update_fields(
                &bot.id,
                &BotPatch {
                    status: Some(BotStatus::Started),
                    task_handle: Some(handle.clone()),
                    archive_key: Some(staged.archive_key),
                    retry_count: None,
                },
            )
            .await?;

        info!(bot_id = %bot.id, task = %handle, platform = %platform, "Bot launched");
        Ok(())
    }

    /// Launch every PENDING bot whose join time falls inside the lookahead
    /// window. Failures are isolated per bot so one broken launch never
    /// starves the rest of the window. Returns the number launched.
    pub async fn run_scheduled_launches(&self) -> Result<usize> {
        let now = Utc::now();
        let until = now + to_chrono(self.config.launch_lookahead)?;
        let due = self.store.find_pending_due(now, until).await?;

        if due.is_empty() {
            debug!("No bots due for launch");
            return Ok(0);
        }

        info!(count = due.len(), "Launching scheduled bots");

        let mut launched = 0;
        for bot in due {
            match self.launch(&bot.id).await {
                Ok(()) => launched += 1,
                Err(e) => {
                    error!(bot_id = %bot.id, error = %e, "Scheduled launch failed");
                }
            }
        }
        Ok(launched)
    }

    /// Reconcile launched bots against runtime truth.
    ///
    /// For every STARTED bot created inside the sync window, ask the
    /// runtime what its task looks like now. A stopped task with an
    /// infrastructure stop code marks the bot FAILED and queues it for a
    /// relaunch evaluation; any other stopped task is a normal completion.
    /// A describe failure also marks the bot FAILED, conservatively and
    /// without queuing a relaunch, since the task may still be running.
    ///
    /// Idempotent while a task is still running: the pass observes RUNNING
    /// and changes nothing.
    pub async fn synchronize(&self) -> Result<SyncReport> {
        let cutoff = Utc::now() - to_chrono(self.config.sync_window)?;
        let bots = self.store.find_started_created_since(cutoff).await?;

        let mut report = SyncReport {
            examined: bots.len(),
            ..SyncReport::default()
        };

        for bot in bots {
            if let Err(e) = self.synchronize_one(&bot, &mut report).await {
                error!(bot_id = %bot.id, error = %e, "Failed to reconcile bot");
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                completed = report.completed,
                failed = report.failed,
                "Reconciliation pass finished"
            );
        }
        Ok(report)
    }

    async fn synchronize_one(&self, bot: &BotRecord, report: &mut SyncReport) -> Result<()> {
        let Some(handle) = bot.task_handle.as_deref() else {
            return Ok(());
        };

        let description = match self.runtime.describe_task(handle).await {
            Ok(description) => description,
            Err(e) => {
                // Task state is unknown; fail the record so it is never
                // silently stuck, but do not queue a relaunch on top of a
                // possibly live task.
                warn!(bot_id = %bot.id, task = handle, error = %e, "Describe failed, marking bot failed");
                self.store
                    .update_fields(&bot.id, &BotPatch::status(BotStatus::Failed))
                    .await?;
                report.failed += 1;
                return Ok(());
            }
        };

        if !description.is_stopped() {
            return Ok(());
        }

        if is_infra_failure(description.stop_code.as_deref()) {
            warn!(
                bot_id = %bot.id,
                task = handle,
                stop_code = %description.stop_code.as_deref().unwrap_or(""),
                reason = ?description.stopped_reason,
                "Task stopped by infrastructure"
            );
            self.store
                .update_fields(&bot.id, &BotPatch::status(BotStatus::Failed))
                .await?;
            report.failed += 1;

            if self.retry_tx.send(bot.id.clone()).is_err() {
                warn!(bot_id = %bot.id, "Retry queue closed, relaunch evaluation dropped");
            }
        } else {
            debug!(bot_id = %bot.id, task = handle, "Task stopped cleanly");
            self.store
                .update_fields(&bot.id, &BotPatch::status(BotStatus::Completed))
                .await?;
            report.completed += 1;
        }

        Ok(())
    }

    /// Relaunch a FAILED bot if it has retry budget left.
    ///
    /// The replacement task is rebuilt from the dead task's own recorded
    /// launch parameters, so a relaunch reuses the original upload URLs
    /// rather than staging new ones. Silently does nothing when the bot is
    /// missing, not FAILED, or out of budget; at-least-once queue delivery
    /// makes duplicate evaluations of the same bot harmless.
    pub async fn reinitiate(&self, bot_id: &str) -> Result<()> {
        let Some(bot) = self.store.get(bot_id).await? else {
            debug!(bot_id, "Relaunch evaluation for unknown bot, skipping");
            return Ok(());
        };

        if !bot.has_status(BotStatus::Failed) {
            debug!(bot_id, status = %bot.status, "Bot no longer failed, skipping relaunch");
            return Ok(());
        }

        if bot.retry_count >= self.config.max_retries {
            info!(
                bot_id,
                retry_count = bot.retry_count,
                "Retry budget exhausted, bot stays failed"
            );
            return Ok(());
        }

        let Some(handle) = bot.task_handle.as_deref() else {
            warn!(bot_id, "Failed bot has no task handle, cannot relaunch");
            return Ok(());
        };

        let description = match self.runtime.describe_task(handle).await {
            Ok(description) => description,
            Err(e) => {
                warn!(bot_id, task = handle, error = %e, "Cannot describe dead task, relaunch skipped");
                return Ok(());
            }
        };

        let (Some(container_name), Some(command)) =
            (description.container_name, description.command)
        else {
            warn!(bot_id, task = handle, "Dead task carried no launch parameters");
            return Ok(());
        };
        // The describe response carries the full definition ARN; RunTask
        // wants the family:revision segment.
        let task_definition = description
            .task_definition
            .rsplit('/')
            .next()
            .unwrap_or(&description.task_definition)
            .to_string();

        let handles = match self
            .runtime
            .run_task(&task_definition, &container_name, &command, 1)
            .await
        {
            Ok(handles) => handles,
            Err(e) => {
                error!(bot_id, error = %e, "Relaunch failed, bot stays failed");
                return Ok(());
            }
        };
        let Some(new_handle) = handles.into_iter().next() else {
            error!(bot_id, "Relaunch started no tasks, bot stays failed");
            return Ok(());
        };

        self.store
            .update_fields(
                &bot.id,
                &BotPatch {
                    status: Some(BotStatus::Started),
                    task_handle: Some(new_handle.clone()),
                    archive_key: None,
                    retry_count: Some(bot.retry_count + 1),
                },
            )
            .await?;

        info!(
            bot_id,
            task = %new_handle,
            retry = bot.retry_count + 1,
            "Bot relaunched"
        );
        Ok(())
    }

    /// Stop a bot's task and mark the record STOPPED.
    ///
    /// If the runtime refuses the stop, the error propagates and the record
    /// keeps its current status; a later call can try again.
    pub async fn stop(&self, bot_id: &str) -> Result<()> {
        let bot = self
            .store
            .get(bot_id)
            .await?
            .ok_or_else(|| Error::BotNotFound(bot_id.to_string()))?;

        if let Some(handle) = bot.task_handle.as_deref() {
            self.runtime.stop_task(handle).await?;
        }

        self.store
            .update_fields(&bot.id, &BotPatch::status(BotStatus::Stopped))
            .await?;

        info!(bot_id, "Bot stopped");
        Ok(())
    }

    /// Bots whose tasks stopped cleanly but whose records were never
    /// reconciled into a terminal success.
    ///
    /// Scans launched, non-terminal records inside the sync window and
    /// keeps those whose task is stopped without an infrastructure code.
    /// Bots whose describe fails are skipped rather than guessed at.
    pub async fn find_non_error_failures(&self) -> Result<Vec<BotRecord>> {
        let cutoff = Utc::now() - to_chrono(self.config.sync_window)?;
        let candidates = self.store.find_unreconciled_with_task_since(cutoff).await?;

        let mut found = Vec::new();
        for bot in candidates {
            let Some(handle) = bot.task_handle.as_deref() else {
                continue;
            };
            match self.runtime.describe_task(handle).await {
                Ok(description) => {
                    if description.is_stopped()
                        && !is_infra_failure(description.stop_code.as_deref())
                    {
                        found.push(bot);
                    }
                }
                Err(e) => {
                    warn!(bot_id = %bot.id, task = handle, error = %e, "Describe failed, skipping bot");
                }
            }
        }
        Ok(found)
    }

    /// Deliver every non-error failure to the processing pipeline and
    /// reconcile STARTED records to COMPLETED. Returns the number of
    /// records delivered.
    ///
    /// STOPPED records are delivered but keep their status: STOPPED is
    /// terminal and never transitions. A failed delivery leaves the bot
    /// unreconciled so the next pass retries it; delivery is at least
    /// once either way, and the pipeline deduplicates on bot id.
    pub async fn record_completed(&self, recorder: &dyn MetadataRecorder) -> Result<usize> {
        let bots = self.find_non_error_failures().await?;

        let mut recorded = 0;
        for bot in bots {
            let owner_id = match self.credentials.owner_of(&bot.credential_id).await {
                Ok(Some(owner_id)) => owner_id,
                Ok(None) => {
                    warn!(bot_id = %bot.id, credential = %bot.credential_id, "Credential has no owner, skipping record");
                    continue;
                }
                Err(e) => {
                    error!(bot_id = %bot.id, error = %e, "Owner lookup failed, skipping record");
                    continue;
                }
            };

            let record = ArtifactRecord {
                bot_id: bot.id.clone(),
                archive_key: bot.archive_key.clone(),
                title: bot.title.clone(),
                owner_id,
            };
            if let Err(e) = recorder.record_artifact(&record).await {
                error!(bot_id = %bot.id, error = %e, "Artifact record delivery failed");
                continue;
            }

            // Only a live record reconciles to COMPLETED; a STOPPED
            // record is already terminal.
            if bot.has_status(BotStatus::Started) {
                self.store
                    .update_fields(&bot.id, &BotPatch::status(BotStatus::Completed))
                    .await?;
            }
            recorded += 1;
        }
        Ok(recorded)
    }
}

/// Object metadata attached to staged uploads so downstream processing can
/// attribute an artifact without a database lookup.
fn upload_metadata(
    bot: &BotRecord,
    owner_id: &str,
    platform: MeetingPlatform,
) -> Vec<(String, String)> {
    let mut pairs = vec![
        ("id".to_string(), bot.id.clone()),
        ("user_id".to_string(), owner_id.to_string()),
        ("bot_type".to_string(), platform.as_str().to_string()),
    ];
    if let Some(title) = &bot.title {
        pairs.push(("meeting_title".to_string(), title.clone()));
    }
    pairs
}

fn to_chrono(duration: std::time::Duration) -> Result<chrono::Duration> {
    chrono::Duration::from_std(duration)
        .map_err(|e| Error::Other(format!("Invalid duration: {e}")))
}
