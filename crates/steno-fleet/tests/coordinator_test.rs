// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end coordinator tests over in-memory records and a mock runtime.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use steno_core::bot::{BotPatch, BotStatus, RecordingMode};
use steno_core::persistence::{BotStore, SqliteBotStore};
use steno_fleet::config::{Config, TaskTemplate};
use steno_fleet::coordinator::{BotCoordinator, CreateBotRequest};
use steno_fleet::error::Error;
use steno_fleet::recorder::MockRecorder;
use steno_fleet::runtime::{MockRuntime, RuntimeError, TaskRuntime};
use steno_fleet::staging::MockStaging;
use tokio::sync::mpsc;

struct Harness {
    store: Arc<SqliteBotStore>,
    runtime: Arc<MockRuntime>,
    staging: Arc<MockStaging>,
    coordinator: BotCoordinator,
    retry_rx: mpsc::UnboundedReceiver<String>,
}

fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        access_key: "ak".to_string(),
        secret_key: "sk".to_string(),
        region: "us-east-1".to_string(),
        cluster: "steno".to_string(),
        subnet: "subnet-1".to_string(),
        security_group: "sg-1".to_string(),
        artifact_bucket: "steno-artifacts".to_string(),
        google_template: TaskTemplate {
            task_definition: "meet-bot:3".to_string(),
            container_name: "meet-bot".to_string(),
        },
        zoom_template: TaskTemplate {
            task_definition: "zoom-bot:5".to_string(),
            container_name: "zoom-bot".to_string(),
        },
        teams_template: TaskTemplate {
            task_definition: "teams-bot:2".to_string(),
            container_name: "teams-bot".to_string(),
        },
        max_retries: 2,
        launch_lookahead: Duration::from_secs(600),
        sync_window: Duration::from_secs(86_400),
        worker_max_wait_secs: 8_100,
        upload_ttl: Duration::from_secs(8_000),
        sync_interval: Duration::from_secs(300),
        launch_interval: Duration::from_secs(600),
        record_interval: Duration::from_secs(60),
    }
}

async fn harness() -> Harness {
    let store = Arc::new(
        SqliteBotStore::in_memory()
            .await
            .expect("in-memory store should initialize"),
    );
    sqlx::query("INSERT INTO api_keys (id, user_id, created_at) VALUES (?, ?, ?)")
        .bind("key-1")
        .bind("user-1")
        .bind(Utc::now())
        .execute(store.pool())
        .await
        .expect("api key insert");

    let runtime = Arc::new(MockRuntime::new());
    let staging = Arc::new(MockStaging::new());
    let (retry_tx, retry_rx) = mpsc::unbounded_channel();
    let coordinator = BotCoordinator::new(
        store.clone(),
        store.clone(),
        runtime.clone(),
        staging.clone(),
        test_config(),
        retry_tx,
    );

    Harness {
        store,
        runtime,
        staging,
        coordinator,
        retry_rx,
    }
}

fn request(meeting_url: &str) -> CreateBotRequest {
    CreateBotRequest {
        name: "Steno Notetaker".to_string(),
        meeting_url: meeting_url.to_string(),
        title: Some("Weekly sync".to_string()),
        recording_mode: RecordingMode::AudioOnly,
        join_at: None,
        metadata: None,
        credential_id: "key-1".to_string(),
    }
}

#[tokio::test]
async fn test_immediate_create_launches() {
    let h = harness().await;

    let bot = h
        .coordinator
        .create(request("https://meet.google.com/abc-defg-hij"))
        .await
        .unwrap();

    assert_eq!(bot.status, "STARTED");
    assert!(bot.task_handle.is_some());
    assert_eq!(bot.retry_count, 0);
    let archive_key = bot.archive_key.expect("archive key persisted");
    assert!(archive_key.starts_with(&format!("raw_combined/user-1/{}/", bot.id)));

    // One audio URL and one archive URL were staged.
    assert_eq!(h.staging.issued_keys().await.len(), 2);

    // The worker command carries the meeting URL and both upload URLs.
    let commands = h.runtime.launched_commands().await;
    assert_eq!(commands.len(), 1);
    let script = &commands[0][2];
    assert!(script.contains("'https://meet.google.com/abc-defg-hij'"));
    assert!(script.contains("--presigned-url-combined"));
    assert!(script.contains("--presigned-url-audio"));
    assert!(script.contains("--max-waiting-time 8100"));
}

#[tokio::test]
async fn test_create_rejects_unsupported_url() {
    let h = harness().await;

    let err = h
        .coordinator
        .create(request("https://example.com/meeting/123"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedMeetingUrl(_)));

    // Nothing was persisted or launched.
    assert_eq!(h.store.count().await.unwrap(), 0);
    assert_eq!(h.runtime.launch_count().await, 0);
}

#[tokio::test]
async fn test_future_join_stays_pending() {
    let h = harness().await;

    let mut req = request("https://teams.microsoft.com/l/meetup-join/19%3ameeting");
    req.join_at = Some(Utc::now() + chrono::Duration::hours(2));
    let bot = h.coordinator.create(req).await.unwrap();

    assert_eq!(bot.status, "PENDING");
    assert!(bot.task_handle.is_none());
    assert_eq!(h.runtime.launch_count().await, 0);
}

#[tokio::test]
async fn test_failed_immediate_launch_leaves_bot_pending() {
    let h = harness().await;
    h.runtime.refuse_launches();

    let err = h
        .coordinator
        .create(request("https://zoom.us/j/123456"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Runtime(RuntimeError::NoTasksStarted)
    ));

    // The record survives for a later launch attempt.
    let bots = h.store.list(10, 0).await.unwrap();
    assert_eq!(bots.len(), 1);
    assert_eq!(bots[0].status, "PENDING");
}

#[tokio::test]
async fn test_scheduled_launches_respect_lookahead() {
    let h = harness().await;

    let mut soon = request("https://meet.google.com/aaa-bbbb-ccc");
    soon.join_at = Some(Utc::now() + chrono::Duration::minutes(5));
    let soon_bot = h.coordinator.create(soon).await.unwrap();

    let mut later = request("https://meet.google.com/ddd-eeee-fff");
    later.join_at = Some(Utc::now() + chrono::Duration::hours(3));
    let later_bot = h.coordinator.create(later).await.unwrap();

    let launched = h.coordinator.run_scheduled_launches().await.unwrap();
    assert_eq!(launched, 1);

    let soon_bot = h.store.get(&soon_bot.id).await.unwrap().unwrap();
    assert_eq!(soon_bot.status, "STARTED");
    let later_bot = h.store.get(&later_bot.id).await.unwrap().unwrap();
    assert_eq!(later_bot.status, "PENDING");
}

#[tokio::test]
async fn test_synchronize_is_idempotent_while_running() {
    let h = harness().await;
    let bot = h
        .coordinator
        .create(request("https://meet.google.com/abc-defg-hij"))
        .await
        .unwrap();

    for _ in 0..3 {
        let report = h.coordinator.synchronize().await.unwrap();
        assert_eq!(report.examined, 1);
        assert_eq!(report.completed, 0);
        assert_eq!(report.failed, 0);
    }

    let bot = h.store.get(&bot.id).await.unwrap().unwrap();
    assert_eq!(bot.status, "STARTED");
}

#[tokio::test]
async fn test_synchronize_clean_stop_completes() {
    let mut h = harness().await;
    let bot = h
        .coordinator
        .create(request("https://meet.google.com/abc-defg-hij"))
        .await
        .unwrap();

    h.runtime.complete(bot.task_handle.as_deref().unwrap()).await;
    let report = h.coordinator.synchronize().await.unwrap();
    assert_eq!(report.completed, 1);

    let bot = h.store.get(&bot.id).await.unwrap().unwrap();
    assert_eq!(bot.status, "COMPLETED");
    // Clean completions never enter the retry queue.
    assert!(h.retry_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_synchronize_infra_stop_fails_and_enqueues() {
    let mut h = harness().await;
    let bot = h
        .coordinator
        .create(request("https://meet.google.com/abc-defg-hij"))
        .await
        .unwrap();

    h.runtime
        .stop_with_code(bot.task_handle.as_deref().unwrap(), "OutOfMemoryError")
        .await;
    let report = h.coordinator.synchronize().await.unwrap();
    assert_eq!(report.failed, 1);

    let stored = h.store.get(&bot.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "FAILED");
    // Failure classification does not consume retry budget by itself.
    assert_eq!(stored.retry_count, 0);
    assert_eq!(h.retry_rx.try_recv().unwrap(), bot.id);
}

#[tokio::test]
async fn test_synchronize_describe_outage_fails_without_retry() {
    let mut h = harness().await;
    let bot = h
        .coordinator
        .create(request("https://meet.google.com/abc-defg-hij"))
        .await
        .unwrap();

    h.runtime.break_describes();
    let report = h.coordinator.synchronize().await.unwrap();
    assert_eq!(report.failed, 1);

    let bot = h.store.get(&bot.id).await.unwrap().unwrap();
    assert_eq!(bot.status, "FAILED");
    // Unknown task state: no relaunch evaluation is queued.
    assert!(h.retry_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_reinitiate_relaunches_with_original_parameters() {
    let h = harness().await;
    let bot = h
        .coordinator
        .create(request("https://meet.google.com/abc-defg-hij"))
        .await
        .unwrap();
    let first_handle = bot.task_handle.clone().unwrap();

    h.runtime.stop_with_code(&first_handle, "SpotInterruptionError").await;
    h.coordinator.synchronize().await.unwrap();

    h.coordinator.reinitiate(&bot.id).await.unwrap();

    let bot = h.store.get(&bot.id).await.unwrap().unwrap();
    assert_eq!(bot.status, "STARTED");
    assert_eq!(bot.retry_count, 1);
    let second_handle = bot.task_handle.unwrap();
    assert_ne!(second_handle, first_handle);

    // The replacement task reuses the dead task's exact command.
    let commands = h.runtime.launched_commands().await;
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0], commands[1]);
}

#[tokio::test]
async fn test_reinitiate_respects_retry_budget() {
    let h = harness().await;
    let bot = h
        .coordinator
        .create(request("https://meet.google.com/abc-defg-hij"))
        .await
        .unwrap();

    h.store
        .update_fields(
            &bot.id,
            &BotPatch {
                status: Some(BotStatus::Failed),
                retry_count: Some(2),
                ..BotPatch::default()
            },
        )
        .await
        .unwrap();

    h.coordinator.reinitiate(&bot.id).await.unwrap();

    let bot = h.store.get(&bot.id).await.unwrap().unwrap();
    assert_eq!(bot.status, "FAILED");
    assert_eq!(bot.retry_count, 2);
    assert_eq!(h.runtime.launch_count().await, 1);
}

#[tokio::test]
async fn test_reinitiate_ignores_non_failed_and_unknown_bots() {
    let h = harness().await;
    let bot = h
        .coordinator
        .create(request("https://meet.google.com/abc-defg-hij"))
        .await
        .unwrap();

    // STARTED bot: evaluation is a no-op.
    h.coordinator.reinitiate(&bot.id).await.unwrap();
    let stored = h.store.get(&bot.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "STARTED");
    assert_eq!(h.runtime.launch_count().await, 1);

    // Unknown bot: also a no-op.
    h.coordinator.reinitiate("no-such-bot").await.unwrap();
}

#[tokio::test]
async fn test_stop_halts_task_and_marks_stopped() {
    let h = harness().await;
    let bot = h
        .coordinator
        .create(request("https://meet.google.com/abc-defg-hij"))
        .await
        .unwrap();
    let handle = bot.task_handle.clone().unwrap();

    h.coordinator.stop(&bot.id).await.unwrap();

    let bot = h.store.get(&bot.id).await.unwrap().unwrap();
    assert_eq!(bot.status, "STOPPED");
    let desc = h.runtime.describe_task(&handle).await.unwrap();
    assert!(desc.is_stopped());
}

#[tokio::test]
async fn test_stop_unknown_bot() {
    let h = harness().await;
    let err = h.coordinator.stop("no-such-bot").await.unwrap_err();
    assert!(matches!(err, Error::BotNotFound(_)));
}

#[tokio::test]
async fn test_operator_stop_is_not_a_failure() {
    let h = harness().await;
    let bot = h
        .coordinator
        .create(request("https://meet.google.com/abc-defg-hij"))
        .await
        .unwrap();

    h.coordinator.stop(&bot.id).await.unwrap();

    // The UserInitiated stop code counts as a clean stop, so the bot shows
    // up as a non-error failure until it is recorded downstream.
    let found = h.coordinator.find_non_error_failures().await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, bot.id);
}

#[tokio::test]
async fn test_record_pass_keeps_stopped_terminal() {
    let h = harness().await;
    let bot = h
        .coordinator
        .create(request("https://meet.google.com/abc-defg-hij"))
        .await
        .unwrap();

    h.coordinator.stop(&bot.id).await.unwrap();

    // The record pass delivers the stopped bot's artifact downstream but
    // must not move it out of its terminal status.
    let recorder = MockRecorder::new();
    let recorded = h.coordinator.record_completed(&recorder).await.unwrap();
    assert_eq!(recorded, 1);
    assert_eq!(recorder.delivered().await[0].bot_id, bot.id);

    let bot = h.store.get(&bot.id).await.unwrap().unwrap();
    assert_eq!(bot.status, "STOPPED");
}

#[tokio::test]
async fn test_find_non_error_failures_filters_by_task_state() {
    let h = harness().await;

    let clean = h
        .coordinator
        .create(request("https://meet.google.com/aaa-bbbb-ccc"))
        .await
        .unwrap();
    let infra = h
        .coordinator
        .create(request("https://meet.google.com/ddd-eeee-fff"))
        .await
        .unwrap();
    let running = h
        .coordinator
        .create(request("https://meet.google.com/ggg-hhhh-iii"))
        .await
        .unwrap();

    h.runtime.complete(clean.task_handle.as_deref().unwrap()).await;
    h.runtime
        .stop_with_code(infra.task_handle.as_deref().unwrap(), "CannotPullContainer")
        .await;

    let found = h.coordinator.find_non_error_failures().await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, clean.id);
    assert_ne!(found[0].id, infra.id);
    assert_ne!(found[0].id, running.id);
}

#[tokio::test]
async fn test_record_completed_delivers_and_reconciles() {
    let h = harness().await;
    let bot = h
        .coordinator
        .create(request("https://meet.google.com/abc-defg-hij"))
        .await
        .unwrap();
    h.runtime.complete(bot.task_handle.as_deref().unwrap()).await;

    let recorder = MockRecorder::new();
    let recorded = h.coordinator.record_completed(&recorder).await.unwrap();
    assert_eq!(recorded, 1);

    let delivered = recorder.delivered().await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].bot_id, bot.id);
    assert_eq!(delivered[0].owner_id, "user-1");
    assert_eq!(delivered[0].archive_key, bot.archive_key);
    assert_eq!(delivered[0].title.as_deref(), Some("Weekly sync"));

    let bot = h.store.get(&bot.id).await.unwrap().unwrap();
    assert_eq!(bot.status, "COMPLETED");

    // A second pass finds nothing left to record.
    let recorded = h.coordinator.record_completed(&recorder).await.unwrap();
    assert_eq!(recorded, 0);
}
