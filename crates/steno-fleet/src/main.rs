// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Steno Fleet - Meeting Bot Coordinator Service
//!
//! Wires the coordinator to PostgreSQL records, the ECS task runtime, and
//! S3 artifact staging, then runs the background workers until interrupted.

use std::sync::Arc;

use tracing::{info, warn};

use steno_core::persistence::PostgresBotStore;
use steno_fleet::config::Config;
use steno_fleet::coordinator::BotCoordinator;
use steno_fleet::recorder::LogRecorder;
use steno_fleet::retry::RetryWorker;
use steno_fleet::runtime::EcsRuntime;
use steno_fleet::sigv4::SigningKey;
use steno_fleet::staging::S3Staging;
use steno_fleet::workers::{LaunchWorker, RecordWorker, SyncWorker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "steno_fleet=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;

    info!(
        cluster = %config.cluster,
        region = %config.region,
        bucket = %config.artifact_bucket,
        "Starting Steno Fleet"
    );

    // Connect to database
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    steno_core::migrations::run_postgres(&pool).await?;
    info!("Connected to database");

    let store = Arc::new(PostgresBotStore::new(pool));
    let runtime = Arc::new(EcsRuntime::new(&config));
    let staging = Arc::new(S3Staging::new(
        SigningKey {
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
            region: config.region.clone(),
        },
        config.artifact_bucket.clone(),
    ));

    let (retry_tx, retry_rx) = tokio::sync::mpsc::unbounded_channel();
    let coordinator = Arc::new(BotCoordinator::new(
        store.clone(),
        store,
        runtime,
        staging,
        config.clone(),
        retry_tx,
    ));

    // Background workers
    let sync_worker = SyncWorker::new(coordinator.clone(), config.sync_interval);
    let launch_worker = LaunchWorker::new(coordinator.clone(), config.launch_interval);
    let record_worker = RecordWorker::new(
        coordinator.clone(),
        Arc::new(LogRecorder),
        config.record_interval,
    );
    let retry_worker = RetryWorker::new(coordinator, retry_rx);

    let sync_shutdown = sync_worker.shutdown_handle();
    let launch_shutdown = launch_worker.shutdown_handle();
    let record_shutdown = record_worker.shutdown_handle();
    let retry_shutdown = retry_worker.shutdown_handle();

    let sync_task = tokio::spawn(async move { sync_worker.run().await });
    let launch_task = tokio::spawn(async move { launch_worker.run().await });
    let record_task = tokio::spawn(async move { record_worker.run().await });
    let retry_task = tokio::spawn(retry_worker.run());

    info!("Steno Fleet ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    sync_shutdown.notify_one();
    launch_shutdown.notify_one();
    record_shutdown.notify_one();
    retry_shutdown.notify_one();

    let _ = tokio::join!(sync_task, launch_task, record_task, retry_task);

    info!("Steno Fleet shut down");

    Ok(())
}
