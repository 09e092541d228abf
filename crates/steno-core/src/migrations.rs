// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Database migrations for steno-core.
//!
//! Migrations are embedded so that services and tests can set up the
//! schema programmatically:
//!
//! ```ignore
//! let pool = sqlx::PgPool::connect(&database_url).await?;
//! steno_core::migrations::run_postgres(&pool).await?;
//! ```

use sqlx::migrate::MigrateError;

/// PostgreSQL migrator with all core migrations embedded.
pub static POSTGRES: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/postgresql");

/// SQLite migrator with all core migrations embedded.
pub static SQLITE: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// Run PostgreSQL migrations. Safe to call multiple times; already-applied
/// migrations are skipped.
pub async fn run_postgres(pool: &sqlx::PgPool) -> Result<(), MigrateError> {
    POSTGRES.run(pool).await
}

/// Run SQLite migrations. Safe to call multiple times; already-applied
/// migrations are skipped.
pub async fn run_sqlite(pool: &sqlx::SqlitePool) -> Result<(), MigrateError> {
    SQLITE.run(pool).await
}
