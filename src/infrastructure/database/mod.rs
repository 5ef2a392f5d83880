//! Postgres wiring: pool construction, schema bootstrap, and the store
//! factories.

mod postgres_store;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::domain::{AttendanceLedgerPtr, DeviceRegistryPtr, IdentityStorePtr};
use postgres_store::PostgresStore;

/// Schema statements, idempotent by construction.
///
/// `attendance_user_class_day_key` is the storage-level uniqueness
/// constraint behind the one-record-per-(user, class, day) invariant;
/// the ledger's append relies on it by name.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
         id UUID PRIMARY KEY,
         name TEXT NOT NULL,
         email TEXT NOT NULL UNIQUE,
         password_hash TEXT NOT NULL,
         role TEXT NOT NULL,
         roll_number TEXT NOT NULL UNIQUE,
         class_name TEXT,
         selfie_ref TEXT,
         is_active BOOLEAN NOT NULL DEFAULT TRUE,
         created_at TIMESTAMPTZ NOT NULL,
         updated_at TIMESTAMPTZ NOT NULL
     )",
    "CREATE TABLE IF NOT EXISTS devices (
         device_id TEXT PRIMARY KEY,
         user_id UUID NOT NULL REFERENCES users(id),
         device_name TEXT NOT NULL DEFAULT 'Unknown Device',
         ip_address TEXT,
         last_used TIMESTAMPTZ NOT NULL,
         is_active BOOLEAN NOT NULL DEFAULT TRUE,
         created_at TIMESTAMPTZ NOT NULL
     )",
    "CREATE TABLE IF NOT EXISTS attendance (
         id UUID PRIMARY KEY,
         user_id UUID NOT NULL REFERENCES users(id),
         class_name TEXT NOT NULL,
         date TIMESTAMPTZ NOT NULL,
         day DATE NOT NULL,
         status TEXT NOT NULL,
         qr_code_used TEXT NOT NULL,
         selfie_ref TEXT,
         device_id TEXT NOT NULL,
         verified BOOLEAN NOT NULL DEFAULT FALSE,
         remarks TEXT NOT NULL DEFAULT '',
         created_at TIMESTAMPTZ NOT NULL,
         updated_at TIMESTAMPTZ NOT NULL,
         CONSTRAINT attendance_user_class_day_key UNIQUE (user_id, class_name, day)
     )",
    "CREATE INDEX IF NOT EXISTS attendance_user_idx ON attendance (user_id, date DESC)",
    "CREATE INDEX IF NOT EXISTS attendance_day_idx ON attendance (day)",
];

/// Creates the connection pool. Connections are established lazily, so
/// this succeeds even while the database is still coming up; the retry
/// loop in [`init_database`] is what waits for readiness.
pub fn create_pg_pool(config: &DatabaseConfig) -> Result<PgPool> {
    // ---
    let pool = PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_lazy(&config.database_url)?;

    Ok(pool)
}

/// Waits for the database and applies the schema.
pub async fn init_database(pool: &PgPool, retry_count: u32) -> Result<()> {
    // ---
    let mut attempt = 0;
    loop {
        match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => break,
            Err(err) if attempt < retry_count => {
                attempt += 1;
                tracing::warn!("database not ready (attempt {attempt}/{retry_count}): {err}");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            Err(err) => return Err(err.into()),
        }
    }

    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!("database schema initialized");
    Ok(())
}

/// Convenience used by the binary and the integration tests: builds a
/// pool from environment configuration and initializes the schema.
pub async fn init_database_with_retry_from_env() -> Result<()> {
    // ---
    let config = DatabaseConfig::from_env()?;
    let pool = create_pg_pool(&config)?;
    init_database(&pool, config.retry_count).await
}

/// Creates the Postgres-backed identity store, device registry, and
/// attendance ledger over one shared pool.
pub fn create_postgres_stores(
    pool: PgPool,
) -> (IdentityStorePtr, DeviceRegistryPtr, AttendanceLedgerPtr) {
    // ---
    let store = Arc::new(PostgresStore::new(pool));
    (store.clone(), store.clone(), store)
}
