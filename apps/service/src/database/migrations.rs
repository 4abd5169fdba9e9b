use anyhow::Result;
use libsql::Connection;

use crate::monitoring::types::system_time_to_nanos;

/// Schema version - increment when making schema changes
const SCHEMA_VERSION: i32 = 1;

/// Run database migrations
///
/// Safe to call on every start; already applied versions are skipped.
pub async fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        )",
        (),
    )
    .await?;

    let current_version = get_current_version(conn).await?;

    if current_version >= SCHEMA_VERSION {
        tracing::debug!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    tracing::info!("Running migrations from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        run_migration_v1(conn).await?;
        record_migration(conn, 1, "Endpoint state and probe history").await?;
    }

    tracing::info!("Database migrations completed (now at version {})", SCHEMA_VERSION);
    Ok(())
}

/// Get current schema version from database
async fn get_current_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn.query("SELECT MAX(version) FROM schema_migrations", ()).await?;

    if let Some(row) = rows.next().await? {
        let version: Option<i32> = row.get(0)?;
        Ok(version.unwrap_or(0))
    } else {
        Ok(0)
    }
}

/// Record that a migration was applied
async fn record_migration(conn: &Connection, version: i32, description: &str) -> Result<()> {
    let now = system_time_to_nanos(std::time::SystemTime::now()) / 1_000_000_000;

    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
        libsql::params![version, now, description],
    )
    .await?;

    tracing::info!("Applied migration v{}: {}", version, description);
    Ok(())
}

/// Migration v1: latest result per endpoint plus the append-only history
async fn run_migration_v1(conn: &Connection) -> Result<()> {
    // One row per endpoint name, replaced on every run
    conn.execute(
        "CREATE TABLE IF NOT EXISTS endpoint_state (
            name TEXT PRIMARY KEY,
            url TEXT NOT NULL,
            status_code INTEGER NOT NULL,
            tested_at_nanos INTEGER NOT NULL,
            success INTEGER NOT NULL,
            duration_nanos INTEGER NOT NULL,
            error_message TEXT NOT NULL DEFAULT ''
        )",
        (),
    )
    .await?;

    // Never updated or deleted by the service
    conn.execute(
        "CREATE TABLE IF NOT EXISTS probe_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            url TEXT NOT NULL,
            status_code INTEGER NOT NULL,
            tested_at_nanos INTEGER NOT NULL,
            success INTEGER NOT NULL,
            duration_nanos INTEGER NOT NULL,
            duration_ms INTEGER NOT NULL,
            error_message TEXT NOT NULL DEFAULT '',
            recorded_at INTEGER NOT NULL
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_probe_history_name_tested ON probe_history(name, tested_at_nanos DESC)",
        (),
    )
    .await?;

    Ok(())
}
