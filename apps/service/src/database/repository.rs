use anyhow::Result;
use async_trait::async_trait;
use libsql::{Row, params};
use std::time::SystemTime;

use crate::monitoring::types::{ProbeResult, nanos_to_system_time, system_time_to_nanos};
use crate::pool::{LibsqlManager, LibsqlPool};

/// Durable last-known result per endpoint name (last write wins)
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Last committed result for `name`, if one was ever written
    async fn get(&self, name: &str) -> Result<Option<ProbeResult>>;

    /// Replace the stored result for `name`
    async fn put(&self, name: &str, result: &ProbeResult) -> Result<()>;
}

/// Durable append-only log of every probe result
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, result: &ProbeResult) -> Result<()>;
}

/// LibSQL implementation of both stores
pub struct LibsqlStore {
    pool: LibsqlPool,
}

const RESULT_COLUMNS: &str =
    "name, url, status_code, tested_at_nanos, success, duration_nanos, error_message";

impl LibsqlStore {
    /// Create a new store from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }

    /// Every stored state row, ordered by name
    pub async fn all_states(&self) -> Result<Vec<ProbeResult>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(&format!("SELECT {RESULT_COLUMNS} FROM endpoint_state ORDER BY name"), ())
            .await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(row_to_result(&row)?);
        }
        Ok(results)
    }

    /// Most recent history records for one endpoint, newest first
    pub async fn recent_history(&self, name: &str, limit: usize) -> Result<Vec<ProbeResult>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {RESULT_COLUMNS} FROM probe_history WHERE name = ? \
                     ORDER BY tested_at_nanos DESC, id DESC LIMIT ?"
                ),
                params![name, limit as i64],
            )
            .await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(row_to_result(&row)?);
        }
        Ok(results)
    }
}

fn row_to_result(row: &Row) -> Result<ProbeResult> {
    Ok(ProbeResult {
        name: row.get(0)?,
        url: row.get(1)?,
        status_code: row.get::<i64>(2)? as i32,
        tested_at: nanos_to_system_time(row.get(3)?),
        success: row.get::<i64>(4)? != 0,
        duration_nanos: row.get::<i64>(5)?.max(0) as u64,
        error_message: row.get(6)?,
    })
}

fn clamp_nanos(nanos: u64) -> i64 {
    i64::try_from(nanos).unwrap_or(i64::MAX)
}

#[async_trait]
impl StateStore for LibsqlStore {
    async fn get(&self, name: &str) -> Result<Option<ProbeResult>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {RESULT_COLUMNS} FROM endpoint_state WHERE name = ?"),
                params![name],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_result(&row)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, name: &str, result: &ProbeResult) -> Result<()> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO endpoint_state (name, url, status_code, tested_at_nanos, success, duration_nanos, error_message) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET \
                url = excluded.url, \
                status_code = excluded.status_code, \
                tested_at_nanos = excluded.tested_at_nanos, \
                success = excluded.success, \
                duration_nanos = excluded.duration_nanos, \
                error_message = excluded.error_message",
            params![
                name,
                result.url.clone(),
                result.status_code as i64,
                result.tested_at_nanos(),
                if result.success { 1 } else { 0 },
                clamp_nanos(result.duration_nanos),
                result.error_message.clone()
            ],
        )
        .await?;

        Ok(())
    }
}

#[async_trait]
impl HistoryStore for LibsqlStore {
    async fn append(&self, result: &ProbeResult) -> Result<()> {
        let conn = self.get_conn().await?;
        let recorded_at = system_time_to_nanos(SystemTime::now());

        conn.execute(
            "INSERT INTO probe_history (name, url, status_code, tested_at_nanos, success, duration_nanos, duration_ms, error_message, recorded_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                result.name.clone(),
                result.url.clone(),
                result.status_code as i64,
                result.tested_at_nanos(),
                if result.success { 1 } else { 0 },
                clamp_nanos(result.duration_nanos),
                clamp_nanos(result.duration_millis()),
                result.error_message.clone(),
                recorded_at
            ],
        )
        .await?;

        Ok(())
    }
}
