/// Database layer
///
/// Holds the two durable stores a run talks to: the per-endpoint state
/// table and the append-only history table, both backed by LibSQL.

pub mod migrations;
pub mod repository;

pub use repository::{HistoryStore, LibsqlStore, StateStore};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}

/// Open the database file, apply migrations and wrap it as a store
pub async fn open_store(path: &str, pool_size: usize) -> Result<LibsqlStore> {
    let pool = crate::pool::open_pool(path, pool_size).await?;
    {
        let conn = pool.get().await?;
        initialize_database(&conn).await?;
    }
    Ok(LibsqlStore::new_from_pool(pool))
}
