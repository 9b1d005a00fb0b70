//! Database connection management

use crate::error::{Error, Result};
use libsql::{Builder, Connection};
use std::path::Path;

use super::migrations;

/// Local libSQL database holding the durable action queue
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a local database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically. Failure to open maps to
    /// `Error::StorageUnavailable` - the caller must fall back to
    /// synchronous-only operation for the session.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path_str)
            .build()
            .await
            .map_err(|error| Error::StorageUnavailable(error.to_string()))?;
        let conn = db
            .connect()
            .map_err(|error| Error::StorageUnavailable(error.to_string()))?;

        let database = Self { conn };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|error| Error::StorageUnavailable(error.to_string()))?;
        let conn = db
            .connect()
            .map_err(|error| Error::StorageUnavailable(error.to_string()))?;

        let database = Self { conn };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Configure `SQLite` for durability and concurrent readers
    async fn configure(&self) -> Result<()> {
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok(); // In-memory databases reject WAL
        self.conn.execute("PRAGMA synchronous = NORMAL;", ()).await?;
        self.conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        Ok(())
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn).await
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}
