//! Connection scoping.
//!
//! The engine opens one connection per logical operation and closes it on
//! every exit path by dropping it. [`Database::transact`] wraps an
//! operation in a transaction that commits on success and rolls back on
//! any error before propagating it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, Transaction};
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::Result;

/// A SQLite database file and the settings used to connect to it.
#[derive(Debug, Clone)]
pub struct Database {
    config: StoreConfig,
    path: PathBuf,
}

impl Database {
    /// Validates the configuration and creates the store directory.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidDatabaseName`](crate::OrmError::InvalidDatabaseName)
    /// for a bad name, or [`IoError`](crate::OrmError::IoError) if the
    /// directory cannot be created.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.directory)?;
        let path = config.database_path();
        debug!(path = %path.display(), "opened store");
        Ok(Self { config, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Opens a new connection with the configured pragmas applied.
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_millis(self.config.busy_timeout_ms))?;
        let foreign_keys = if self.config.foreign_keys { "ON" } else { "OFF" };
        conn.execute_batch(&format!("PRAGMA foreign_keys = {foreign_keys};"))?;
        Ok(conn)
    }

    /// Runs `f` inside a transaction on a fresh connection.
    ///
    /// Commits when `f` succeeds. When `f` fails the transaction is rolled
    /// back and the error is returned unchanged.
    pub fn transact<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                warn!(error = %e, "rolling back transaction");
                tx.rollback()?;
                Err(e)
            }
        }
    }
}
