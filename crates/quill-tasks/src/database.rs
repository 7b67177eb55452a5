//! Shared `SQLite` connection.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::info;

use crate::errors::TaskError;
use crate::migrations;

/// Thread-safe connection wrapper.
///
/// Every service call takes the mutex for its whole duration, so calls within
/// one process are serialized; [`with_tx`](Self::with_tx) additionally takes
/// the `SQLite` write lock up front, which serializes writers across processes.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, TaskError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| TaskError::Io(format!("create dir {}: {e}", parent.display())))?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(migrations::PRAGMAS)?;
        migrations::run_migrations(&conn)?;

        info!(path = %path.display(), "database opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_owned(),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, TaskError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(migrations::PRAGMAS)?;
        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        })
    }

    /// Execute a closure with the database connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, TaskError>
    where
        F: FnOnce(&Connection) -> Result<T, TaskError>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Execute a closure inside an `IMMEDIATE` transaction.
    ///
    /// Commits when the closure returns `Ok`; any error rolls everything back.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T, TaskError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, TaskError>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Path the database was opened from (`:memory:` for in-memory).
    pub fn path(&self) -> &Path {
        &self.path
    }
}
