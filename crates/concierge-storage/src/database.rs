// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Opening the SQLite file: pragmas, journal mode and schema migrations.
//!
//! Every statement runs on tokio-rusqlite's single background thread, so the
//! `Database` handle is the only writer.

use std::path::Path;

use concierge_core::ConciergeError;
use tracing::debug;

fn storage_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> ConciergeError {
    ConciergeError::Storage { source: e.into() }
}

pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> ConciergeError {
    storage_err(e)
}

/// An open, migrated SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path` and apply migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, ConciergeError> {
        match Path::new(path).parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                std::fs::create_dir_all(dir).map_err(storage_err)?
            }
            _ => {}
        }
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(storage_err)?;
        let db = Database { conn };
        db.prepare(wal_mode).await?;
        debug!(path, wal_mode, "sqlite file ready");
        Ok(db)
    }

    /// Open a private in-memory database with the full schema.
    pub async fn open_in_memory() -> Result<Self, ConciergeError> {
        let db = Database {
            conn: tokio_rusqlite::Connection::open_in_memory()
                .await
                .map_err(storage_err)?,
        };
        db.prepare(false).await?;
        Ok(db)
    }

    async fn prepare(&self, wal_mode: bool) -> Result<(), ConciergeError> {
        self.conn
            .call(move |conn| -> Result<Result<(), ConciergeError>, rusqlite::Error> {
                conn.busy_timeout(std::time::Duration::from_secs(5))?;
                conn.pragma_update(None, "foreign_keys", "ON")?;
                if wal_mode {
                    let mode: String =
                        conn.pragma_update_and_check(None, "journal_mode", "wal", |row| row.get(0))?;
                    conn.pragma_update(None, "synchronous", "NORMAL")?;
                    debug!(journal = %mode, "journal mode set");
                }
                Ok(crate::migrations::run_migrations(conn))
            })
            .await
            .map_err(map_tr_err)?
    }

    /// The underlying connection. Clones share the same background thread.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Folds the write-ahead log back into the main file. A no-op for
    /// rollback-journal and in-memory databases.
    pub async fn checkpoint(&self) -> Result<(), ConciergeError> {
        self.conn
            .call(|conn| conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE)"))
            .await
            .map_err(map_tr_err)
    }
}
