// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All access is serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use shopchat_config::model::StorageConfig;
use shopchat_core::ShopchatError;
use tracing::{debug, warn};

use crate::migrations;

const QUEUED: u8 = 0;
const RUNNING: u8 = 1;
const ABANDONED: u8 = 2;

/// Default deadline for a single round-trip when none is configured.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the single SQLite writer.
///
/// Every query borrows the connection for the duration of one closure via
/// [`Database::call`]; the borrow ends on every exit path, including when
/// the caller stops waiting because the deadline elapsed.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
    query_timeout: Duration,
}

impl Database {
    /// Open (creating if needed) the database at `path` with WAL enabled and
    /// migrations applied.
    pub async fn open(path: &str) -> Result<Self, ShopchatError> {
        Self::open_with(&StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT.as_millis() as u64,
        })
        .await
    }

    pub async fn open_with(config: &StorageConfig) -> Result<Self, ShopchatError> {
        let path = config.database_path.clone();
        if let Some(parent) = std::path::Path::new(&path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| ShopchatError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(&path)
            .await
            .map_err(|e| ShopchatError::Storage {
                source: Box::new(e),
            })?;

        let wal_mode = config.wal_mode;
        conn.call(move |conn| -> Result<(), ShopchatError> {
            apply_pragmas(conn, wal_mode).map_err(|e| ShopchatError::Storage {
                source: Box::new(e),
            })?;
            migrations::run_migrations(conn)
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path = %path, wal_mode, "database opened");
        Ok(Self {
            conn,
            query_timeout: Duration::from_millis(config.query_timeout_ms),
        })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Run `f` on the writer thread, bounded by the query deadline.
    ///
    /// The deadline covers the wait for the writer. A call still queued when
    /// it elapses is abandoned (the closure never runs) and
    /// [`ShopchatError::Timeout`] is returned. A call already running is
    /// awaited to completion with a stall warning, so a committed write is
    /// never reported as failed.
    pub async fn call<F, R>(&self, op: &'static str, f: F) -> Result<R, ShopchatError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, rusqlite::Error> + Send + 'static,
        R: Send + 'static,
    {
        let phase = Arc::new(AtomicU8::new(QUEUED));
        let claim = Arc::clone(&phase);
        let mut pending = std::pin::pin!(self.conn.call(
            move |conn| -> Result<Option<R>, rusqlite::Error> {
                if claim
                    .compare_exchange(QUEUED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    return Ok(None);
                }
                f(conn).map(Some)
            }
        ));

        let finished = match tokio::time::timeout(self.query_timeout, pending.as_mut()).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = self.query_timeout.as_millis() as u64;
                if phase
                    .compare_exchange(QUEUED, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    warn!(op, timeout_ms, "database call still queued past its deadline, abandoned");
                    return Err(ShopchatError::Timeout {
                        duration: self.query_timeout,
                    });
                }
                warn!(op, timeout_ms, "database call stalled past its deadline");
                pending.await
            }
        };

        finished.map_err(map_tr_err)?.ok_or(ShopchatError::Timeout {
            duration: self.query_timeout,
        })
    }

    /// Checkpoint the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), ShopchatError> {
        self.call("checkpoint", |conn| -> Result<(), rusqlite::Error> {
            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE);", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }

    /// Checkpoint and close the connection. Clones of this handle fail
    /// afterwards.
    pub async fn close(self) -> Result<(), ShopchatError> {
        self.checkpoint().await?;
        self.conn.close().await.map_err(map_tr_err)?;
        debug!("database closed");
        Ok(())
    }
}

fn apply_pragmas(conn: &mut rusqlite::Connection, wal_mode: bool) -> Result<(), rusqlite::Error> {
    if wal_mode {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(journal_mode = %mode, "journal mode set");
    }
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(())
}

/// Flatten a tokio-rusqlite error into a storage error.
pub(crate) fn map_tr_err<E: std::fmt::Display>(e: tokio_rusqlite::Error<E>) -> ShopchatError {
    ShopchatError::Storage {
        source: e.to_string().into(),
    }
}

/// Whether `e` is a UNIQUE/CHECK/foreign-key violation.
pub(crate) fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_applies_schema_and_wal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("open.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        let (mode, tables) = db
            .call("inspect", |conn| -> Result<(String, i64), rusqlite::Error> {
                let mode: String = conn.query_row("PRAGMA journal_mode", [], |r| r.get(0))?;
                let tables: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
                     AND name IN ('flows', 'flow_nodes', 'flow_connections', 'customers', \
                     'execution_states', 'chat_messages', 'chat_sessions', 'products', 'orders')",
                    [],
                    |r| r.get(0),
                )?;
                Ok((mode, tables))
            })
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        assert_eq!(tables, 9);
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reopen.db");
        let path = path.to_str().unwrap();
        drop(Database::open(path).await.unwrap());
        let db = Database::open(path).await.unwrap();
        db.checkpoint().await.unwrap();
    }

    #[tokio::test]
    async fn open_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/shop.db");
        Database::open(path.to_str().unwrap()).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("fk.db").to_str().unwrap())
            .await
            .unwrap();
        let violated = db
            .call("orphan", |conn| -> Result<bool, rusqlite::Error> {
                match conn.execute(
                    "INSERT INTO chat_sessions (customer_id, channel, last_message_at) \
                     VALUES (999, 'telegram', 'now')",
                    [],
                ) {
                    Ok(_) => Ok(false),
                    Err(e) if is_constraint_violation(&e) => Ok(true),
                    Err(e) => Err(e),
                }
            })
            .await
            .unwrap();
        assert!(violated);
    }

    #[tokio::test]
    async fn running_call_outlives_deadline() {
        let dir = tempdir().unwrap();
        let mut db = Database::open(dir.path().join("slow.db").to_str().unwrap())
            .await
            .unwrap();
        db.query_timeout = Duration::from_millis(20);

        let value = db
            .call("sleepy", |_conn| -> Result<i64, rusqlite::Error> {
                std::thread::sleep(Duration::from_millis(200));
                Ok(7)
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn queued_call_past_deadline_never_runs() {
        let dir = tempdir().unwrap();
        let mut db = Database::open(dir.path().join("queued.db").to_str().unwrap())
            .await
            .unwrap();
        db.query_timeout = Duration::from_millis(50);

        let busy = db.clone();
        let blocker = tokio::spawn(async move {
            busy.call("blocker", |_conn| -> Result<(), rusqlite::Error> {
                std::thread::sleep(Duration::from_millis(400));
                Ok(())
            })
            .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = db
            .call("late", |conn| -> Result<(), rusqlite::Error> {
                conn.execute("CREATE TABLE late_marker (id INTEGER)", [])?;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ShopchatError::Timeout { .. }));

        blocker.await.unwrap().unwrap();
        db.query_timeout = Duration::from_secs(5);
        let created: i64 = db
            .call("inspect", |conn| -> Result<i64, rusqlite::Error> {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE name = 'late_marker'",
                    [],
                    |r| r.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(created, 0);
    }
}
