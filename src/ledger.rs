//! Durable set of identifiers that must never be fetched again.
//!
//! Inserts run inside one long-lived SQLite transaction that is committed
//! every `commit_every` inserts and when the ledger is closed or dropped.
//! Lookups go through the same connection, so uncommitted inserts are
//! already visible to `exists`.

use crate::db::{self, OptionalRowExt};
use crate::{GrabError, Result};
use rusqlite::{params, Connection, ErrorCode};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_COMMIT_EVERY: usize = 100;

pub struct PinLedger {
    inner: Mutex<LedgerInner>,
    commit_every: usize,
}

struct LedgerInner {
    conn: Connection,
    pending: usize,
    open: bool,
}

impl PinLedger {
    pub fn open(db_path: &Path, commit_every: usize) -> Result<Self> {
        let conn = db::open(db_path)?;
        db::migrate(&conn)?;
        conn.execute_batch("BEGIN")?;
        Ok(Self {
            inner: Mutex::new(LedgerInner {
                conn,
                pending: 0,
                open: true,
            }),
            commit_every: commit_every.max(1),
        })
    }

    pub fn exists(&self, pin: u64) -> Result<bool> {
        let inner = self.lock();
        let found: Option<i64> = inner
            .conn
            .query_row("SELECT id FROM pins WHERE pin=?1", [pin as i64], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    /// Records `pin`. Fails with `DuplicateIdentifier` if it is already present.
    pub fn add(&self, pin: u64) -> Result<()> {
        let mut inner = self.lock();
        let inserted = inner.conn.execute(
            "INSERT INTO pins(pin, timestamp_ms) VALUES (?1, ?2)",
            params![pin as i64, now_ms()],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(GrabError::DuplicateIdentifier(pin));
            }
            Err(e) => return Err(e.into()),
        }

        inner.pending += 1;
        if inner.pending >= self.commit_every {
            inner.commit_and_reopen()?;
        }
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        let inner = self.lock();
        let count: i64 = inner
            .conn
            .query_row("SELECT COUNT(*) FROM pins", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Inserts not yet committed.
    pub fn pending(&self) -> usize {
        self.lock().pending
    }

    pub fn flush(&self) -> Result<()> {
        self.lock().commit_and_reopen()
    }

    pub fn close(self) -> Result<()> {
        let mut inner = self.lock();
        inner.finish()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LedgerInner {
    fn commit_and_reopen(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT; BEGIN")?;
        self.pending = 0;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.conn.execute_batch("COMMIT")?;
        self.pending = 0;
        Ok(())
    }
}

impl Drop for PinLedger {
    fn drop(&mut self) {
        let _ = self.lock().finish();
    }
}

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
