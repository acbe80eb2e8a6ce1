//! Store session owned by one Unit of Work.
//!
//! # Responsibility
//! - Own the SQLite connection for one logical scope.
//! - Begin the write transaction lazily and finish it on commit/rollback.
//! - Carry the scope's cancellation state.
//!
//! # Invariants
//! - A session is never shared between Unit-of-Work instances.
//! - After `close`, every access fails with `RepoError::SessionClosed`.
//! - Dropping a session with an open transaction rolls it back.

use crate::repo::{RepoError, RepoResult};
use log::{debug, warn};
use rusqlite::{Connection, InterruptHandle};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// One connection plus its transaction and cancellation state.
pub struct Session {
    scope_id: Uuid,
    conn: Connection,
    closed: Cell<bool>,
    cancelled: Arc<AtomicBool>,
}

impl Session {
    pub fn new(conn: Connection) -> Self {
        Self {
            scope_id: Uuid::new_v4(),
            conn,
            closed: Cell::new(false),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Identifier of the owning scope, used in log events.
    pub fn scope_id(&self) -> Uuid {
        self.scope_id
    }

    /// Connection for queries; does not open a transaction.
    ///
    /// Reads observe committed data plus this session's own pending writes.
    pub fn reader(&self) -> RepoResult<&Connection> {
        self.ensure_usable()?;
        Ok(&self.conn)
    }

    /// Connection for mutations; opens an immediate transaction on first use.
    pub fn writer(&self) -> RepoResult<&Connection> {
        self.ensure_usable()?;
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN IMMEDIATE;")?;
            debug!(
                "event=tx_begin module=uow status=ok scope={}",
                self.scope_id
            );
        }
        Ok(&self.conn)
    }

    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Commits pending writes. A cancelled scope rolls back instead.
    pub fn commit(&self) -> RepoResult<()> {
        if self.is_cancelled() {
            self.rollback()?;
            return Err(RepoError::Cancelled);
        }
        if self.closed.get() {
            return Err(RepoError::SessionClosed);
        }
        if !self.in_transaction() {
            return Ok(());
        }
        if let Err(err) = self.conn.execute_batch("COMMIT;") {
            self.rollback()?;
            return Err(err.into());
        }
        debug!(
            "event=tx_commit module=uow status=ok scope={}",
            self.scope_id
        );
        Ok(())
    }

    /// Discards pending writes. No-op when no transaction is open.
    pub fn rollback(&self) -> RepoResult<()> {
        // SQLite may already have rolled back on its own (e.g. interrupts).
        if !self.in_transaction() {
            return Ok(());
        }
        self.conn
            .execute_batch("ROLLBACK;")
            .map_err(|err| RepoError::Db(err.into()))?;
        debug!(
            "event=tx_rollback module=uow status=ok scope={}",
            self.scope_id
        );
        Ok(())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns a thread-safe handle able to cancel this session.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            scope_id: self.scope_id,
            flag: Arc::clone(&self.cancelled),
            interrupt: Arc::new(self.conn.get_interrupt_handle()),
        }
    }

    /// Rolls back and marks the session unusable.
    pub(crate) fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        if let Err(err) = self.rollback() {
            warn!(
                "event=session_close module=uow status=error scope={} error={}",
                self.scope_id, err
            );
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    fn ensure_usable(&self) -> RepoResult<()> {
        if self.closed.get() {
            return Err(RepoError::SessionClosed);
        }
        if self.is_cancelled() {
            return Err(RepoError::Cancelled);
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.in_transaction() {
            if let Err(err) = self.conn.execute_batch("ROLLBACK;") {
                warn!(
                    "event=session_drop module=uow status=error scope={} error={}",
                    self.scope_id, err
                );
            }
        }
    }
}

/// Cancellation signal for one session.
///
/// Cancellation is sticky: once cancelled, the scope refuses further work and
/// its pending transaction is rolled back at the next commit or access.
#[derive(Clone)]
pub struct CancelHandle {
    scope_id: Uuid,
    flag: Arc<AtomicBool>,
    interrupt: Arc<InterruptHandle>,
}

impl CancelHandle {
    /// Sets the cancellation flag and interrupts any running statement.
    pub fn cancel(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            debug!("event=cancel module=uow status=ok scope={}", self.scope_id);
        }
        self.interrupt.interrupt();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
