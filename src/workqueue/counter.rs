//! Pending-work accounting shared by producers, the expander and the queue
//!
//! Two quantities live behind one lock:
//! - `pending`: tasks registered with [`QueueAddCount::add`] and not yet
//!   acknowledged with [`QueueAddCount::done`]
//! - `expanding`: tasks handed to the expander that have not been expanded yet
//!
//! The run is drained only when both are zero. Every stage raises the
//! quantity that covers the next stage before lowering its own, so an
//! observer never sees a zero that is about to be raised again.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{error, trace};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountingError {
    #[error("cannot register zero pending tasks")]
    ZeroAdd,

    #[error("cannot acknowledge zero tasks")]
    ZeroDone,

    #[error("done({requested}) exceeds pending count {pending}")]
    Underflow { requested: u64, pending: u64 },

    #[error("expansion finished without a matching registration")]
    UnregisteredExpansion,
}

pub type Result<T> = std::result::Result<T, AccountingError>;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Counts {
    pending: u64,
    expanding: u64,
}

impl Counts {
    fn is_drained(&self) -> bool {
        self.pending == 0 && self.expanding == 0
    }
}

#[derive(Debug, Default)]
struct Shared {
    counts: Mutex<Counts>,
    drained: Notify,
}

/// Cloneable handle to the pending-work counter of one crawl run
#[derive(Debug, Clone, Default)]
pub struct QueueAddCount {
    shared: Arc<Shared>,
}

impl QueueAddCount {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Counts> {
        // Counts are plain integers, a panicking holder cannot leave them torn
        self.shared
            .counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `n` tasks that are about to become visible to consumers
    pub fn add(&self, n: u64) -> Result<()> {
        if n == 0 {
            return Err(AccountingError::ZeroAdd);
        }
        let mut counts = self.lock();
        counts.pending += n;
        trace!(n, pending = counts.pending, "Pending tasks registered");
        Ok(())
    }

    /// Acknowledge `n` tasks as fully processed
    pub fn done(&self, n: u64) -> Result<()> {
        if n == 0 {
            return Err(AccountingError::ZeroDone);
        }
        let mut counts = self.lock();
        if n > counts.pending {
            error!(n, pending = counts.pending, "Pending count would go negative");
            return Err(AccountingError::Underflow {
                requested: n,
                pending: counts.pending,
            });
        }
        counts.pending -= n;
        trace!(n, pending = counts.pending, "Pending tasks acknowledged");
        self.notify_if_drained(&counts);
        Ok(())
    }

    /// Current number of registered, unacknowledged tasks
    pub fn count(&self) -> u64 {
        self.lock().pending
    }

    /// Reserve one task on its way into the expander
    pub fn begin_expansion(&self) {
        let mut counts = self.lock();
        counts.expanding += 1;
    }

    /// Retire a reservation made by [`begin_expansion`](Self::begin_expansion)
    ///
    /// Call only after the expanded tasks have been registered with `add`.
    pub fn end_expansion(&self) -> Result<()> {
        let mut counts = self.lock();
        if counts.expanding == 0 {
            error!("Expansion retired without a reservation");
            return Err(AccountingError::UnregisteredExpansion);
        }
        counts.expanding -= 1;
        self.notify_if_drained(&counts);
        Ok(())
    }

    /// Tasks reserved for expansion and not yet expanded
    pub fn expansions(&self) -> u64 {
        self.lock().expanding
    }

    /// No pending tasks and no reserved expansions, read atomically
    pub fn is_drained(&self) -> bool {
        self.lock().is_drained()
    }

    /// Wait until the run is drained
    ///
    /// Returns immediately if it already is. A drained run can be revived by
    /// a later `add`, so callers deciding termination should re-check under
    /// their own ordering (the queue does).
    pub async fn wait_drained(&self) {
        loop {
            let notified = self.shared.drained.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent transition is not missed
            notified.as_mut().enable();

            if self.is_drained() {
                return;
            }
            notified.await;
        }
    }

    fn notify_if_drained(&self, counts: &Counts) {
        if counts.is_drained() {
            self.shared.drained.notify_waiters();
        }
    }
}
