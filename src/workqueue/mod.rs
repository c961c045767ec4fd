//! Pending-work accounting and the work queue
//!
//! [`QueueAddCount`] is the single source of truth for "is there work left".
//! The [`WorkQueue`] sits on the expander output, hands [`Lease`]s to workers
//! and reports the end of a run once the counter drains.

mod counter;
mod queue;

pub use counter::{AccountingError, QueueAddCount, Result};
pub use queue::{Lease, WorkQueue};
