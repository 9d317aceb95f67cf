//! Per-Key Expiration Timers
//!
//! EXPIRE arms a one-shot timer for a single key. The timer is a Tokio task
//! that sleeps for the TTL, then takes the table lock and deletes the key
//! only if it still holds the value that was there when the timer was armed.
//!
//! ## Cancellation
//!
//! The entry owns the [`ExpiryHandle`] of its armed timer. Dropping the
//! handle aborts the task, so every path that replaces or mutates an entry
//! (SET, pushes, pops, HMSET, a second EXPIRE, PERSIST) cancels the pending
//! timer simply by letting go of the handle. At most one timer per key is
//! ever live.
//!
//! ## Compare-and-Delete
//!
//! Abort only takes effect at an await point, so a timer that has already
//! woken up may be waiting on the lock while a writer replaces the entry.
//! When it finally gets the lock it checks two things before deleting:
//!
//! ```text
//!   entry.version == version captured at EXPIRE time
//!   entry.expiry.id == id of this timer
//! ```
//!
//! Either mismatch means the timer is stale and it does nothing.

use crate::storage::engine::Table;
use std::sync::Weak;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Longest delay a timer is armed for; larger TTLs are clamped.
const MAX_TTL: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Handle to an armed expiration timer.
///
/// Dropping the handle cancels the timer.
#[derive(Debug)]
pub struct ExpiryHandle {
    /// Unique id of the timer, checked by the callback before deleting
    id: u64,
    /// When the timer fires
    deadline: Instant,
    /// Abort handle of the sleeping task
    task: AbortHandle,
}

impl ExpiryHandle {
    /// Returns the id of this timer.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the time left before the timer fires (zero once due).
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

impl Drop for ExpiryHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Arms a timer that deletes `key` after `ttl` if the entry is unchanged.
///
/// The task holds only a weak reference to the table, so a dropped engine
/// is never kept alive by pending timers.
pub(crate) fn schedule(
    runtime: &Handle,
    table: Weak<Table>,
    key: String,
    version: u64,
    id: u64,
    ttl: Duration,
) -> ExpiryHandle {
    let ttl = ttl.min(MAX_TTL);
    let deadline = Instant::now() + ttl;
    debug!(key = %key, id, ttl_ms = ttl.as_millis() as u64, "Expiration armed");

    let task = runtime.spawn(async move {
        tokio::time::sleep_until(deadline).await;

        let Some(table) = table.upgrade() else {
            return;
        };
        expire_if_unchanged(&table, &key, version, id);
    });

    ExpiryHandle {
        id,
        deadline,
        task: task.abort_handle(),
    }
}

/// Deletes `key` if it still carries `version` and timer `id` is the armed one.
///
/// Returns `true` if the key was removed. Calling this with a stale
/// version or id is a no-op.
pub(crate) fn expire_if_unchanged(table: &Table, key: &str, version: u64, id: u64) -> bool {
    let mut entries = table.write();

    let unchanged = entries
        .get(key)
        .map(|entry| entry.version() == version && entry.expiry_id() == Some(id))
        .unwrap_or(false);

    if !unchanged {
        trace!(key, id, "Stale expiration skipped");
        return false;
    }

    // The removed entry owns this timer's handle; aborting a task from
    // inside itself is harmless once no await point remains.
    entries.remove(key);
    table.record_expired();
    debug!(key, id, "Key expired");
    true
}
