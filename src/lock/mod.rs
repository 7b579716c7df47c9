//! Non-blocking exclusion guards for index writes and reindex scans
//!
//! Each guard is a single-slot semaphore paired with a status flag.
//! Acquisition is try-once: a busy guard yields `None` immediately and the
//! caller turns that into a no-op for the current tick. Guards are never
//! nested and never waited on.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// A try-once exclusive permit for one class of operations
#[derive(Debug)]
pub struct IndexingLock {
    name: &'static str,
    slot: Arc<Semaphore>,
    active: Arc<AtomicBool>,
}

/// Held while an operation owns an `IndexingLock`.
///
/// Dropping the permit clears the status flag first and then frees the slot,
/// so observers never see the flag unset while the slot is still taken by
/// the same holder.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the permit is dropped"]
pub struct LockPermit {
    name: &'static str,
    active: Arc<AtomicBool>,
    _slot: OwnedSemaphorePermit,
}

impl IndexingLock {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Arc::new(Semaphore::new(1)),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Try to take the lock without waiting
    pub fn try_acquire(&self) -> Option<LockPermit> {
        match Arc::clone(&self.slot).try_acquire_owned() {
            Ok(slot) => {
                self.active.store(true, Ordering::Release);
                tracing::trace!(lock = self.name, "Lock acquired");
                Some(LockPermit {
                    name: self.name,
                    active: Arc::clone(&self.active),
                    _slot: slot,
                })
            }
            Err(TryAcquireError::NoPermits) => None,
            // The semaphore is never closed
            Err(TryAcquireError::Closed) => None,
        }
    }

    /// Whether an operation currently holds the lock
    #[inline]
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for LockPermit {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
        tracing::trace!(lock = self.name, "Lock released");
    }
}

/// The two independent guards of the indexing pipeline
#[derive(Debug)]
pub struct IndexingLocks {
    /// Protects every mutation of the index resource
    pub write: IndexingLock,
    /// Protects the reindex population pass
    pub reindex: IndexingLock,
}

impl IndexingLocks {
    #[must_use]
    pub fn new() -> Self {
        Self {
            write: IndexingLock::new("write"),
            reindex: IndexingLock::new("reindex"),
        }
    }
}

impl Default for IndexingLocks {
    fn default() -> Self {
        Self::new()
    }
}
