#![forbid(unsafe_code)]

//! Coordination point between a collection, its mirrors, and its upstream
//! subscriptions.
//!
//! A [`Synchronizer`] belongs to exactly one collection and holds:
//!
//! - the collection's [`EpisodeLock`], entered by every write episode on the
//!   collection and by every mirror or projection built from it;
//! - the [`ListenerRegistry`] of *upstream* listeners: subscriptions this
//!   collection made on other collections (a mirror's translating listener
//!   lives here, not in the source);
//! - a weak back reference to the collection, used for teardown.
//!
//! # Disposal
//!
//! Disposal is idempotent. With no upstream listeners it only marks the
//! synchronizer disposed. Otherwise it releases every upstream listener
//! first (no further inbound change can arrive), then asks the collection to
//! clear itself and dispose the elements that were present.
//!
//! A dispose requested from inside one of the collection's own write
//! episodes (a handler disposing the collection that is notifying it) cannot
//! open a write episode of its own. The teardown is parked instead and runs
//! as soon as that outer write episode ends.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use syncol_core::error::Result;
use syncol_core::listener::ListenerRegistry;

use crate::episode::{EpisodeGuard, EpisodeLock};

/// Collection-side half of the disposal cascade.
pub(crate) trait Teardown: Send + Sync {
    fn teardown(self: Arc<Self>, listeners: usize) -> Result<()>;
}

pub struct Synchronizer {
    lock: Arc<EpisodeLock>,
    listeners: ListenerRegistry,
    owner: Weak<dyn Teardown>,
    disposed: AtomicBool,
    /// Released listener count of a teardown waiting for the current write
    /// episode to end; zero when none is parked.
    deferred: AtomicUsize,
}

impl Synchronizer {
    pub(crate) fn new(owner: Weak<dyn Teardown>) -> Self {
        Self {
            lock: Arc::new(EpisodeLock::new()),
            listeners: ListenerRegistry::new(),
            owner,
            disposed: AtomicBool::new(false),
            deferred: AtomicUsize::new(0),
        }
    }

    /// Enter the episode lock. While the guard lives no write episode and no
    /// mirror construction can start on this collection from another thread.
    pub fn lock(&self) -> EpisodeGuard<'_> {
        self.lock.lock()
    }

    #[must_use]
    pub fn episode_lock(&self) -> &EpisodeLock {
        &self.lock
    }

    /// Whether both synchronizers coordinate through the same lock.
    #[must_use]
    pub fn same_lock(&self, other: &Synchronizer) -> bool {
        Arc::ptr_eq(&self.lock, &other.lock)
    }

    /// Upstream listeners released when this synchronizer is disposed.
    #[must_use]
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Dispose the synchronizer and, if it held upstream listeners, tear the
    /// collection down.
    ///
    /// # Errors
    ///
    /// Whatever the collection's teardown reports. The synchronizer is
    /// disposed either way and a second call returns `Ok(())`.
    pub fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let released = self.listeners.dispose();
        if released == 0 {
            return Ok(());
        }
        self.teardown(released)
    }

    /// Whether a teardown is parked behind the current write episode.
    #[must_use]
    pub fn has_deferred_teardown(&self) -> bool {
        self.deferred.load(Ordering::Acquire) != 0
    }

    pub(crate) fn defer_teardown(&self, listeners: usize) {
        self.deferred.store(listeners, Ordering::Release);
    }

    /// Run a parked teardown, if any. Called once a write episode has ended.
    pub(crate) fn run_deferred_teardown(&self) -> Result<()> {
        let released = self.deferred.swap(0, Ordering::AcqRel);
        if released == 0 {
            return Ok(());
        }
        self.teardown(released)
    }

    fn teardown(&self, released: usize) -> Result<()> {
        match self.owner.upgrade() {
            Some(owner) => owner.teardown(released),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronizer")
            .field("listeners", &self.listeners.len())
            .field("disposed", &self.is_disposed())
            .field("deferred", &self.has_deferred_teardown())
            .finish()
    }
}
