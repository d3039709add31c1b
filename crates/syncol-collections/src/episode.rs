#![forbid(unsafe_code)]

//! The per-collection episode lock.
//!
//! Every mutation of a collection runs as one *write episode*: read the
//! pre-state, mutate, emit notifications. Every mirror or projection built
//! from a collection runs its snapshot-and-subscribe sequence as one
//! *construction episode*. Both enter the collection's [`EpisodeLock`], so
//! episodes on one collection are fully serialized.
//!
//! # Design
//!
//! The lock is a reentrant mutex carrying an "in write" flag:
//!
//! - [`EpisodeLock::lock`] enters reentrantly. A notification handler may
//!   build a mirror of the collection that is notifying it.
//! - [`EpisodeLock::begin_write`] fails with
//!   [`CollectionError::ReentrantWrite`] when the current thread is already
//!   inside a write episode of this lock, instead of deadlocking against its
//!   own read guard.
//!
//! Both guards release on drop, including during unwinding.

use std::cell::Cell;
use std::fmt;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use syncol_core::error::{CollectionError, Result};

#[derive(Default)]
pub struct EpisodeLock {
    state: ReentrantMutex<Cell<bool>>,
}

impl EpisodeLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the lock for a construction episode or a caller-defined
    /// compound sequence.
    pub fn lock(&self) -> EpisodeGuard<'_> {
        EpisodeGuard {
            _guard: self.state.lock(),
        }
    }

    /// Open a write episode.
    pub fn begin_write(&self) -> Result<WriteEpisode<'_>> {
        let guard = self.state.lock();
        if guard.get() {
            return Err(CollectionError::ReentrantWrite);
        }
        guard.set(true);
        Ok(WriteEpisode { guard })
    }

    /// Whether any thread is inside this lock right now.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state.is_locked()
    }
}

impl fmt::Debug for EpisodeLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpisodeLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Held for the duration of a construction episode.
#[must_use = "the episode ends when the guard is dropped"]
pub struct EpisodeGuard<'a> {
    _guard: ReentrantMutexGuard<'a, Cell<bool>>,
}

/// Held for the duration of a write episode.
#[must_use = "the episode ends when the guard is dropped"]
pub struct WriteEpisode<'a> {
    guard: ReentrantMutexGuard<'a, Cell<bool>>,
}

impl Drop for WriteEpisode<'_> {
    fn drop(&mut self) {
        self.guard.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn nested_write_on_same_thread_is_rejected() {
        let lock = EpisodeLock::new();
        let outer = lock.begin_write().unwrap();
        assert_eq!(
            lock.begin_write().err(),
            Some(CollectionError::ReentrantWrite)
        );
        drop(outer);
        assert!(lock.begin_write().is_ok());
    }

    #[test]
    fn construction_episode_reenters_write() {
        let lock = EpisodeLock::new();
        let _write = lock.begin_write().unwrap();
        let _nested = lock.lock();
        assert!(lock.is_locked());
    }

    #[test]
    fn write_inside_plain_lock_is_allowed() {
        let lock = EpisodeLock::new();
        let _outer = lock.lock();
        let write = lock.begin_write();
        assert!(write.is_ok());
    }

    #[test]
    fn episodes_are_serialized_across_threads() {
        let lock = Arc::new(EpisodeLock::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let inside = Arc::clone(&inside);
                let overlaps = Arc::clone(&overlaps);
                thread::spawn(move || {
                    for _ in 0..200 {
                        let _episode = lock.begin_write().expect("no reentrancy here");
                        if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                            overlaps.fetch_add(1, Ordering::SeqCst);
                        }
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("episode thread panicked");
        }
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        assert!(!lock.is_locked());
    }
}
