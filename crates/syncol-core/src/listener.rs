#![forbid(unsafe_code)]

//! Subscription tokens and the registry that releases them together.
//!
//! # Design
//!
//! A [`Listener`] binds one handler slot on a [`Signal`](crate::signal::Signal)
//! (or an arbitrary release callback) to an explicit [`dispose`](Listener::dispose)
//! operation. Dropping a listener disposes it as well, so a forgotten token
//! never leaks a live handler.
//!
//! A [`ListenerRegistry`] is a composite disposable: a dynamic set of
//! listeners released all at once.
//!
//! # Invariants
//!
//! 1. A listener is made inert exactly once, whether through `dispose()`,
//!    its registry, or drop.
//! 2. Disposing a registry twice is the same as disposing it once.
//! 3. A listener added to an already disposed registry is disposed on the
//!    spot.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Capability for values that hold resources released on teardown.
///
/// Element types opt into this so a collection built with
/// `disposing()` can release them when it is torn down.
pub trait Disposable {
    fn dispose(&self);
}

impl<T: Disposable + ?Sized> Disposable for Arc<T> {
    fn dispose(&self) {
        (**self).dispose();
    }
}

impl<T: Disposable + ?Sized> Disposable for Box<T> {
    fn dispose(&self) {
        (**self).dispose();
    }
}

/// Something a listener can detach itself from.
pub(crate) trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, id: u64);
}

enum Release {
    Slot { target: Weak<dyn Unsubscribe>, id: u64 },
    Callback(Box<dyn FnOnce() + Send>),
}

/// A live subscription. Inert after the first [`dispose`](Self::dispose).
#[must_use = "dropping a Listener unsubscribes it"]
pub struct Listener {
    release: Mutex<Option<Release>>,
}

impl Listener {
    pub(crate) fn slot(target: Weak<dyn Unsubscribe>, id: u64) -> Self {
        Self {
            release: Mutex::new(Some(Release::Slot { target, id })),
        }
    }

    /// A listener whose disposal runs `release` once.
    pub fn from_fn(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Mutex::new(Some(Release::Callback(Box::new(release)))),
        }
    }

    /// Detach the subscription. Later calls do nothing.
    pub fn dispose(&self) {
        let release = self.release.lock().take();
        match release {
            Some(Release::Slot { target, id }) => {
                if let Some(target) = target.upgrade() {
                    target.unsubscribe(id);
                }
            }
            Some(Release::Callback(release)) => release(),
            None => {}
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.release.lock().is_none()
    }
}

impl Disposable for Listener {
    fn dispose(&self) {
        Listener::dispose(self);
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[derive(Default)]
struct RegistryState {
    listeners: Vec<Listener>,
    disposed: bool,
}

/// A set of listeners released together.
#[derive(Default)]
pub struct ListenerRegistry {
    state: Mutex<RegistryState>,
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `listener`. Disposes it immediately if the registry
    /// was already disposed.
    pub fn add(&self, listener: Listener) {
        let mut state = self.state.lock();
        if state.disposed {
            drop(state);
            listener.dispose();
        } else {
            state.listeners.push(listener);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Dispose every member. Returns how many listeners this call released
    /// (zero on every call after the first).
    pub fn dispose(&self) -> usize {
        let listeners = {
            let mut state = self.state.lock();
            state.disposed = true;
            std::mem::take(&mut state.listeners)
        };
        // Released outside the lock: a release callback may touch the registry.
        let released = listeners.len();
        for listener in listeners {
            listener.dispose();
        }
        released
    }
}

impl Disposable for ListenerRegistry {
    fn dispose(&self) {
        ListenerRegistry::dispose(self);
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ListenerRegistry")
            .field("len", &state.listeners.len())
            .field("disposed", &state.disposed)
            .finish()
    }
}
