#![forbid(unsafe_code)]

//! Multi-handler notification sink.
//!
//! # Design
//!
//! [`Signal<A>`] keeps its handlers in an [`ArcSwap`]-backed copy-on-write
//! list. Emitting loads one snapshot of the list and calls every handler in
//! registration order on the emitting thread, so subscribing or
//! unsubscribing never blocks an in-flight emission and an emission never
//! holds a lock while user code runs.
//!
//! # Invariants
//!
//! 1. Handlers run in registration order.
//! 2. A handler subscribed during an emission is first called on the next
//!    emission.
//! 3. A handler unsubscribed during an emission may still receive the value
//!    being emitted, and nothing after it.
//!
//! # Failure Modes
//!
//! - **Handler panics**: the panic unwinds out of [`Signal::emit`]; handlers
//!   after it are skipped for that value. The signal itself stays usable.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;

use crate::listener::{Listener, Unsubscribe};

type Handler<A> = Arc<dyn Fn(&A) + Send + Sync>;

struct Entry<A> {
    id: u64,
    handler: Handler<A>,
}

impl<A> Clone for Entry<A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            handler: Arc::clone(&self.handler),
        }
    }
}

struct SignalInner<A> {
    handlers: ArcSwap<Vec<Entry<A>>>,
    next_id: AtomicU64,
}

impl<A: 'static> Unsubscribe for SignalInner<A> {
    fn unsubscribe(&self, id: u64) {
        self.handlers.rcu(|current| {
            current
                .iter()
                .filter(|entry| entry.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
    }
}

/// A list of handlers notified with `&A`.
///
/// Cloning a `Signal` creates a new handle to the **same** handler list.
pub struct Signal<A> {
    inner: Arc<SignalInner<A>>,
}

impl<A> Clone for Signal<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: 'static> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("handlers", &self.inner.handlers.load().len())
            .finish()
    }
}

impl<A: 'static> Signal<A> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                handlers: ArcSwap::from_pointee(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register `handler`. It stays registered until the returned
    /// [`Listener`] is disposed or dropped.
    pub fn subscribe(&self, handler: impl Fn(&A) + Send + Sync + 'static) -> Listener {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Entry {
            id,
            handler: Arc::new(handler) as Handler<A>,
        };
        self.inner.handlers.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(entry.clone());
            next
        });
        let target: std::sync::Weak<SignalInner<A>> = Arc::downgrade(&self.inner);
        Listener::slot(target, id)
    }

    /// Call every registered handler with `value`.
    pub fn emit(&self, value: &A) {
        let handlers = self.inner.handlers.load_full();
        for entry in handlers.iter() {
            (entry.handler)(value);
        }
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.inner.handlers.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handler_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::thread;

    #[test]
    fn handlers_run_in_registration_order() {
        let signal = Signal::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let listeners: Vec<_> = (0..3)
            .map(|i| {
                let log = Arc::clone(&log);
                signal.subscribe(move |v: &u32| log.lock().push((i, *v)))
            })
            .collect();

        signal.emit(&7);
        assert_eq!(*log.lock(), vec![(0, 7), (1, 7), (2, 7)]);
        assert_eq!(listeners.len(), signal.handler_count());
    }

    #[test]
    fn disposed_listener_stops_receiving() {
        let signal = Signal::new();
        let hits = Arc::new(AtomicU64::new(0));
        let hits_clone = Arc::clone(&hits);
        let listener = signal.subscribe(move |_: &()| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        signal.emit(&());
        listener.dispose();
        signal.emit(&());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(signal.is_empty());
    }

    #[test]
    fn dropping_listener_unsubscribes() {
        let signal: Signal<i32> = Signal::new();
        {
            let _listener = signal.subscribe(|_| {});
            assert_eq!(signal.handler_count(), 1);
        }
        assert_eq!(signal.handler_count(), 0);
    }

    #[test]
    fn listener_outliving_signal_is_inert() {
        let signal: Signal<i32> = Signal::new();
        let listener = signal.subscribe(|_| {});
        drop(signal);
        listener.dispose();
        assert!(listener.is_disposed());
    }

    #[test]
    fn subscribe_during_emit_waits_for_next_emission() {
        let signal: Signal<u8> = Signal::new();
        let late_hits = Arc::new(AtomicU64::new(0));
        let late_listener = Arc::new(Mutex::new(None));

        let signal_clone = signal.clone();
        let late_hits_clone = Arc::clone(&late_hits);
        let slot = Arc::clone(&late_listener);
        let _outer = signal.subscribe(move |_| {
            let mut slot = slot.lock();
            if slot.is_none() {
                let hits = Arc::clone(&late_hits_clone);
                *slot = Some(signal_clone.subscribe(move |_| {
                    hits.fetch_add(1, Ordering::SeqCst);
                }));
            }
        });

        signal.emit(&0);
        assert_eq!(late_hits.load(Ordering::SeqCst), 0);
        signal.emit(&0);
        assert_eq!(late_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_subscribe_and_emit() {
        let signal: Signal<u64> = Signal::new();
        let total = Arc::new(AtomicU64::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let signal = signal.clone();
                let total = Arc::clone(&total);
                thread::spawn(move || {
                    let total_clone = Arc::clone(&total);
                    let listener = signal.subscribe(move |v| {
                        total_clone.fetch_add(*v, Ordering::SeqCst);
                    });
                    for _ in 0..100 {
                        signal.emit(&0);
                    }
                    listener.dispose();
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("emitter panicked");
        }
        assert!(signal.is_empty());
        assert_eq!(total.load(Ordering::SeqCst), 0);
    }
}
