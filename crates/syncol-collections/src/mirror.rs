#![forbid(unsafe_code)]

//! Mirroring: derived collections kept equal to `map(f, source)`.
//!
//! # Design
//!
//! Construction runs as one episode on the source:
//!
//! 1. enter the source's episode lock;
//! 2. seed the derived collection with `f(item)` for every element of a
//!    snapshot, in order;
//! 3. subscribe a translating listener to the source's collection changes and
//!    register it in the derived collection's upstream registry;
//! 4. release the lock.
//!
//! No write on the source can start between (2) and (3), so every mutation
//! is either part of the snapshot or replayed through the listener, never
//! both and never neither.
//!
//! The translating listener replays each change at the same indices. It
//! holds the derived collection weakly: the derived collection owns its
//! upstream subscription, not the other way round.
//!
//! # Failure Modes
//!
//! - **Derived collection disposed**: replayed changes are dropped with a
//!   `mirror.target_disposed` debug event.
//! - **Replay rejected** (for example a handler on the derived collection
//!   writing into the source): logged as `mirror.replay_failed`; the mirror is
//!   out of step from then on.
//! - **Transform panics**: unwinds out of the source mutator that triggered
//!   it.

use std::sync::{Arc, Weak};

use syncol_core::change::CollectionChange;
use syncol_core::error::{CollectionError, Result};
use syncol_core::executor::Executor;

use crate::collection::{CollectionBuilder, Element, Shared, SyncCollection};

type Transform<T, U> = Arc<dyn Fn(&T) -> U + Send + Sync>;

impl<T: Element> SyncCollection<T> {
    /// A derived collection holding the same elements, kept in step with
    /// this one. It inherits this collection's disposer.
    pub fn mirror(&self) -> Result<SyncCollection<T>> {
        let builder = CollectionBuilder::new().shared_disposer(self.disposer().cloned());
        self.mirror_into(builder, T::clone)
    }

    /// Like [`mirror`](Self::mirror), with the derived collection's
    /// mutations marshaled through `executor`.
    pub fn mirror_on(&self, executor: Arc<dyn Executor>) -> Result<SyncCollection<T>> {
        let builder = CollectionBuilder::new()
            .shared_disposer(self.disposer().cloned())
            .executor(executor);
        self.mirror_into(builder, T::clone)
    }

    /// A derived collection holding `f(item)` for every element, kept in
    /// step with this one. `f` must map each element independently.
    ///
    /// The derived collection has no element disposer, even when `U` is
    /// [`Disposable`](syncol_core::listener::Disposable). Pass
    /// `CollectionBuilder::new().disposing()` to
    /// [`mirror_into`](Self::mirror_into) to have derived elements disposed
    /// on teardown.
    pub fn mirror_map<U, F>(&self, f: F) -> Result<SyncCollection<U>>
    where
        U: Element,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        self.mirror_into(CollectionBuilder::new(), f)
    }

    /// Like [`mirror_map`](Self::mirror_map), with the derived collection's
    /// mutations (and so its notifications) running on `executor`. No
    /// element disposer is attached either.
    pub fn mirror_map_on<U, F>(&self, executor: Arc<dyn Executor>, f: F) -> Result<SyncCollection<U>>
    where
        U: Element,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        self.mirror_into(CollectionBuilder::new().executor(executor), f)
    }

    /// Build a mirror from an explicit builder (label, executor, disposer).
    /// The builder must not carry initial items.
    pub fn mirror_into<U, F>(&self, builder: CollectionBuilder<U>, f: F) -> Result<SyncCollection<U>>
    where
        U: Element,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let derived = builder.build()?;
        if !derived.is_empty() {
            return Err(CollectionError::invalid(
                "mirror target must start without elements",
            ));
        }
        let transform: Transform<T, U> = Arc::new(f);

        let span = tracing::debug_span!(
            "mirror.build",
            source = self.id(),
            derived = derived.id(),
            seeded = tracing::field::Empty
        );
        let _span = span.enter();

        let _episode = self.synchronizer().lock();
        if self.is_disposed() {
            return Err(CollectionError::disposed("source collection"));
        }

        let snapshot = self.to_vec();
        for item in &snapshot {
            derived.add(transform(item))?;
        }
        span.record("seeded", snapshot.len());

        let target = derived.downgrade();
        let listener = self.on_collection_changed(move |change| replay(&target, change, &transform));
        derived.synchronizer().listeners().add(listener);
        Ok(derived)
    }
}

fn replay<T: Element, U: Element>(
    target: &Weak<Shared<U>>,
    change: &CollectionChange<T>,
    transform: &Transform<T, U>,
) {
    let Some(derived) = SyncCollection::from_weak(target) else {
        return;
    };
    let outcome = match change {
        CollectionChange::Add { index, item } => derived.insert(*index, transform(item)),
        CollectionChange::Remove { index, .. } => derived.remove_at(*index).map(drop),
        CollectionChange::Replace { index, new, .. } => derived.set(*index, transform(new)),
        CollectionChange::Move {
            old_index,
            new_index,
            ..
        } => derived.move_item(*old_index, *new_index),
        CollectionChange::Reset => derived.clear(),
    };
    match outcome {
        Ok(()) => {}
        Err(err) if err.is_disposed() => {
            tracing::debug!(
                message = "mirror.target_disposed",
                derived = derived.id(),
                kind = ?change.kind()
            );
        }
        Err(err) => {
            tracing::error!(
                message = "mirror.replay_failed",
                derived = derived.id(),
                kind = ?change.kind(),
                error = %err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use syncol_core::executor::ThreadExecutor;
    use syncol_core::listener::Disposable;

    #[test]
    fn mirror_tracks_every_kind_of_change() {
        let source = SyncCollection::from_vec(vec![1, 2, 3]);
        let doubled = source.mirror_map(|v| v * 2).unwrap();
        assert_eq!(doubled.to_vec(), vec![2, 4, 6]);

        source.add(4).unwrap();
        source.insert(0, 0).unwrap();
        source.set(2, 20).unwrap();
        source.remove_at(1).unwrap();
        source.move_item(0, 3).unwrap();
        assert_eq!(doubled.to_vec(), vec![40, 6, 8, 0]);

        source.clear().unwrap();
        assert!(doubled.is_empty());
    }

    #[test]
    fn mapped_mirror_replays_remove_by_value() {
        let source = SyncCollection::from_vec(vec!["a", "bb", "ccc"]);
        let lengths = source.mirror_map(|s: &&str| s.len()).unwrap();
        assert_eq!(lengths.to_vec(), vec![1, 2, 3]);

        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let _listener = lengths.on_collection_changed(move |change| sink.lock().push(change.clone()));

        assert!(source.remove(&"bb").unwrap());
        assert_eq!(lengths.to_vec(), vec![1, 3]);
        assert_eq!(
            *log.lock(),
            vec![CollectionChange::Remove { index: 1, item: 2 }]
        );
    }

    #[test]
    fn mirror_of_mirror_forms_a_chain() {
        let source = SyncCollection::from_vec(vec!["a".to_string()]);
        let lengths = source.mirror_map(|s: &String| s.len()).unwrap();
        let labels = lengths.mirror_map(|n| format!("len={n}")).unwrap();

        source.add("abc".to_string()).unwrap();
        assert_eq!(labels.to_vec(), vec!["len=1", "len=3"]);
    }

    #[test]
    fn mirror_listener_lives_in_derived_registry() {
        let source = SyncCollection::from_vec(vec![1]);
        let mirror = source.mirror().unwrap();
        assert!(source.synchronizer().listeners().is_empty());
        assert_eq!(mirror.synchronizer().listeners().len(), 1);
        assert!(!mirror.synchronizer().same_lock(source.synchronizer()));
    }

    #[test]
    fn disposed_mirror_stops_following() {
        let source = SyncCollection::from_vec(vec![1, 2]);
        let mirror = source.mirror_map(|v| v + 100).unwrap();
        let resets = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&resets);
        let _listener = mirror.on_collection_changed(move |change| {
            if *change == CollectionChange::Reset {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        mirror.dispose().unwrap();
        assert!(mirror.is_empty());
        assert_eq!(resets.load(Ordering::SeqCst), 1);

        source.add(3).unwrap();
        assert!(mirror.is_empty());
        assert_eq!(source.to_vec(), vec![1, 2, 3]);
        assert_eq!(mirror.add(1), Err(CollectionError::disposed("collection")));
    }

    #[derive(Clone)]
    struct Resource {
        id: u32,
        released: Arc<Mutex<Vec<u32>>>,
    }

    impl Disposable for Resource {
        fn dispose(&self) {
            self.released.lock().push(self.id);
        }
    }

    #[test]
    fn identity_mirror_disposes_its_elements_once() {
        let released = Arc::new(Mutex::new(Vec::new()));
        let make = |id| Resource {
            id,
            released: Arc::clone(&released),
        };
        let source = SyncCollection::builder()
            .items(vec![make(1), make(2)])
            .disposing()
            .build()
            .unwrap();
        let mirror = source.mirror().unwrap();
        source.add(make(3)).unwrap();

        mirror.dispose().unwrap();
        mirror.dispose().unwrap();
        assert_eq!(*released.lock(), vec![1, 2, 3]);

        // The source had no upstream listeners: disposing it releases nothing.
        source.dispose().unwrap();
        assert_eq!(released.lock().len(), 3);
        assert_eq!(source.count(), 3);
    }

    #[test]
    fn mapped_mirror_disposes_only_through_a_disposing_builder() {
        let released = Arc::new(Mutex::new(Vec::new()));
        let ids = SyncCollection::from_vec(vec![1_u32, 2]);
        let make = {
            let released = Arc::clone(&released);
            move |id: &u32| Resource {
                id: *id,
                released: Arc::clone(&released),
            }
        };

        let plain = ids.mirror_map(make.clone()).unwrap();
        assert!(!plain.has_disposer());
        plain.dispose().unwrap();
        assert!(released.lock().is_empty());

        let owning = ids
            .mirror_into(CollectionBuilder::<Resource>::new().disposing(), make)
            .unwrap();
        assert!(owning.has_disposer());
        owning.dispose().unwrap();
        assert_eq!(*released.lock(), vec![1, 2]);
    }

    #[test]
    fn mirror_disposed_by_its_own_handler_tears_down_after_the_episode() {
        let source = SyncCollection::from_vec(vec![1, 2]);
        let disposed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&disposed);
        let mirror = source
            .mirror_into(
                CollectionBuilder::new().disposer(move |_: &i32| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
                |v: &i32| *v,
            )
            .unwrap();

        let outcome = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&outcome);
        let handle = mirror.clone();
        let listener = mirror.on_collection_changed(move |change| {
            if matches!(change, CollectionChange::Add { .. }) {
                let result = handle.dispose();
                // Teardown cannot start while this episode is open.
                assert!(handle.synchronizer().has_deferred_teardown());
                *sink.lock() = Some(result);
            }
        });

        source.add(3).unwrap();

        assert_eq!(*outcome.lock(), Some(Ok(())));
        assert!(mirror.is_disposed());
        assert!(!mirror.synchronizer().has_deferred_teardown());
        assert!(mirror.is_empty());
        assert_eq!(disposed.load(Ordering::SeqCst), 3);

        source.add(4).unwrap();
        assert!(mirror.is_empty());
        assert_eq!(source.to_vec(), vec![1, 2, 3, 4]);
        listener.dispose();
    }

    #[test]
    fn mirror_of_disposed_source_is_rejected() {
        let source: SyncCollection<i32> = SyncCollection::new();
        source.dispose().unwrap();
        assert_eq!(
            source.mirror().err(),
            Some(CollectionError::disposed("source collection"))
        );
    }

    #[test]
    fn mirror_target_must_start_empty() {
        let source = SyncCollection::from_vec(vec![1]);
        let err = source
            .mirror_into(CollectionBuilder::new().items(vec![9]), |v: &i32| *v)
            .unwrap_err();
        assert!(matches!(err, CollectionError::InvalidArgument { .. }));
    }

    #[test]
    fn dropped_mirror_unsubscribes() {
        let source = SyncCollection::from_vec(vec![1]);
        let mirror = source.mirror().unwrap();
        drop(mirror);
        source.add(2).unwrap();
        assert_eq!(source.to_vec(), vec![1, 2]);
    }

    #[test]
    fn marshaled_mirror_notifies_on_executor_thread() {
        let executor = Arc::new(
            ThreadExecutor::start(
                syncol_core::config::ExecutorConfig::default().with_thread_name("mirror-ui"),
            )
            .unwrap(),
        );
        let source = SyncCollection::from_vec(vec![1]);
        let mirror = source.mirror_map_on(executor, |v| v * 10).unwrap();
        let threads = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&threads);
        let _listener = mirror.on_collection_changed(move |_| {
            sink.lock()
                .push(std::thread::current().name().map(str::to_owned));
        });

        source.add(2).unwrap();
        assert_eq!(mirror.to_vec(), vec![10, 20]);
        assert_eq!(*threads.lock(), vec![Some("mirror-ui".to_string())]);
    }

    #[test]
    fn mirror_built_inside_source_handler_sees_committed_state() {
        let source = SyncCollection::new();
        let built = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&built);
        let handle = source.clone();
        let _listener = source.on_collection_changed(move |_| {
            let mut slot = sink.lock();
            if slot.is_none() {
                *slot = Some(handle.mirror().unwrap());
            }
        });

        source.add(1).unwrap();
        source.add(2).unwrap();
        let mirror = built.lock().take().unwrap();
        assert_eq!(mirror.to_vec(), vec![1, 2]);
    }
}
