#![forbid(unsafe_code)]

//! Thread-safe, change-notifying ordered collection.
//!
//! # Design
//!
//! [`SyncCollection<T>`] is a cheap handle (`Arc` inside) to shared state:
//! the element `Vec<T>` behind a [`parking_lot::RwLock`], the collection's
//! [`Synchronizer`], and two signals (collection changed, property changed).
//!
//! Reads take the read lock recursively, so a thread that already holds it
//! (for instance a handler running inside a notification) never blocks.
//!
//! Every mutator runs as one write episode:
//!
//! 1. enter the synchronizer's episode lock ([`EpisodeLock::begin_write`]);
//! 2. take the upgradable read lock and read the pre-state (old value, index);
//! 3. upgrade to the write lock and mutate;
//! 4. downgrade to a read lock and emit `Count`/`Items` property changes and
//!    the [`CollectionChange`];
//! 5. release everything in reverse order.
//!
//! Steps 2-4 run through the collection's executor when it has one; the
//! calling thread keeps the episode lock while it waits.
//!
//! # Invariants
//!
//! 1. Each successful mutation emits exactly one collection change, except
//!    `clear()` on an empty collection (store cleared, nothing emitted) and
//!    `remove()` of an absent item (nothing changes).
//! 2. A failed mutation leaves the elements untouched and emits nothing.
//! 3. Notifications of one collection are emitted in mutation order.
//!
//! # Failure Modes
//!
//! - **Handler panics**: unwinds out of the mutator after the data change
//!   has been committed; every lock is released on the way out.
//! - **Handler writes to the notifying collection**: rejected with
//!   [`CollectionError::ReentrantWrite`].
//! - **Marshaled collection, handler writes to it from the executor thread**:
//!   blocks forever, since the calling thread holds the episode lock while it
//!   waits for the executor. Not detected. The same holds for `dispose()`.
//! - **Handler disposes the collection notifying it**: the teardown is parked
//!   and runs when the current write episode ends.
//! - **Executor stopped before teardown**: the store is emptied on the
//!   disposing thread without a `Reset`, the elements are still disposed, and
//!   `dispose()` returns [`CollectionError::ExecutorUnavailable`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{RwLock, RwLockUpgradableReadGuard, RwLockWriteGuard};
use syncol_core::change::{CollectionChange, PropertyChange};
use syncol_core::comparer::Comparer;
use syncol_core::config::CollectionConfig;
use syncol_core::error::{CollectionError, Result, check_index, check_insert_index};
use syncol_core::executor::{Executor, run_on};
use syncol_core::listener::{Disposable, Listener};
use syncol_core::signal::Signal;

use crate::synchronizer::{Synchronizer, Teardown};

/// Bounds every element type of a synchronized collection satisfies.
pub trait Element: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Element for T {}

pub(crate) type Disposer<T> = Arc<dyn Fn(&T) + Send + Sync>;

static NEXT_COLLECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_collection_id() -> u64 {
    NEXT_COLLECTION_ID.fetch_add(1, Ordering::Relaxed)
}

enum Dispatch {
    Direct,
    Marshaled(Arc<dyn Executor>),
}

pub(crate) struct Shared<T> {
    id: u64,
    items: RwLock<Vec<T>>,
    synchronizer: Synchronizer,
    collection_changed: Signal<CollectionChange<T>>,
    property_changed: Signal<PropertyChange>,
    dispatch: Dispatch,
    disposer: Option<Disposer<T>>,
    config: CollectionConfig,
}

impl<T: Element> Shared<T> {
    /// Run the data half of an episode, marshaled if this collection has an
    /// executor.
    fn dispatch<R, F>(self: &Arc<Self>, op: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&Shared<T>) -> Result<R> + Send + 'static,
    {
        match &self.dispatch {
            Dispatch::Direct => op(self.as_ref()),
            Dispatch::Marshaled(executor) => {
                let shared = Arc::clone(self);
                run_on(executor.as_ref(), move || op(&shared))?
            }
        }
    }

    fn notify(&self, change: CollectionChange<T>) {
        if self.config.trace_changes {
            tracing::trace!(
                message = "collection.change",
                collection = self.id,
                label = self.config.label.as_deref(),
                kind = ?change.kind()
            );
        }
        if change.changes_count() {
            self.property_changed.emit(&PropertyChange::Count);
        }
        self.property_changed.emit(&PropertyChange::Items);
        self.collection_changed.emit(&change);
    }

    fn insert_item(&self, index: Option<usize>, item: T) -> Result<()> {
        let items = self.items.upgradable_read();
        let index = index.unwrap_or(items.len());
        check_insert_index(index, items.len())?;

        let mut items = RwLockUpgradableReadGuard::upgrade(items);
        items.insert(index, item.clone());
        let items = RwLockWriteGuard::downgrade(items);

        self.notify(CollectionChange::Add { index, item });
        drop(items);
        Ok(())
    }

    fn set_item(&self, index: usize, value: T) -> Result<()> {
        let items = self.items.upgradable_read();
        check_index(index, items.len())?;

        let mut items = RwLockUpgradableReadGuard::upgrade(items);
        let old = std::mem::replace(&mut items[index], value.clone());
        let items = RwLockWriteGuard::downgrade(items);

        self.notify(CollectionChange::Replace {
            index,
            old,
            new: value,
        });
        drop(items);
        Ok(())
    }

    fn remove_item_at(&self, index: usize) -> Result<T> {
        self.remove_at_locked(self.items.upgradable_read(), index)
    }

    fn remove_item(&self, item: &T) -> Result<bool>
    where
        T: PartialEq,
    {
        let items = self.items.upgradable_read();
        let Some(index) = items.iter().position(|candidate| candidate == item) else {
            return Ok(false);
        };
        self.remove_at_locked(items, index)?;
        Ok(true)
    }

    fn remove_at_locked(
        &self,
        items: RwLockUpgradableReadGuard<'_, Vec<T>>,
        index: usize,
    ) -> Result<T> {
        check_index(index, items.len())?;
        let mut items = RwLockUpgradableReadGuard::upgrade(items);
        let removed = items.remove(index);
        let items = RwLockWriteGuard::downgrade(items);

        self.notify(CollectionChange::Remove {
            index,
            item: removed.clone(),
        });
        drop(items);
        Ok(removed)
    }

    fn move_item(&self, old_index: usize, new_index: usize) -> Result<()> {
        let items = self.items.upgradable_read();
        check_index(old_index, items.len())?;
        check_index(new_index, items.len())?;

        let mut items = RwLockUpgradableReadGuard::upgrade(items);
        let moved = items.remove(old_index);
        items.insert(new_index, moved.clone());
        let items = RwLockWriteGuard::downgrade(items);

        self.notify(CollectionChange::Move {
            old_index,
            new_index,
            item: moved,
        });
        drop(items);
        Ok(())
    }

    /// Empty the store without notifying anyone.
    fn take_items(&self) -> Vec<T> {
        std::mem::take(&mut *self.items.write())
    }

    /// Empty the store unconditionally; notify only if it held anything.
    fn clear_items(&self) -> Result<Vec<T>> {
        let items = self.items.upgradable_read();
        let was_empty = items.is_empty();

        let mut items = RwLockUpgradableReadGuard::upgrade(items);
        let removed = std::mem::take(&mut *items);
        let items = RwLockWriteGuard::downgrade(items);

        if !was_empty {
            self.notify(CollectionChange::Reset);
        }
        drop(items);
        Ok(removed)
    }
}

impl<T: Element> Teardown for Shared<T> {
    fn teardown(self: Arc<Self>, listeners: usize) -> Result<()> {
        let (removed, outcome) = {
            let _episode = match self.synchronizer.episode_lock().begin_write() {
                Ok(episode) => episode,
                Err(CollectionError::ReentrantWrite) => {
                    tracing::debug!(
                        message = "collection.teardown_deferred",
                        collection = self.id,
                        listeners
                    );
                    self.synchronizer.defer_teardown(listeners);
                    return Ok(());
                }
                Err(err) => return Err(err),
            };
            match self.dispatch(|shared| shared.clear_items()) {
                Ok(removed) => (removed, Ok(())),
                Err(err) => {
                    tracing::warn!(
                        message = "collection.teardown_unmarshaled",
                        collection = self.id,
                        error = %err
                    );
                    (self.take_items(), Err(err))
                }
            }
        };

        tracing::debug!(
            message = "collection.dispose",
            collection = self.id,
            label = self.config.label.as_deref(),
            listeners,
            elements = removed.len(),
            disposing = self.disposer.is_some()
        );
        if let Some(disposer) = &self.disposer {
            for item in &removed {
                disposer(item);
            }
        }
        outcome
    }
}

/// A thread-safe, observable, ordered collection.
///
/// Cloning a `SyncCollection` creates a new handle to the **same**
/// collection.
pub struct SyncCollection<T> {
    pub(crate) shared: Arc<Shared<T>>,
}

impl<T> Clone for SyncCollection<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Element> Default for SyncCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> FromIterator<T> for SyncCollection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<T: Element> From<Vec<T>> for SyncCollection<T> {
    fn from(items: Vec<T>) -> Self {
        Self::from_vec(items)
    }
}

impl<T: Element + fmt::Debug> fmt::Debug for SyncCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncCollection")
            .field("id", &self.shared.id)
            .field("label", &self.shared.config.label)
            .field("items", &*self.shared.items.read_recursive())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl<T: Element> SyncCollection<T> {
    // ── Constructors ─────────────────────────────────────────────────

    /// An empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// A collection holding `items`, in order.
    #[must_use]
    pub fn from_vec(items: Vec<T>) -> Self {
        CollectionBuilder::new().items(items).assemble()
    }

    #[must_use]
    pub fn builder() -> CollectionBuilder<T> {
        CollectionBuilder::new()
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Process-unique identifier, used in log events.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.shared.config.label.as_deref()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.shared.items.read_recursive().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn get(&self, index: usize) -> Result<T> {
        let items = self.shared.items.read_recursive();
        items
            .get(index)
            .cloned()
            .ok_or_else(|| CollectionError::out_of_range(index, items.len()))
    }

    #[must_use]
    pub fn index_of(&self, item: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.shared
            .items
            .read_recursive()
            .iter()
            .position(|candidate| candidate == item)
    }

    #[must_use]
    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.shared.items.read_recursive().contains(item)
    }

    /// A copy of the current elements.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.shared.items.read_recursive().clone()
    }

    /// Iterate over a snapshot taken now; later mutations are not observed.
    pub fn iter(&self) -> std::vec::IntoIter<T> {
        self.to_vec().into_iter()
    }

    /// Copy a snapshot into `dest` starting at `offset`.
    pub fn copy_to(&self, dest: &mut [T], offset: usize) -> Result<()> {
        let items = self.shared.items.read_recursive();
        let end = offset
            .checked_add(items.len())
            .filter(|end| *end <= dest.len())
            .ok_or_else(|| CollectionError::out_of_range(offset, dest.len()))?;
        dest[offset..end].clone_from_slice(&items);
        Ok(())
    }

    /// A snapshot ordered by `comparer`.
    #[must_use]
    pub fn sorted_snapshot(&self, comparer: &impl Comparer<T>) -> Vec<T> {
        let mut items = self.to_vec();
        items.sort_by(|a, b| comparer.compare(a, b));
        items
    }

    /// Binary search assuming the elements are ordered by `comparer`.
    pub fn binary_search_by_comparer(
        &self,
        item: &T,
        comparer: &impl Comparer<T>,
    ) -> std::result::Result<usize, usize> {
        self.shared
            .items
            .read_recursive()
            .binary_search_by(|probe| comparer.compare(probe, item))
    }

    /// Always true: every operation is synchronized.
    #[must_use]
    pub const fn is_synchronized(&self) -> bool {
        true
    }

    #[must_use]
    pub fn synchronizer(&self) -> &Synchronizer {
        &self.shared.synchronizer
    }

    /// The executor mutations are marshaled through, if any.
    #[must_use]
    pub fn executor(&self) -> Option<&Arc<dyn Executor>> {
        match &self.shared.dispatch {
            Dispatch::Direct => None,
            Dispatch::Marshaled(executor) => Some(executor),
        }
    }

    #[must_use]
    pub fn has_disposer(&self) -> bool {
        self.shared.disposer.is_some()
    }

    // ── Signals ──────────────────────────────────────────────────────

    /// Subscribe to collection changes. Handlers run in registration order
    /// on the thread that applied the mutation (the executor's thread for
    /// marshaled collections).
    pub fn on_collection_changed(
        &self,
        handler: impl Fn(&CollectionChange<T>) + Send + Sync + 'static,
    ) -> Listener {
        self.shared.collection_changed.subscribe(handler)
    }

    /// Subscribe to `Count` / `Items` property changes.
    pub fn on_property_changed(
        &self,
        handler: impl Fn(&PropertyChange) + Send + Sync + 'static,
    ) -> Listener {
        self.shared.property_changed.subscribe(handler)
    }

    // ── Mutators ─────────────────────────────────────────────────────

    fn write<R, F>(&self, op: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&Shared<T>) -> Result<R> + Send + 'static,
    {
        let outcome = {
            let _episode = self.shared.synchronizer.episode_lock().begin_write()?;
            if self.shared.synchronizer.is_disposed() {
                return Err(CollectionError::disposed("collection"));
            }
            self.shared.dispatch(op)
        };
        // A handler may have disposed this collection during the episode.
        if let Err(err) = self.shared.synchronizer.run_deferred_teardown() {
            tracing::warn!(
                message = "collection.deferred_teardown_failed",
                collection = self.shared.id,
                error = %err
            );
        }
        outcome
    }

    pub fn set(&self, index: usize, value: T) -> Result<()> {
        self.write(move |shared| shared.set_item(index, value))
    }

    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        self.write(move |shared| shared.insert_item(Some(index), item))
    }

    /// Append `item`.
    pub fn add(&self, item: T) -> Result<()> {
        self.write(move |shared| shared.insert_item(None, item))
    }

    /// Remove and return the element at `index`.
    pub fn remove_at(&self, index: usize) -> Result<T> {
        self.write(move |shared| shared.remove_item_at(index))
    }

    /// Remove the first element equal to `item`. Returns whether one was
    /// found.
    pub fn remove(&self, item: &T) -> Result<bool>
    where
        T: PartialEq,
    {
        let item = item.clone();
        self.write(move |shared| shared.remove_item(&item))
    }

    /// Move the element at `old_index` so that it ends up at `new_index`.
    pub fn move_item(&self, old_index: usize, new_index: usize) -> Result<()> {
        self.write(move |shared| shared.move_item(old_index, new_index))
    }

    pub fn clear(&self) -> Result<()> {
        self.write(|shared| shared.clear_items().map(drop))
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Tear the collection down. Upstream listeners are released; if there
    /// were any, the elements are cleared and handed to the disposer.
    /// Idempotent.
    ///
    /// Called from a handler while this collection is notifying, the
    /// teardown runs once the current write episode ends.
    ///
    /// # Errors
    ///
    /// [`CollectionError::ExecutorUnavailable`] when the clear could not be
    /// marshaled. The collection is torn down regardless: the store is
    /// emptied without a `Reset` and every element is disposed.
    pub fn dispose(&self) -> Result<()> {
        self.shared.synchronizer.dispose()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared.synchronizer.is_disposed()
    }

    pub(crate) fn downgrade(&self) -> Weak<Shared<T>> {
        Arc::downgrade(&self.shared)
    }

    pub(crate) fn from_weak(shared: &Weak<Shared<T>>) -> Option<Self> {
        shared.upgrade().map(|shared| Self { shared })
    }

    pub(crate) fn disposer(&self) -> Option<&Disposer<T>> {
        self.shared.disposer.as_ref()
    }
}

impl<'a, T: Element> IntoIterator for &'a SyncCollection<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Builder for [`SyncCollection`].
pub struct CollectionBuilder<T> {
    items: Vec<T>,
    config: CollectionConfig,
    executor: Option<Arc<dyn Executor>>,
    disposer: Option<Disposer<T>>,
}

impl<T: Element> Default for CollectionBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> CollectionBuilder<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            config: CollectionConfig::default(),
            executor: None,
            disposer: None,
        }
    }

    /// Initial elements, in order.
    #[must_use]
    pub fn items(mut self, items: impl IntoIterator<Item = T>) -> Self {
        self.items = items.into_iter().collect();
        self
    }

    #[must_use]
    pub fn config(mut self, config: CollectionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.config.label = Some(label.into());
        self
    }

    /// Marshal the data half of every write episode through `executor`.
    #[must_use]
    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Called once per element still present when the collection is torn
    /// down after having held upstream listeners.
    #[must_use]
    pub fn disposer(mut self, disposer: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.disposer = Some(Arc::new(disposer));
        self
    }

    pub(crate) fn shared_disposer(mut self, disposer: Option<Disposer<T>>) -> Self {
        self.disposer = disposer;
        self
    }

    pub fn build(self) -> Result<SyncCollection<T>> {
        self.config.validate()?;
        Ok(self.assemble())
    }

    fn assemble(self) -> SyncCollection<T> {
        let dispatch = match self.executor {
            Some(executor) => Dispatch::Marshaled(executor),
            None => Dispatch::Direct,
        };
        let shared = Arc::new_cyclic(|this: &Weak<Shared<T>>| {
            let owner: Weak<dyn Teardown> = this.clone();
            Shared {
                id: next_collection_id(),
                items: RwLock::new(self.items),
                synchronizer: Synchronizer::new(owner),
                collection_changed: Signal::new(),
                property_changed: Signal::new(),
                dispatch,
                disposer: self.disposer,
                config: self.config,
            }
        });
        SyncCollection { shared }
    }
}

impl<T: Element + Disposable> CollectionBuilder<T> {
    /// Use [`Disposable::dispose`] as the element disposer.
    #[must_use]
    pub fn disposing(self) -> Self {
        self.disposer(|item: &T| item.dispose())
    }
}
