#![forbid(unsafe_code)]

//! Read-only projection of a synchronized collection.
//!
//! A [`ReadOnlyView`] exposes the reads of its source and re-emits both of
//! the source's signals unchanged. It has no mutators.
//!
//! # Disposal
//!
//! Disposing a view releases its two forwarding listeners. If it still had
//! them and the source carries an element disposer, every element currently
//! in the source is handed to that disposer. The source itself is neither
//! cleared nor disposed.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use syncol_core::change::{CollectionChange, PropertyChange};
use syncol_core::error::Result;
use syncol_core::listener::{Listener, ListenerRegistry};
use syncol_core::signal::Signal;

use crate::collection::{Element, SyncCollection};

struct ViewInner<T> {
    source: SyncCollection<T>,
    listeners: ListenerRegistry,
    collection_changed: Signal<CollectionChange<T>>,
    property_changed: Signal<PropertyChange>,
    disposed: AtomicBool,
}

/// Read-only, change-forwarding wrapper around a [`SyncCollection`].
///
/// Cloning a view creates a new handle to the same view.
pub struct ReadOnlyView<T> {
    inner: Arc<ViewInner<T>>,
}

impl<T> Clone for ReadOnlyView<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Element> ReadOnlyView<T> {
    /// Wrap `source`. Subscription happens under the source's episode lock,
    /// so no change is emitted half-way through it.
    #[must_use]
    pub fn new(source: &SyncCollection<T>) -> Self {
        let collection_changed: Signal<CollectionChange<T>> = Signal::new();
        let property_changed: Signal<PropertyChange> = Signal::new();
        let listeners = ListenerRegistry::new();

        {
            let _episode = source.synchronizer().lock();
            let forward = collection_changed.clone();
            listeners.add(source.on_collection_changed(move |change| forward.emit(change)));
            let forward = property_changed.clone();
            listeners.add(source.on_property_changed(move |name| forward.emit(name)));
        }

        Self {
            inner: Arc::new(ViewInner {
                source: source.clone(),
                listeners,
                collection_changed,
                property_changed,
                disposed: AtomicBool::new(false),
            }),
        }
    }

    #[must_use]
    pub fn source(&self) -> &SyncCollection<T> {
        &self.inner.source
    }

    /// Forwarding listeners held by this view.
    #[must_use]
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.inner.listeners
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.source.count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.source.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<T> {
        self.inner.source.get(index)
    }

    #[must_use]
    pub fn index_of(&self, item: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.inner.source.index_of(item)
    }

    #[must_use]
    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.inner.source.contains(item)
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.source.to_vec()
    }

    pub fn iter(&self) -> std::vec::IntoIter<T> {
        self.inner.source.iter()
    }

    pub fn copy_to(&self, dest: &mut [T], offset: usize) -> Result<()> {
        self.inner.source.copy_to(dest, offset)
    }

    pub fn on_collection_changed(
        &self,
        handler: impl Fn(&CollectionChange<T>) + Send + Sync + 'static,
    ) -> Listener {
        self.inner.collection_changed.subscribe(handler)
    }

    pub fn on_property_changed(
        &self,
        handler: impl Fn(&PropertyChange) + Send + Sync + 'static,
    ) -> Listener {
        self.inner.property_changed.subscribe(handler)
    }

    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let released = self.inner.listeners.dispose();
        if released == 0 {
            return;
        }
        let Some(disposer) = self.inner.source.disposer() else {
            return;
        };
        let elements = self.inner.source.to_vec();
        tracing::debug!(
            message = "view.dispose",
            source = self.inner.source.id(),
            elements = elements.len()
        );
        for item in &elements {
            disposer(item);
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl<'a, T: Element> IntoIterator for &'a ReadOnlyView<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Element + fmt::Debug> fmt::Debug for ReadOnlyView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOnlyView")
            .field("source", &self.inner.source)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl<T: Element> SyncCollection<T> {
    /// A read-only view forwarding this collection's notifications.
    #[must_use]
    pub fn read_only(&self) -> ReadOnlyView<T> {
        ReadOnlyView::new(self)
    }
}
