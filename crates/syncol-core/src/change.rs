#![forbid(unsafe_code)]

//! Change notifications describing one applied mutation.
//!
//! A [`CollectionChange`] is an immutable value: once emitted it is shared by
//! reference with every subscriber and never modified.
//!
//! # Invariants
//!
//! 1. Replaying every change emitted by a collection, in emission order,
//!    against an empty `Vec` with [`CollectionChange::apply_to`] reproduces
//!    that collection's contents.
//! 2. `Move { old_index, new_index }` means "remove at `old_index`, then
//!    insert at `new_index`" (the insert index is relative to the shortened
//!    sequence).

use std::fmt;

use crate::error::{Result, check_index, check_insert_index};

/// Discriminant of a [`CollectionChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Add,
    Remove,
    Replace,
    Move,
    Reset,
}

/// One mutation applied to a synchronized collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionChange<T> {
    /// `item` was inserted at `index`.
    Add { index: usize, item: T },
    /// `item` was removed from `index`.
    Remove { index: usize, item: T },
    /// The element at `index` changed from `old` to `new`.
    Replace { index: usize, old: T, new: T },
    /// `item` moved from `old_index` to `new_index`.
    Move {
        old_index: usize,
        new_index: usize,
        item: T,
    },
    /// The collection was cleared.
    Reset,
}

impl<T> CollectionChange<T> {
    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::Add { .. } => ChangeKind::Add,
            Self::Remove { .. } => ChangeKind::Remove,
            Self::Replace { .. } => ChangeKind::Replace,
            Self::Move { .. } => ChangeKind::Move,
            Self::Reset => ChangeKind::Reset,
        }
    }

    /// The item entering the collection (Add, Replace, Move).
    #[must_use]
    pub fn new_item(&self) -> Option<&T> {
        match self {
            Self::Add { item, .. } | Self::Move { item, .. } => Some(item),
            Self::Replace { new, .. } => Some(new),
            Self::Remove { .. } | Self::Reset => None,
        }
    }

    /// The item leaving the collection (Remove, Replace, Move).
    #[must_use]
    pub fn old_item(&self) -> Option<&T> {
        match self {
            Self::Remove { item, .. } | Self::Move { item, .. } => Some(item),
            Self::Replace { old, .. } => Some(old),
            Self::Add { .. } | Self::Reset => None,
        }
    }

    /// Whether this change alters the element count.
    #[must_use]
    pub const fn changes_count(&self) -> bool {
        matches!(self, Self::Add { .. } | Self::Remove { .. } | Self::Reset)
    }

    /// Translate the payload, keeping kind and indices.
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> CollectionChange<U> {
        match self {
            Self::Add { index, item } => CollectionChange::Add {
                index: *index,
                item: f(item),
            },
            Self::Remove { index, item } => CollectionChange::Remove {
                index: *index,
                item: f(item),
            },
            Self::Replace { index, old, new } => CollectionChange::Replace {
                index: *index,
                old: f(old),
                new: f(new),
            },
            Self::Move {
                old_index,
                new_index,
                item,
            } => CollectionChange::Move {
                old_index: *old_index,
                new_index: *new_index,
                item: f(item),
            },
            Self::Reset => CollectionChange::Reset,
        }
    }
}

impl<T: Clone> CollectionChange<T> {
    /// Replay this change against a plain sequence.
    ///
    /// Indices are validated before anything is touched, so a failed replay
    /// leaves `items` unchanged.
    pub fn apply_to(&self, items: &mut Vec<T>) -> Result<()> {
        match self {
            Self::Add { index, item } => {
                check_insert_index(*index, items.len())?;
                items.insert(*index, item.clone());
            }
            Self::Remove { index, .. } => {
                check_index(*index, items.len())?;
                items.remove(*index);
            }
            Self::Replace { index, new, .. } => {
                check_index(*index, items.len())?;
                items[*index] = new.clone();
            }
            Self::Move {
                old_index,
                new_index,
                ..
            } => {
                check_index(*old_index, items.len())?;
                check_index(*new_index, items.len())?;
                let moved = items.remove(*old_index);
                items.insert(*new_index, moved);
            }
            Self::Reset => items.clear(),
        }
        Ok(())
    }
}

/// Name of a collection property that changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyChange {
    /// The element count.
    Count,
    /// The item indexer.
    Items,
}

impl PropertyChange {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Count => "Count",
            Self::Items => "Item[]",
        }
    }
}

impl fmt::Display for PropertyChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
