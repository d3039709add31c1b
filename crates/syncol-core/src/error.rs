#![forbid(unsafe_code)]

//! Error taxonomy shared by every syncol collection.
//!
//! All errors surface synchronously to the caller of the operation that
//! detected them. A failed mutation leaves the backing sequence and the lock
//! state exactly as they were before the call.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CollectionError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("{what} has been disposed")]
    Disposed { what: &'static str },

    /// A notification handler tried to open a write episode on the
    /// collection that is currently notifying it, from the notifying thread.
    #[error("re-entrant write episode on the notifying thread")]
    ReentrantWrite,

    #[error("executor stopped before running the marshaled mutation")]
    ExecutorUnavailable,
}

impl CollectionError {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn disposed(what: &'static str) -> Self {
        Self::Disposed { what }
    }

    #[must_use]
    pub const fn out_of_range(index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { index, len }
    }

    /// Whether this error reports an operation on a torn-down object.
    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed { .. })
    }
}

/// Check an index that must address an existing element.
pub fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(CollectionError::out_of_range(index, len))
    }
}

/// Check an insertion point (`index == len` appends).
pub fn check_insert_index(index: usize, len: usize) -> Result<()> {
    if index <= len {
        Ok(())
    } else {
        Err(CollectionError::out_of_range(index, len))
    }
}
