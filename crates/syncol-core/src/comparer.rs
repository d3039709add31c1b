#![forbid(unsafe_code)]

//! Ordering interface for sort and search utilities built on collections.

use std::cmp::Ordering;
use std::fmt;

pub trait Comparer<T: ?Sized> {
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

/// Adapts a comparison function to [`Comparer`].
#[derive(Clone, Copy)]
pub struct FnComparer<F> {
    compare: F,
}

impl<F> FnComparer<F> {
    #[must_use]
    pub const fn new(compare: F) -> Self {
        Self { compare }
    }
}

impl<T: ?Sized, F> Comparer<T> for FnComparer<F>
where
    F: Fn(&T, &T) -> Ordering,
{
    fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.compare)(a, b)
    }
}

impl<F> fmt::Debug for FnComparer<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnComparer").finish_non_exhaustive()
    }
}

/// Compares with the type's own [`Ord`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalOrder;

impl<T: Ord + ?Sized> Comparer<T> for NaturalOrder {
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}
