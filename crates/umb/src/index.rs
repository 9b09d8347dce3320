//! Strongly typed indices for the three index spaces of a transition system.
//!
//! States, choices and branches are all dense `usize` ranges starting at 0.
//! `TypedIndex<T>` tags a raw position with its index space so that a choice
//! index can never be passed where a state index is expected, while compiling
//! down to a plain `usize`.
//!
//! `IndexRange<T>` is the half-open, contiguous group of indices owned by a
//! parent element (the choices of a state, the branches of a choice).
//!
//! ```rust
//! use umb::index::{ChoiceIndex, IndexRange};
//!
//! let range = IndexRange::<umb::index::ChoiceTag>::new(2, 5);
//! assert_eq!(range.len(), 3);
//! assert!(range.contains(ChoiceIndex::new(4)));
//! ```

use std::fmt;
use std::marker::PhantomData;

/// Names an index space for `Debug`/`Display` output.
pub trait IndexTag: Clone {
    /// Human-readable name of the index space.
    const NAME: &'static str;
}

/// A position in the index space described by `T`.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypedIndex<T> {
    index: usize,
    _marker: PhantomData<T>,
}

impl<T> TypedIndex<T> {
    /// Creates a new index from a raw position.
    #[inline(always)]
    pub const fn new(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    /// Returns the raw position.
    #[inline(always)]
    pub const fn get(&self) -> usize {
        self.index
    }
}

impl<T: IndexTag> fmt::Debug for TypedIndex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", T::NAME, self.index)
    }
}

impl<T: IndexTag> fmt::Display for TypedIndex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", T::NAME, self.index)
    }
}

impl<T> From<usize> for TypedIndex<T> {
    fn from(index: usize) -> Self {
        Self::new(index)
    }
}

impl<T> From<TypedIndex<T>> for usize {
    fn from(typed: TypedIndex<T>) -> Self {
        typed.index
    }
}

/// Tag for state indices.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct StateTag;

impl IndexTag for StateTag {
    const NAME: &'static str = "State";
}

/// Tag for choice indices.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ChoiceTag;

impl IndexTag for ChoiceTag {
    const NAME: &'static str = "Choice";
}

/// Tag for branch indices.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BranchTag;

impl IndexTag for BranchTag {
    const NAME: &'static str = "Branch";
}

/// Index of a state.
pub type StateIndex = TypedIndex<StateTag>;

/// Index of a choice.
pub type ChoiceIndex = TypedIndex<ChoiceTag>;

/// Index of a branch.
pub type BranchIndex = TypedIndex<BranchTag>;

/// The choices owned by a state.
pub type ChoiceRange = IndexRange<ChoiceTag>;

/// The branches owned by a choice.
pub type BranchRange = IndexRange<BranchTag>;

/// Half-open range `[start, end)` of indices in the space `T`.
///
/// A range decoded from an archive may be inverted (`start > end`) when the
/// row-start array was not monotone; it then iterates as empty and is
/// reported by model validation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexRange<T> {
    start: usize,
    end: usize,
    _marker: PhantomData<T>,
}

impl<T> IndexRange<T> {
    /// Creates the range `[start, end)`.
    #[inline(always)]
    pub const fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            _marker: PhantomData,
        }
    }

    /// First index of the range.
    #[inline(always)]
    pub const fn start(&self) -> usize {
        self.start
    }

    /// One past the last index of the range.
    #[inline(always)]
    pub const fn end(&self) -> usize {
        self.end
    }

    /// Number of indices in the range.
    #[inline(always)]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Returns true if the range holds no index.
    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Returns true if `start > end`.
    #[inline(always)]
    pub const fn is_inverted(&self) -> bool {
        self.start > self.end
    }

    /// Returns true if `index` lies inside the range.
    #[inline(always)]
    pub fn contains(&self, index: TypedIndex<T>) -> bool {
        self.start <= index.get() && index.get() < self.end
    }

    /// Returns the `offset`-th index of the range, if any.
    #[inline(always)]
    pub fn nth(&self, offset: usize) -> Option<TypedIndex<T>> {
        (offset < self.len()).then(|| TypedIndex::new(self.start + offset))
    }

    /// Iterates the indices of the range in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = TypedIndex<T>> {
        (self.start..self.end).map(TypedIndex::new)
    }
}

impl<T: IndexTag> fmt::Debug for IndexRange<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}..{})", T::NAME, self.start, self.end)
    }
}
