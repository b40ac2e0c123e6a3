use crate::error::{Result, ShellError};
use std::ops::{Deref, Range};

/// Capacity a [`Sequence`] starts with unless told otherwise.
pub const DEFAULT_CAPACITY: usize = 16;

/// Growable list backing token and argument vectors.
///
/// Unlike a bare `Vec`, growth is explicit and fallible: the logical capacity
/// starts at the configured value and doubles whenever an append would
/// overflow it, and a failed allocation is reported as
/// [`ShellError::AllocationFailure`] instead of aborting the process. A failed
/// append leaves the sequence exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T> Sequence<T> {
    /// Empty sequence with [`DEFAULT_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Empty sequence with the given initial capacity (at least one).
    ///
    /// Storage is reserved lazily on the first append, so construction itself
    /// never allocates.
    pub fn with_capacity(initial: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity: initial.max(1),
        }
    }

    /// Append `item`, doubling the capacity if the sequence is full.
    pub fn push(&mut self, item: T) -> Result<()> {
        if self.items.len() == self.capacity {
            let doubled = self
                .capacity
                .checked_mul(2)
                .ok_or(ShellError::AllocationFailure {
                    requested: usize::MAX,
                })?;
            self.reserve_exactly(doubled)?;
            self.capacity = doubled;
        } else if self.items.capacity() < self.capacity {
            self.reserve_exactly(self.capacity)?;
        }
        self.items.push(item);
        Ok(())
    }

    fn reserve_exactly(&mut self, target: usize) -> Result<()> {
        self.items
            .try_reserve_exact(target - self.items.len())
            .map_err(|_| ShellError::AllocationFailure { requested: target })
    }

    /// Logical capacity; always a power-of-two multiple of the initial one.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove the elements in `range`, shifting later elements left.
    ///
    /// Capacity is left untouched.
    pub fn remove_range(&mut self, range: Range<usize>) {
        self.items.drain(range);
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }
}

impl<T> Default for Sequence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for Sequence<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> IntoIterator for Sequence<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Sequence<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
