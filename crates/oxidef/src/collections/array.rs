//! Contiguous arrays of opaque values.
//!
//! Every mutation is a single [`Array::splice`]: the values in a range are
//! taken out, the tail moves once to its final position, the replacements
//! are written in, and only then are the removed values released. A value
//! replaced by itself is therefore never released early.
//!
//! Mutable arrays start at [`DEFAULT_CAPACITY`] and grow linearly in chunks
//! of the same size. Immutable arrays are built at exactly their length and
//! never change.

use crate::collections::callbacks::{CallbackSet, Opaque};
use crate::collections::sort;
use crate::error::{Error, Result};
use oxidef_mem::{AllocatorRef, RawBuffer};
use std::cmp::Ordering;
use std::fmt::{self, Write as _};
use std::ops::{Index, Range};
use std::ptr;

/// Initial capacity of a mutable array, and its growth increment.
pub const DEFAULT_CAPACITY: usize = 16;

/// Mutable or fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    /// Fixed contents; capacity equals length.
    Immutable,
    /// Grows in [`DEFAULT_CAPACITY`] chunks.
    Mutable,
}

/// A contiguous sequence of [`Opaque`] values.
///
/// # Example
///
/// ```rust
/// use oxidef::collections::{Array, CallbackSet};
/// use oxidef_mem::default_allocator;
///
/// let mut array = Array::new_mutable(default_allocator(), CallbackSet::null()).unwrap();
/// for i in 0..20usize {
///     array.append(i).unwrap();
/// }
///
/// assert_eq!(array.capacity(), 32);
/// assert_eq!(array.as_slice(), (0..20).collect::<Vec<_>>().as_slice());
/// ```
pub struct Array<T: Opaque> {
    buffer: RawBuffer<T>,
    len: usize,
    capacity: usize,
    kind: ArrayKind,
    callbacks: CallbackSet<T>,
}

fn chunked(len: usize) -> Option<usize> {
    len.max(1)
        .checked_add(DEFAULT_CAPACITY - 1)
        .map(|n| n / DEFAULT_CAPACITY * DEFAULT_CAPACITY)
}

impl<T: Opaque> Array<T> {
    /// Creates an empty mutable array with the default capacity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the allocator refuses.
    pub fn new_mutable(allocator: AllocatorRef, callbacks: CallbackSet<T>) -> Result<Self> {
        Self::with_capacity(allocator, DEFAULT_CAPACITY, callbacks)
    }

    /// Creates an empty mutable array with room for at least `capacity`
    /// values, rounded up to the growth chunk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`] or [`Error::OutOfMemory`].
    pub fn with_capacity(
        allocator: AllocatorRef,
        capacity: usize,
        callbacks: CallbackSet<T>,
    ) -> Result<Self> {
        let capacity = chunked(capacity).ok_or(Error::CapacityOverflow)?;
        Ok(Array {
            buffer: RawBuffer::try_with_capacity_in(capacity, allocator)?,
            len: 0,
            capacity,
            kind: ArrayKind::Mutable,
            callbacks,
        })
    }

    /// Creates an immutable array holding retained copies of `values`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the allocator refuses.
    pub fn from_slice(
        allocator: AllocatorRef,
        values: &[T],
        callbacks: CallbackSet<T>,
    ) -> Result<Self> {
        let mut buffer = RawBuffer::try_with_capacity_in(values.len(), allocator)?;
        let base: *mut T = buffer.as_mut_ptr();
        for (i, value) in values.iter().enumerate() {
            // SAFETY: `i < values.len()` slots were allocated.
            unsafe { base.add(i).write(callbacks.retain(value)) };
        }
        Ok(Array {
            buffer,
            len: values.len(),
            capacity: values.len(),
            kind: ArrayKind::Immutable,
            callbacks,
        })
    }

    /// Number of values.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` if the array holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slots available before the next growth.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Mutable or immutable.
    #[must_use]
    pub fn kind(&self) -> ArrayKind {
        self.kind
    }

    /// `true` for mutable arrays.
    #[must_use]
    pub fn is_mutable(&self) -> bool {
        self.kind == ArrayKind::Mutable
    }

    /// The element policy.
    #[must_use]
    pub fn callbacks(&self) -> &CallbackSet<T> {
        &self.callbacks
    }

    /// The allocator backing the contents.
    #[must_use]
    pub fn allocator(&self) -> &AllocatorRef {
        self.buffer.allocator()
    }

    /// The values as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: the first `len` slots are initialised.
        unsafe { std::slice::from_raw_parts(self.buffer.as_ptr(), self.len) }
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as above, with exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.buffer.as_mut_ptr(), self.len) }
    }

    /// The value at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    /// Iterates in order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    fn assert_mutable(&self) {
        assert!(
            self.kind == ArrayKind::Mutable,
            "attempt to mutate an immutable array"
        );
    }

    fn check_range(&self, range: &Range<usize>) {
        assert!(
            range.start <= range.end && range.end <= self.len,
            "range {:?} out of bounds for array of length {}",
            range,
            self.len
        );
    }

    /// Makes room for `new_len` values, growing in whole chunks.
    fn reserve_for(&mut self, new_len: usize) -> Result<()> {
        if new_len <= self.capacity {
            return Ok(());
        }
        let capacity = chunked(new_len).ok_or(Error::CapacityOverflow)?;
        self.buffer.try_resize(capacity)?;
        oxidef_log::trace!("array grew from {} to {} slots", self.capacity, capacity);
        self.capacity = capacity;
        Ok(())
    }

    /// The mutation primitive. Capacity must already cover the result.
    fn splice_in_place<I>(&mut self, range: Range<usize>, replacements: I)
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        self.assert_mutable();
        self.check_range(&range);
        let mut replacements = replacements.into_iter();
        let inserted = replacements.len();
        let tail = self.len - range.end;
        let new_len = range.start + inserted + tail;
        debug_assert!(new_len <= self.capacity);

        let base = self.buffer.as_mut_ptr();
        let mut removed = Vec::with_capacity(range.len());
        // SAFETY: `range` and the tail are initialised slots inside the
        // buffer, and `new_len` fits the capacity. While the block is being
        // rearranged `len` only covers the untouched prefix, so a panic
        // leaks values instead of double-dropping them.
        unsafe {
            for i in range.clone() {
                removed.push(ptr::read(base.add(i)));
            }
            self.len = range.start;
            ptr::copy(base.add(range.end), base.add(range.start + inserted), tail);
            for i in 0..inserted {
                let Some(value) = replacements.next() else {
                    panic!("splice source yielded {i} of {inserted} values");
                };
                base.add(range.start + i).write(value);
            }
        }
        self.len = new_len;

        for value in removed {
            self.callbacks.release(value);
        }
    }

    /// Replaces the values in `range` with retained copies of
    /// `replacements`, growing if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if growth fails; the array is unchanged.
    ///
    /// # Panics
    ///
    /// Panics on an immutable array or an out-of-bounds range.
    pub fn splice(&mut self, range: Range<usize>, replacements: &[T]) -> Result<()> {
        self.assert_mutable();
        self.check_range(&range);
        self.reserve_for(self.len - range.len() + replacements.len())?;
        let callbacks = self.callbacks.clone();
        self.splice_in_place(range, replacements.iter().map(|v| callbacks.retain(v)));
        Ok(())
    }

    /// Appends `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if growth fails.
    pub fn append(&mut self, value: T) -> Result<()> {
        self.assert_mutable();
        self.reserve_for(self.len + 1)?;
        self.splice_in_place(self.len..self.len, std::iter::once(value));
        Ok(())
    }

    /// Appends retained copies of `values`.
    ///
    /// # Errors
    ///
    /// Returns an error if growth fails.
    pub fn append_slice(&mut self, values: &[T]) -> Result<()> {
        self.splice(self.len..self.len, values)
    }

    /// Appends retained copies of every value of `other`.
    ///
    /// # Errors
    ///
    /// Returns an error if growth fails.
    pub fn append_array(&mut self, other: &Array<T>) -> Result<()> {
        self.splice(self.len..self.len, other.as_slice())
    }

    /// Inserts `value` before `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if growth fails.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&mut self, index: usize, value: T) -> Result<()> {
        self.assert_mutable();
        self.check_range(&(index..index));
        self.reserve_for(self.len + 1)?;
        self.splice_in_place(index..index, std::iter::once(value));
        Ok(())
    }

    /// Replaces the value at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn set(&mut self, index: usize, value: T) {
        self.splice_in_place(index..index + 1, std::iter::once(value));
    }

    /// Removes the value at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn remove(&mut self, index: usize) {
        self.splice_in_place(index..index + 1, std::iter::empty());
    }

    /// Removes every value. The capacity is kept.
    pub fn remove_all(&mut self) {
        self.splice_in_place(0..self.len, std::iter::empty());
    }

    /// Alias of [`Array::splice`].
    ///
    /// # Errors
    ///
    /// Returns an error if growth fails.
    pub fn replace_range(&mut self, range: Range<usize>, replacements: &[T]) -> Result<()> {
        self.splice(range, replacements)
    }

    /// Swaps two values.
    ///
    /// # Panics
    ///
    /// Panics on an immutable array or an index out of bounds.
    pub fn exchange(&mut self, a: usize, b: usize) {
        self.assert_mutable();
        self.as_mut_slice().swap(a, b);
    }

    /// `true` if a value in `range` equals `value`.
    #[must_use]
    pub fn contains(&self, range: Range<usize>, value: &T) -> bool {
        self.first_index_of(range, value).is_some()
    }

    /// First index in `range` holding a value equal to `value`.
    #[must_use]
    pub fn first_index_of(&self, range: Range<usize>, value: &T) -> Option<usize> {
        self.check_range(&range);
        let start = range.start;
        self.as_slice()[range]
            .iter()
            .position(|v| self.callbacks.equal(v, value))
            .map(|i| start + i)
    }

    /// Last index in `range` holding a value equal to `value`.
    #[must_use]
    pub fn last_index_of(&self, range: Range<usize>, value: &T) -> Option<usize> {
        self.check_range(&range);
        let start = range.start;
        self.as_slice()[range]
            .iter()
            .rposition(|v| self.callbacks.equal(v, value))
            .map(|i| start + i)
    }

    /// Number of values in `range` equal to `value`.
    #[must_use]
    pub fn count_of_value(&self, range: Range<usize>, value: &T) -> usize {
        self.check_range(&range);
        self.as_slice()[range]
            .iter()
            .filter(|v| self.callbacks.equal(v, value))
            .count()
    }

    /// Calls `f` on every value in `range`, in order.
    pub fn apply<F>(&self, range: Range<usize>, f: F)
    where
        F: FnMut(&T),
    {
        self.check_range(&range);
        self.as_slice()[range].iter().for_each(f);
    }

    /// Sorts `range` with `cmp`. Not stable.
    ///
    /// # Panics
    ///
    /// Panics on an immutable array or an out-of-bounds range.
    pub fn sort<F>(&mut self, range: Range<usize>, cmp: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.assert_mutable();
        self.check_range(&range);
        sort::quicksort(&mut self.as_mut_slice()[range], cmp);
    }

    /// Leftmost insertion point of `value` in the sorted `range`.
    ///
    /// Among equal values the first one wins; if every value is smaller the
    /// result is `range.end`.
    #[must_use]
    pub fn binary_search<F>(&self, range: Range<usize>, value: &T, mut cmp: F) -> usize
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.check_range(&range);
        let start = range.start;
        start + sort::binary_search_by(&self.as_slice()[range], |e| cmp(e, value))
    }

    /// An immutable copy holding retained values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the allocator refuses.
    pub fn copy(&self) -> Result<Array<T>> {
        Array::from_slice(
            self.allocator().clone(),
            self.as_slice(),
            self.callbacks.clone(),
        )
    }

    /// A mutable copy holding retained values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the allocator refuses.
    pub fn mutable_copy(&self) -> Result<Array<T>> {
        let mut copy =
            Array::with_capacity(self.allocator().clone(), self.len, self.callbacks.clone())?;
        copy.append_slice(self.as_slice())?;
        Ok(copy)
    }

    /// Same length and pairwise equal values.
    #[must_use]
    pub fn array_equal(&self, other: &Array<T>) -> bool {
        self.len == other.len
            && self
                .iter()
                .zip(other.iter())
                .all(|(a, b)| self.callbacks.equal(a, b))
    }

    /// One value per line.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = format!(
            "{{type = {}, count = {}, values = (\n",
            if self.is_mutable() { "mutable" } else { "immutable" },
            self.len
        );
        for (i, value) in self.iter().enumerate() {
            let _ = writeln!(out, "\t{} : {}", i, self.callbacks.describe(value));
        }
        out.push_str(")}");
        out
    }
}

impl<T: Opaque> Drop for Array<T> {
    fn drop(&mut self) {
        let len = self.len;
        self.len = 0;
        let base = self.buffer.as_mut_ptr();
        for i in 0..len {
            // SAFETY: slot `i` was initialised and is read exactly once.
            let value = unsafe { ptr::read(base.add(i)) };
            self.callbacks.release(value);
        }
    }
}

impl<T: Opaque> Index<usize> for Array<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.as_slice()[index]
    }
}

impl<T: Opaque> PartialEq for Array<T> {
    fn eq(&self, other: &Self) -> bool {
        self.array_equal(other)
    }
}

impl<T: Opaque> fmt::Debug for Array<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.iter().map(|v| self.callbacks.describe(v)))
            .finish()
    }
}

impl<'a, T: Opaque> IntoIterator for &'a Array<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
