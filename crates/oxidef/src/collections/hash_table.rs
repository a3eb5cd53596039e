//! Open-addressing hash table with double hashing.
//!
//! The engine behind [`Dictionary`](super::Dictionary), [`Set`](super::Set)
//! and [`Bag`](super::Bag). Each bucket holds a key, a value and an
//! occurrence count; unique tables keep the count at 1, counted tables
//! (multisets) add and remove occurrences.
//!
//! # Probing
//!
//! The first probe is `hash % capacity`. On collision the step is derived
//! from an independent second hash,
//! `(hash + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15) % capacity`, bumped to 1
//! if it comes out as zero. Capacities are prime, so every step visits every
//! bucket before repeating.
//!
//! Removed buckets become tombstones so the probe chains running through
//! them stay intact. Tombstones count toward the growth threshold and are
//! cleared by every rehash.
//!
//! # Resizing
//!
//! - Before an insertion, if `occupied + tombstones + 1` would exceed 80% of
//!   the capacity, the table is rebuilt at the smallest prime that admits
//!   `count + 1` entries (never smaller than the current capacity).
//! - Before a removal, if fewer than 25% of the buckets are occupied, the
//!   table is rebuilt at the smallest prime that admits the current count.
//!
//! # Example
//!
//! ```rust
//! use oxidef::collections::{CallbackSet, HashTable, Multiplicity};
//! use oxidef_mem::default_allocator;
//!
//! let mut table = HashTable::new(
//!     default_allocator(),
//!     Multiplicity::Unique,
//!     CallbackSet::values(),
//!     CallbackSet::null(),
//! )
//! .unwrap();
//!
//! table.set("a", 10usize).unwrap();
//! table.set("a", 20).unwrap();
//!
//! assert_eq!(table.get(&"a"), Some(&20));
//! assert_eq!(table.count(), 1);
//! ```

use crate::collections::callbacks::{CallbackSet, Opaque};
use crate::collections::primes::{capacity_for, threshold};
use crate::error::{Error, Result};
use oxidef_mem::{AllocatorRef, RawBuffer};
use std::fmt::{self, Write as _};
use std::mem;

/// Knuth's multiplicative constant (2^64 / golden ratio, odd).
const SECOND_HASH_MULTIPLIER: u64 = 0x9E37_79B9_7F4A_7C15;

/// Whether a key may be present more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    /// Dictionary and set semantics: occurrences stay at 1.
    Unique,
    /// Multiset semantics: `add` on a present key adds an occurrence.
    Counted,
}

/// Result of [`HashTable::find_bucket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// The key is stored in this bucket.
    Found(usize),
    /// The key is absent; this is where it would be inserted.
    Vacant(usize),
}

struct Entry<K, V> {
    key: K,
    value: V,
    occurrences: usize,
}

enum Slot<K, V> {
    Empty,
    Deleted,
    Occupied(Entry<K, V>),
}

/// Open-addressing table over [`Opaque`] keys and values.
pub struct HashTable<K: Opaque, V: Opaque> {
    /// Every slot is always initialised.
    buckets: RawBuffer<Slot<K, V>>,
    count: usize,
    deleted: usize,
    multiplicity: Multiplicity,
    keys: CallbackSet<K>,
    values: CallbackSet<V>,
}

fn allocate_buckets<K, V>(
    capacity: usize,
    allocator: AllocatorRef,
) -> Result<RawBuffer<Slot<K, V>>> {
    let mut buckets = RawBuffer::try_with_capacity_in(capacity, allocator)?;
    let base: *mut Slot<K, V> = buckets.as_mut_ptr();
    for i in 0..capacity {
        // SAFETY: `i < capacity` slots were just allocated.
        unsafe { base.add(i).write(Slot::Empty) };
    }
    Ok(buckets)
}

impl<K: Opaque, V: Opaque> HashTable<K, V> {
    /// Creates an empty table at the smallest capacity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the allocator refuses the buckets.
    pub fn new(
        allocator: AllocatorRef,
        multiplicity: Multiplicity,
        keys: CallbackSet<K>,
        values: CallbackSet<V>,
    ) -> Result<Self> {
        Self::with_capacity(allocator, multiplicity, 0, keys, values)
    }

    /// Creates an empty table sized so `count` entries fit without growing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`] if `count` is beyond the prime
    /// table, or [`Error::OutOfMemory`].
    pub fn with_capacity(
        allocator: AllocatorRef,
        multiplicity: Multiplicity,
        count: usize,
        keys: CallbackSet<K>,
        values: CallbackSet<V>,
    ) -> Result<Self> {
        let capacity = capacity_for(count).ok_or(Error::CapacityOverflow)?;
        Ok(HashTable {
            buckets: allocate_buckets(capacity, allocator)?,
            count: 0,
            deleted: 0,
            multiplicity,
            keys,
            values,
        })
    }

    /// Creates a table holding `pairs`, added in order.
    ///
    /// # Errors
    ///
    /// Same as [`HashTable::with_capacity`].
    pub fn with_values<I>(
        allocator: AllocatorRef,
        multiplicity: Multiplicity,
        pairs: I,
        keys: CallbackSet<K>,
        values: CallbackSet<V>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let pairs: Vec<(K, V)> = pairs.into_iter().collect();
        let mut table = Self::with_capacity(allocator, multiplicity, pairs.len(), keys, values)?;
        for (key, value) in pairs {
            table.add(key, value)?;
        }
        Ok(table)
    }

    /// Number of occupied buckets (distinct keys).
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// `true` if no key is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Sum of every bucket's occurrence count.
    #[must_use]
    pub fn total_occurrences(&self) -> usize {
        self.entries().map(|e| e.occurrences).sum()
    }

    /// Number of buckets; always one of [`PRIMES`](super::primes::PRIMES).
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buckets.capacity()
    }

    /// Unique or counted.
    #[must_use]
    pub fn multiplicity(&self) -> Multiplicity {
        self.multiplicity
    }

    /// The allocator every bucket array comes from.
    #[must_use]
    pub fn allocator(&self) -> &AllocatorRef {
        self.buckets.allocator()
    }

    /// Key policy.
    #[must_use]
    pub fn key_callbacks(&self) -> &CallbackSet<K> {
        &self.keys
    }

    /// Value policy.
    #[must_use]
    pub fn value_callbacks(&self) -> &CallbackSet<V> {
        &self.values
    }

    #[inline]
    fn slots(&self) -> &[Slot<K, V>] {
        // SAFETY: every one of the `capacity` slots is initialised.
        unsafe { std::slice::from_raw_parts(self.buckets.as_ptr(), self.capacity()) }
    }

    #[inline]
    fn slots_mut(&mut self) -> &mut [Slot<K, V>] {
        let capacity = self.capacity();
        // SAFETY: as above, and `&mut self` is exclusive.
        unsafe { std::slice::from_raw_parts_mut(self.buckets.as_mut_ptr(), capacity) }
    }

    fn entries(&self) -> impl Iterator<Item = &Entry<K, V>> {
        self.slots().iter().filter_map(|slot| match slot {
            Slot::Occupied(entry) => Some(entry),
            _ => None,
        })
    }

    fn step(hash: u64, capacity: usize) -> usize {
        let second = hash.wrapping_add(1).wrapping_mul(SECOND_HASH_MULTIPLIER);
        match (second % capacity as u64) as usize {
            0 => 1,
            step => step,
        }
    }

    /// Locates `key`'s bucket, or the bucket an insertion would use.
    ///
    /// The insertion bucket is the first tombstone met on the way, else the
    /// empty bucket that ended the probe.
    ///
    /// # Panics
    ///
    /// Panics if the probe visits every bucket without finding the key or a
    /// free bucket, which the load limit rules out.
    #[must_use]
    pub fn find_bucket(&self, key: &K) -> Probe {
        let capacity = self.capacity();
        let hash = self.keys.hash(key);
        let mut index = (hash % capacity as u64) as usize;
        let mut step = 0;
        let mut first_deleted = None;

        for _ in 0..capacity {
            match &self.slots()[index] {
                Slot::Empty => return Probe::Vacant(first_deleted.unwrap_or(index)),
                Slot::Deleted => {
                    first_deleted.get_or_insert(index);
                }
                Slot::Occupied(entry) => {
                    if self.keys.equal(&entry.key, key) {
                        return Probe::Found(index);
                    }
                }
            }
            if step == 0 {
                step = Self::step(hash, capacity);
            }
            index = (index + step) % capacity;
        }

        match first_deleted {
            Some(index) => Probe::Vacant(index),
            None => panic!("hash table probe exhausted {capacity} buckets"),
        }
    }

    fn entry(&self, key: &K) -> Option<&Entry<K, V>> {
        match self.find_bucket(key) {
            Probe::Found(index) => match &self.slots()[index] {
                Slot::Occupied(entry) => Some(entry),
                _ => None,
            },
            Probe::Vacant(_) => None,
        }
    }

    /// Rebuilds every entry into a fresh bucket array.
    fn rehash(&mut self, new_capacity: usize) -> Result<()> {
        let fresh = allocate_buckets(new_capacity, self.allocator().clone())?;
        let old_capacity = self.capacity();
        let mut old = mem::replace(&mut self.buckets, fresh);
        self.deleted = 0;

        // SAFETY: the old array is fully initialised.
        let old_slots = unsafe { std::slice::from_raw_parts_mut(old.as_mut_ptr(), old_capacity) };
        for slot in old_slots {
            if let Slot::Occupied(entry) = mem::replace(slot, Slot::Empty) {
                let index = self.vacant_index(&entry.key);
                self.slots_mut()[index] = Slot::Occupied(entry);
            }
        }

        oxidef_log::trace!(
            "rehashed {} entries from {} to {} buckets",
            self.count,
            old_capacity,
            new_capacity
        );
        Ok(())
    }

    /// Probe for a key known to be absent from a tombstone-free table.
    fn vacant_index(&self, key: &K) -> usize {
        let capacity = self.capacity();
        let hash = self.keys.hash(key);
        let mut index = (hash % capacity as u64) as usize;
        let step = Self::step(hash, capacity);
        while !matches!(self.slots()[index], Slot::Empty) {
            index = (index + step) % capacity;
        }
        index
    }

    fn grow_if_needed(&mut self) -> Result<()> {
        if self.count + self.deleted < threshold(self.capacity()) {
            return Ok(());
        }
        let needed = capacity_for(self.count + 1).ok_or(Error::CapacityOverflow)?;
        self.rehash(needed.max(self.capacity()))
    }

    fn shrink_if_needed(&mut self) {
        let capacity = self.capacity();
        if self.count * 4 >= capacity {
            return;
        }
        let Some(target) = capacity_for(self.count) else {
            return;
        };
        if target < capacity && self.rehash(target).is_err() {
            oxidef_log::debug!("skipped shrinking table of {} buckets", capacity);
        }
    }

    fn insert_at(&mut self, index: usize, key: K, value: V) {
        let slot = &mut self.slots_mut()[index];
        let was_deleted = matches!(slot, Slot::Deleted);
        *slot = Slot::Occupied(Entry {
            key,
            value,
            occurrences: 1,
        });
        if was_deleted {
            self.deleted -= 1;
        }
        self.count += 1;
    }

    /// Adds `key` if absent.
    ///
    /// On a unique table a present key is left alone and the arguments are
    /// released. On a counted table it gains an occurrence.
    ///
    /// # Errors
    ///
    /// Returns an error if growing the table fails; the table is unchanged.
    pub fn add(&mut self, key: K, value: V) -> Result<()> {
        self.grow_if_needed()?;
        match self.find_bucket(&key) {
            Probe::Found(index) => {
                if self.multiplicity == Multiplicity::Counted {
                    if let Slot::Occupied(entry) = &mut self.slots_mut()[index] {
                        entry.occurrences += 1;
                    }
                }
                self.keys.release(key);
                self.values.release(value);
            }
            Probe::Vacant(index) => self.insert_at(index, key, value),
        }
        Ok(())
    }

    /// Inserts or replaces. A present key keeps its stored key object and
    /// occurrence count; the old value is released.
    ///
    /// # Errors
    ///
    /// Returns an error if growing the table fails; the table is unchanged.
    pub fn set(&mut self, key: K, value: V) -> Result<()> {
        self.grow_if_needed()?;
        match self.find_bucket(&key) {
            Probe::Found(index) => {
                self.keys.release(key);
                self.replace_at(index, value);
            }
            Probe::Vacant(index) => self.insert_at(index, key, value),
        }
        Ok(())
    }

    fn replace_at(&mut self, index: usize, value: V) {
        if let Slot::Occupied(entry) = &mut self.slots_mut()[index] {
            let old = mem::replace(&mut entry.value, value);
            self.values.release(old);
        }
    }

    /// Replaces the value of a present key. Returns `false` (and releases
    /// `value`) if the key is absent.
    pub fn replace(&mut self, key: &K, value: V) -> bool {
        match self.find_bucket(key) {
            Probe::Found(index) => {
                self.replace_at(index, value);
                true
            }
            Probe::Vacant(_) => {
                self.values.release(value);
                false
            }
        }
    }

    /// Removes one occurrence of `key`. Returns `false` if it was absent.
    ///
    /// The shrink check runs first, against the count before removal. The
    /// key and value are released when the last occurrence goes.
    pub fn remove(&mut self, key: &K) -> bool {
        if !self.contains_key(key) {
            return false;
        }
        self.shrink_if_needed();

        let Probe::Found(index) = self.find_bucket(key) else {
            return false;
        };
        let slot = &mut self.slots_mut()[index];
        if let Slot::Occupied(entry) = &mut *slot {
            if entry.occurrences > 1 {
                entry.occurrences -= 1;
                return true;
            }
        }
        if let Slot::Occupied(entry) = mem::replace(slot, Slot::Deleted) {
            self.count -= 1;
            self.deleted += 1;
            self.keys.release(entry.key);
            self.values.release(entry.value);
        }
        true
    }

    /// Releases every entry. The capacity is kept.
    pub fn remove_all(&mut self) {
        let keys = self.keys.clone();
        let values = self.values.clone();
        for slot in self.slots_mut() {
            if let Slot::Occupied(entry) = mem::replace(slot, Slot::Empty) {
                keys.release(entry.key);
                values.release(entry.value);
            }
        }
        self.count = 0;
        self.deleted = 0;
    }

    /// `true` if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        matches!(self.find_bucket(key), Probe::Found(_))
    }

    /// `true` if some entry holds `value`. Scans every bucket.
    #[must_use]
    pub fn contains_value(&self, value: &V) -> bool {
        self.entries().any(|e| self.values.equal(&e.value, value))
    }

    /// Occurrences of `key`; 0 if absent.
    #[must_use]
    pub fn count_of_key(&self, key: &K) -> usize {
        self.entry(key).map_or(0, |e| e.occurrences)
    }

    /// Occurrences of every entry holding `value`. Scans every bucket.
    #[must_use]
    pub fn count_of_value(&self, value: &V) -> usize {
        self.entries()
            .filter(|e| self.values.equal(&e.value, value))
            .map(|e| e.occurrences)
            .sum()
    }

    /// The value stored for `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entry(key).map(|e| &e.value)
    }

    /// The stored key equal to `key`.
    #[must_use]
    pub fn get_key(&self, key: &K) -> Option<&K> {
        self.entry(key).map(|e| &e.key)
    }

    /// Retained copies of every key and value, one per occurrence, in
    /// bucket order.
    #[must_use]
    pub fn get_keys_and_values(&self) -> (Vec<K>, Vec<V>) {
        let total = self.total_occurrences();
        let mut keys = Vec::with_capacity(total);
        let mut values = Vec::with_capacity(total);
        for entry in self.entries() {
            for _ in 0..entry.occurrences {
                keys.push(self.keys.retain(&entry.key));
                values.push(self.values.retain(&entry.value));
            }
        }
        (keys, values)
    }

    /// Iterates `(key, value, occurrences)` in bucket order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V, usize)> {
        self.entries().map(|e| (&e.key, &e.value, e.occurrences))
    }

    /// Calls `f` once per distinct key.
    pub fn apply<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        for entry in self.entries() {
            f(&entry.key, &entry.value);
        }
    }

    /// A copy with retained keys and values, in `allocator`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the allocator refuses.
    pub fn copy_in(&self, allocator: AllocatorRef) -> Result<Self> {
        let mut copy = Self::with_capacity(
            allocator,
            self.multiplicity,
            self.count,
            self.keys.clone(),
            self.values.clone(),
        )?;
        for entry in self.entries() {
            let key = self.keys.retain(&entry.key);
            let value = self.values.retain(&entry.value);
            let index = copy.vacant_index(&key);
            copy.insert_at(index, key, value);
            if let Slot::Occupied(copied) = &mut copy.slots_mut()[index] {
                copied.occurrences = entry.occurrences;
            }
        }
        Ok(copy)
    }

    /// Same cardinality, and every entry of `self` has an entry in `other`
    /// with an equal key, the same occurrence count and an equal value.
    #[must_use]
    pub fn table_equal(&self, other: &HashTable<K, V>) -> bool {
        if self.count != other.count {
            return false;
        }
        self.entries().all(|entry| match other.entry(&entry.key) {
            Some(found) => {
                found.occurrences == entry.occurrences
                    && self.values.equal(&entry.value, &found.value)
            }
            None => false,
        })
    }

    /// Multi-line description of every bucket in use.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = format!(
            "{{count = {}, capacity = {}, entries = (\n",
            self.count,
            self.capacity()
        );
        for (index, slot) in self.slots().iter().enumerate() {
            if let Slot::Occupied(entry) = slot {
                let _ = write!(
                    out,
                    "\t{} : {} = {}",
                    index,
                    self.keys.describe(&entry.key),
                    self.values.describe(&entry.value)
                );
                if entry.occurrences > 1 {
                    let _ = write!(out, " (x{})", entry.occurrences);
                }
                out.push('\n');
            }
        }
        out.push_str(")}");
        out
    }
}

impl<K: Opaque, V: Opaque> Drop for HashTable<K, V> {
    fn drop(&mut self) {
        self.remove_all();
    }
}

impl<K: Opaque, V: Opaque> PartialEq for HashTable<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.table_equal(other)
    }
}

impl<K: Opaque, V: Opaque> fmt::Debug for HashTable<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashTable")
            .field("count", &self.count)
            .field("capacity", &self.capacity())
            .field("multiplicity", &self.multiplicity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::primes::is_table_prime;
    use oxidef_mem::{LimitedAllocator, default_allocator};
    use std::sync::Arc;

    fn words(multiplicity: Multiplicity) -> HashTable<usize, usize> {
        HashTable::new(
            default_allocator(),
            multiplicity,
            CallbackSet::null(),
            CallbackSet::null(),
        )
        .unwrap()
    }

    /// Keys whose hashes all collide.
    struct Colliding;

    impl crate::collections::Callbacks<usize> for Colliding {
        fn hash(&self, _value: &usize) -> u64 {
            7
        }
    }

    #[test]
    fn test_starts_at_smallest_prime() {
        let table = words(Multiplicity::Unique);
        assert_eq!(table.capacity(), 5);
        assert!(table.is_empty());
    }

    #[test]
    fn test_add_does_not_overwrite() {
        let mut table = words(Multiplicity::Unique);
        table.add(1, 10).unwrap();
        table.add(1, 11).unwrap();
        assert_eq!(table.get(&1), Some(&10));
        assert_eq!(table.count_of_key(&1), 1);
    }

    #[test]
    fn test_set_and_replace() {
        let mut table = words(Multiplicity::Unique);
        assert!(!table.replace(&1, 5));
        assert!(table.get(&1).is_none());

        table.set(1, 10).unwrap();
        table.set(1, 20).unwrap();
        assert_eq!(table.get(&1), Some(&20));
        assert!(table.replace(&1, 30));
        assert_eq!(table.get(&1), Some(&30));
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn test_counted_occurrences() {
        let mut table = words(Multiplicity::Counted);
        for _ in 0..3 {
            table.add(5, 0).unwrap();
        }
        assert_eq!(table.count(), 1);
        assert_eq!(table.count_of_key(&5), 3);
        assert_eq!(table.count_of_value(&0), 3);
        assert_eq!(table.total_occurrences(), 3);

        let (keys, _) = table.get_keys_and_values();
        assert_eq!(keys, vec![5, 5, 5]);

        assert!(table.remove(&5));
        assert_eq!(table.count_of_key(&5), 2);
        assert!(table.remove(&5));
        assert!(table.remove(&5));
        assert!(!table.contains_key(&5));
        assert!(!table.remove(&5));
    }

    #[test]
    fn test_growth_keeps_load_under_threshold() {
        let mut table = words(Multiplicity::Unique);
        for i in 0..1000 {
            let before = table.capacity();
            table.add(i, i * 2).unwrap();
            assert!(is_table_prime(table.capacity()));
            if table.capacity() != before {
                assert!(table.count() * 5 <= table.capacity() * 4);
            }
        }
        assert_eq!(table.count(), 1000);
        for i in 0..1000 {
            assert_eq!(table.get(&i), Some(&(i * 2)));
        }
    }

    #[test]
    fn test_tombstones_keep_chains_intact() {
        let mut table: HashTable<usize, usize> = HashTable::new(
            default_allocator(),
            Multiplicity::Unique,
            CallbackSet::new(Colliding),
            CallbackSet::null(),
        )
        .unwrap();
        for i in 0..4 {
            table.add(i, i).unwrap();
        }
        // Removing the head of the chain must not hide the others.
        assert!(table.remove(&0));
        for i in 1..4 {
            assert_eq!(table.get(&i), Some(&i), "key {i}");
        }
        table.add(0, 100).unwrap();
        assert_eq!(table.get(&0), Some(&100));
        assert_eq!(table.count(), 4);
    }

    #[test]
    fn test_churn_does_not_exhaust_probe() {
        let mut table = words(Multiplicity::Unique);
        for round in 0..200 {
            table.add(round, round).unwrap();
            table.add(round + 10_000, round).unwrap();
            assert!(table.remove(&round));
        }
        assert_eq!(table.count(), 200);
        assert!(table.count() + table.deleted < table.capacity());
    }

    #[test]
    fn test_shrinks_on_removal() {
        let mut table = words(Multiplicity::Unique);
        for i in 0..100 {
            table.add(i, i).unwrap();
        }
        let grown = table.capacity();
        for i in 0..95 {
            table.remove(&i);
        }
        assert!(table.capacity() < grown);
        assert!(is_table_prime(table.capacity()));
        for i in 95..100 {
            assert_eq!(table.get(&i), Some(&i));
        }
    }

    #[test]
    fn test_shrink_check_precedes_decrement() {
        let mut table = words(Multiplicity::Counted);
        for i in 0..19 {
            table.add(i, i).unwrap();
        }
        table.add(0, 0).unwrap();
        assert_eq!(table.capacity(), 41);
        for i in 11..19 {
            assert!(table.remove(&i));
        }
        assert_eq!(table.count(), 11);

        // 11 entries before removal keep 41 buckets above the 25% mark.
        assert!(table.remove(&10));
        assert_eq!(table.capacity(), 41);
        assert_eq!(table.count(), 10);

        // 10 entries do not; one of key 0's two occurrences goes.
        assert!(table.remove(&0));
        assert_eq!(table.capacity(), 23);
        assert_eq!(table.count(), 10);
        assert_eq!(table.count_of_key(&0), 1);
        for i in 0..10 {
            assert_eq!(table.get(&i), Some(&i));
        }
    }

    #[test]
    fn test_prefix_keys_stay_distinct() {
        let alphabet: &'static str = "abcdefghijklmnopqrstuvwxyz";
        let mut table: HashTable<&'static str, usize> = HashTable::new(
            default_allocator(),
            Multiplicity::Unique,
            CallbackSet::values(),
            CallbackSet::values(),
        )
        .unwrap();
        for end in 1..=alphabet.len() {
            table.set(&alphabet[..end], end).unwrap();
        }
        assert_eq!(table.count(), 26);
        assert_eq!(table.get(&"abc"), Some(&3));
        assert!(table.remove(&"ab"));
        assert_eq!(table.get(&"a"), Some(&1));
        assert!(!table.contains_key(&"ab"));
    }

    #[test]
    fn test_remove_all_keeps_capacity() {
        let mut table = words(Multiplicity::Unique);
        for i in 0..50 {
            table.add(i, i).unwrap();
        }
        let capacity = table.capacity();
        table.remove_all();
        assert_eq!(table.count(), 0);
        assert_eq!(table.capacity(), capacity);
        assert!(!table.contains_key(&3));
    }

    #[test]
    fn test_values_are_released() {
        let value = Arc::new(0u8);
        let mut table: HashTable<usize, Arc<u8>> = HashTable::new(
            default_allocator(),
            Multiplicity::Unique,
            CallbackSet::null(),
            CallbackSet::null(),
        )
        .unwrap();
        table.add(1, value.clone()).unwrap();
        table.add(2, value.clone()).unwrap();
        table.add(2, value.clone()).unwrap();
        assert_eq!(Arc::strong_count(&value), 3);

        table.set(1, Arc::new(1)).unwrap();
        assert_eq!(Arc::strong_count(&value), 2);

        let (_, values) = table.get_keys_and_values();
        assert_eq!(Arc::strong_count(&value), 3);
        drop(values);

        drop(table);
        assert_eq!(Arc::strong_count(&value), 1);
    }

    #[test]
    fn test_equality_and_copy() {
        let mut a = words(Multiplicity::Counted);
        a.add(1, 1).unwrap();
        a.add(1, 1).unwrap();
        a.add(2, 2).unwrap();

        let b = a.copy_in(default_allocator()).unwrap();
        assert_eq!(a, b);
        assert_eq!(b.count_of_key(&1), 2);

        let mut c = words(Multiplicity::Counted);
        c.add(1, 1).unwrap();
        c.add(2, 2).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_failed_growth_leaves_table_usable() {
        let limited: AllocatorRef = Arc::new(LimitedAllocator::new(default_allocator(), 512));
        let mut table: HashTable<usize, usize> = HashTable::new(
            limited,
            Multiplicity::Unique,
            CallbackSet::null(),
            CallbackSet::null(),
        )
        .unwrap();

        let mut inserted = 0;
        let err = loop {
            match table.add(inserted, inserted) {
                Ok(()) => inserted += 1,
                Err(err) => break err,
            }
        };
        assert!(matches!(err, Error::OutOfMemory { .. }));
        assert_eq!(table.count(), inserted);
        for i in 0..inserted {
            assert_eq!(table.get(&i), Some(&i));
        }
    }

    #[test]
    fn test_describe_lists_entries() {
        let mut table = words(Multiplicity::Counted);
        table.add(0x10, 0x20).unwrap();
        table.add(0x10, 0x20).unwrap();
        let text = table.describe();
        assert!(text.starts_with("{count = 1, capacity = 5"));
        assert!(text.contains("0x10 = 0x20 (x2)"));
    }
}
