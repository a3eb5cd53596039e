//! Generic collections over opaque values.
//!
//! - [`callbacks`]: per-collection element policies
//! - [`hash_table`]: the open-addressing engine with occurrence counts
//! - [`facade`]: [`Dictionary`], [`Set`] and [`Bag`] over the engine
//! - [`array`]: splice-based contiguous arrays
//! - [`sort`]: quicksort and leftmost binary search
//! - [`primes`]: the hash table's capacity sequence
//!
//! Every collection records the allocator it was created with and routes
//! all of its buffer traffic back through it.

pub mod array;
pub mod callbacks;
pub mod facade;
pub mod hash_table;
pub mod primes;
pub mod sort;

pub use array::{Array, ArrayKind, DEFAULT_CAPACITY};
pub use callbacks::{CallbackSet, Callbacks, ObjectCallbacks, Opaque, ValueCallbacks};
pub use facade::{
    Bag, Dictionary, ObjectArray, ObjectDictionary, ObjectSet, Set, array_count, array_get,
    dictionary_count, dictionary_get, set_contains,
};
pub use hash_table::{HashTable, Multiplicity, Probe};
