//! Dictionary, set and bag over the hash table engine, and their use as
//! runtime objects.
//!
//! Each façade is a [`NativeType`], so a collection can be moved into an
//! instance with [`Runtime::create_native`] and stored inside other
//! collections. The `*_count` / `*_get` helpers at the bottom operate on
//! such objects and transparently forward to the external system when the
//! object is a foreign handle.

use crate::collections::array::Array;
use crate::collections::callbacks::{CallbackSet, Opaque};
use crate::collections::hash_table::{HashTable, Multiplicity};
use crate::error::Result;
use crate::runtime::{Dispatch, ForeignReply, NativeType, Object, Runtime};
use oxidef_mem::AllocatorRef;
use std::fmt::{self, Write as _};

/// Unique keys mapped to values.
///
/// # Example
///
/// ```rust
/// use oxidef::collections::{CallbackSet, Dictionary};
/// use oxidef_mem::default_allocator;
///
/// let mut dict = Dictionary::new(default_allocator(), CallbackSet::values(), CallbackSet::null())
///     .unwrap();
/// dict.set("x", 10usize).unwrap();
/// dict.set("x", 20).unwrap();
///
/// assert_eq!(dict.get(&"x"), Some(&20));
/// assert_eq!(dict.count(), 1);
/// ```
pub struct Dictionary<K: Opaque, V: Opaque> {
    table: HashTable<K, V>,
}

impl<K: Opaque, V: Opaque> Dictionary<K, V> {
    /// Creates an empty dictionary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`](crate::Error::OutOfMemory) if the
    /// allocator refuses.
    pub fn new(
        allocator: AllocatorRef,
        keys: CallbackSet<K>,
        values: CallbackSet<V>,
    ) -> Result<Self> {
        Ok(Dictionary {
            table: HashTable::new(allocator, Multiplicity::Unique, keys, values)?,
        })
    }

    /// Creates a dictionary from `pairs`; the first of duplicate keys wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator refuses.
    pub fn with_pairs<I>(
        allocator: AllocatorRef,
        pairs: I,
        keys: CallbackSet<K>,
        values: CallbackSet<V>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        Ok(Dictionary {
            table: HashTable::with_values(allocator, Multiplicity::Unique, pairs, keys, values)?,
        })
    }

    /// Number of entries.
    #[must_use]
    pub fn count(&self) -> usize {
        self.table.count()
    }

    /// `true` if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// The value for `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.table.get(key)
    }

    /// The stored key equal to `key`.
    #[must_use]
    pub fn get_key(&self, key: &K) -> Option<&K> {
        self.table.get_key(key)
    }

    /// `true` if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.table.contains_key(key)
    }

    /// `true` if some entry holds `value`.
    #[must_use]
    pub fn contains_value(&self, value: &V) -> bool {
        self.table.contains_value(value)
    }

    /// Number of entries holding `value`.
    #[must_use]
    pub fn count_of_value(&self, value: &V) -> usize {
        self.table.count_of_value(value)
    }

    /// Inserts `key` only if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if growth fails.
    pub fn add(&mut self, key: K, value: V) -> Result<()> {
        self.table.add(key, value)
    }

    /// Inserts or replaces.
    ///
    /// # Errors
    ///
    /// Returns an error if growth fails.
    pub fn set(&mut self, key: K, value: V) -> Result<()> {
        self.table.set(key, value)
    }

    /// Replaces the value of a present key.
    pub fn replace(&mut self, key: &K, value: V) -> bool {
        self.table.replace(key, value)
    }

    /// Removes `key`.
    pub fn remove(&mut self, key: &K) -> bool {
        self.table.remove(key)
    }

    /// Removes every entry.
    pub fn remove_all(&mut self) {
        self.table.remove_all();
    }

    /// Retained copies of every key and value, in matching order.
    #[must_use]
    pub fn keys_and_values(&self) -> (Vec<K>, Vec<V>) {
        self.table.get_keys_and_values()
    }

    /// Iterates `(key, value)`.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.table.iter().map(|(k, v, _)| (k, v))
    }

    /// Calls `f` on every entry.
    pub fn apply<F: FnMut(&K, &V)>(&self, f: F) {
        self.table.apply(f);
    }

    /// A copy in `allocator`.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator refuses.
    pub fn copy_in(&self, allocator: AllocatorRef) -> Result<Self> {
        Ok(Dictionary {
            table: self.table.copy_in(allocator)?,
        })
    }

    /// The underlying table.
    #[must_use]
    pub fn table(&self) -> &HashTable<K, V> {
        &self.table
    }

    /// See [`HashTable::describe`].
    #[must_use]
    pub fn describe(&self) -> String {
        self.table.describe()
    }
}

/// Unique members.
pub struct Set<T: Opaque> {
    table: HashTable<T, ()>,
}

/// Members with occurrence counts.
pub struct Bag<T: Opaque> {
    table: HashTable<T, ()>,
}

fn describe_members<T: Opaque>(table: &HashTable<T, ()>) -> String {
    let mut out = format!("{{count = {}, members = (\n", table.count());
    for (member, _, occurrences) in table.iter() {
        let _ = write!(out, "\t{}", table.key_callbacks().describe(member));
        if occurrences > 1 {
            let _ = write!(out, " (x{occurrences})");
        }
        out.push('\n');
    }
    out.push_str(")}");
    out
}

macro_rules! impl_member_table {
    ($name:ident, $multiplicity:expr) => {
        impl<T: Opaque> $name<T> {
            /// Creates an empty collection.
            ///
            /// # Errors
            ///
            /// Returns an error if the allocator refuses.
            pub fn new(allocator: AllocatorRef, callbacks: CallbackSet<T>) -> Result<Self> {
                Ok($name {
                    table: HashTable::new(allocator, $multiplicity, callbacks, CallbackSet::null())?,
                })
            }

            /// Creates a collection holding `members`.
            ///
            /// # Errors
            ///
            /// Returns an error if the allocator refuses.
            pub fn with_members<I>(
                allocator: AllocatorRef,
                members: I,
                callbacks: CallbackSet<T>,
            ) -> Result<Self>
            where
                I: IntoIterator<Item = T>,
            {
                Ok($name {
                    table: HashTable::with_values(
                        allocator,
                        $multiplicity,
                        members.into_iter().map(|m| (m, ())),
                        callbacks,
                        CallbackSet::null(),
                    )?,
                })
            }

            /// Number of distinct members.
            #[must_use]
            pub fn count(&self) -> usize {
                self.table.count()
            }

            /// `true` if empty.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.table.is_empty()
            }

            /// `true` if `member` is present.
            #[must_use]
            pub fn contains(&self, member: &T) -> bool {
                self.table.contains_key(member)
            }

            /// The stored member equal to `member`.
            #[must_use]
            pub fn get(&self, member: &T) -> Option<&T> {
                self.table.get_key(member)
            }

            /// Adds `member`.
            ///
            /// # Errors
            ///
            /// Returns an error if growth fails.
            pub fn add(&mut self, member: T) -> Result<()> {
                self.table.add(member, ())
            }

            /// Removes one occurrence of `member`.
            pub fn remove(&mut self, member: &T) -> bool {
                self.table.remove(member)
            }

            /// Removes everything.
            pub fn remove_all(&mut self) {
                self.table.remove_all();
            }

            /// Retained copies of the members, one per occurrence.
            #[must_use]
            pub fn members(&self) -> Vec<T> {
                self.table.get_keys_and_values().0
            }

            /// Iterates distinct members.
            pub fn iter(&self) -> impl Iterator<Item = &T> {
                self.table.iter().map(|(m, _, _)| m)
            }

            /// Calls `f` on every distinct member.
            pub fn apply<F: FnMut(&T)>(&self, mut f: F) {
                self.table.apply(|m, _| f(m));
            }

            /// A copy in `allocator`.
            ///
            /// # Errors
            ///
            /// Returns an error if the allocator refuses.
            pub fn copy_in(&self, allocator: AllocatorRef) -> Result<Self> {
                Ok($name {
                    table: self.table.copy_in(allocator)?,
                })
            }

            /// The underlying table.
            #[must_use]
            pub fn table(&self) -> &HashTable<T, ()> {
                &self.table
            }

            /// One member per line.
            #[must_use]
            pub fn describe(&self) -> String {
                describe_members(&self.table)
            }
        }
    };
}

impl_member_table!(Set, Multiplicity::Unique);
impl_member_table!(Bag, Multiplicity::Counted);

impl<T: Opaque> Bag<T> {
    /// Occurrences of `member`; 0 if absent.
    #[must_use]
    pub fn count_of(&self, member: &T) -> usize {
        self.table.count_of_key(member)
    }

    /// Sum of every member's occurrences.
    #[must_use]
    pub fn total(&self) -> usize {
        self.table.total_occurrences()
    }
}

macro_rules! impl_collection_traits {
    ($name:ident<$($param:ident),+>, $type_name:literal) => {
        impl<$($param),+> NativeType for $name<$($param),+>
        where
            $($param: Opaque + Send + Sync + 'static),+
        {
            const TYPE_NAME: &'static str = $type_name;

            fn native_equal(&self, other: &Self) -> bool {
                self.table.table_equal(&other.table)
            }

            fn native_hash(&self) -> Option<u64> {
                Some(self.count() as u64)
            }

            fn native_describe(&self) -> Option<String> {
                Some(self.describe())
            }
        }

        impl<$($param: Opaque),+> PartialEq for $name<$($param),+> {
            fn eq(&self, other: &Self) -> bool {
                self.table.table_equal(&other.table)
            }
        }

        impl<$($param: Opaque),+> fmt::Debug for $name<$($param),+> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.describe())
            }
        }
    };
}

impl_collection_traits!(Dictionary<K, V>, "Dictionary");
impl_collection_traits!(Set<T>, "Set");
impl_collection_traits!(Bag<T>, "Bag");

impl<T> NativeType for Array<T>
where
    T: Opaque + Send + Sync + 'static,
{
    const TYPE_NAME: &'static str = "Array";

    fn native_equal(&self, other: &Self) -> bool {
        self.array_equal(other)
    }

    fn native_hash(&self) -> Option<u64> {
        Some(self.len() as u64)
    }

    fn native_describe(&self) -> Option<String> {
        Some(self.describe())
    }
}

/// Collections of runtime objects, the element type the helpers below
/// operate on.
pub type ObjectArray = Array<Object>;
/// See [`ObjectArray`].
pub type ObjectDictionary = Dictionary<Object, Object>;
/// See [`ObjectArray`].
pub type ObjectSet = Set<Object>;

fn reply_index(reply: ForeignReply) -> Option<usize> {
    match reply {
        ForeignReply::Index(n) => Some(n),
        _ => None,
    }
}

fn reply_object(reply: ForeignReply) -> Option<Object> {
    match reply {
        ForeignReply::Object(object) => Some(object),
        _ => None,
    }
}

/// Number of values in an array object.
///
/// `None` if a foreign handle did not answer with an index.
///
/// # Errors
///
/// Returns an error if the array type cannot be registered.
///
/// # Panics
///
/// Panics if `array` is a native instance of another type.
pub fn array_count(runtime: &Runtime, array: &Object) -> Result<Option<usize>> {
    let type_id = runtime.native_type_id::<ObjectArray>()?;
    Ok(
        match runtime.dispatch(array, type_id, "count", &[], |instance| {
            instance.downcast_ref::<ObjectArray>().map(Array::len)
        }) {
            Dispatch::Native(count) => count,
            Dispatch::Foreign(reply) => reply_index(reply),
        },
    )
}

/// The value at `index` of an array object, retained.
///
/// # Errors
///
/// Returns an error if a runtime type cannot be registered or the index
/// argument for a foreign handle cannot be allocated.
///
/// # Panics
///
/// Panics if `array` is a native instance of another type.
pub fn array_get(runtime: &Runtime, array: &Object, index: usize) -> Result<Option<Object>> {
    let type_id = runtime.native_type_id::<ObjectArray>()?;
    let args = match array {
        Object::Foreign(_) => vec![Object::from(runtime.create_native(None, index)?)],
        Object::Native(_) => Vec::new(),
    };
    Ok(
        match runtime.dispatch(array, type_id, "objectAtIndex", &args, |instance| {
            instance
                .downcast_ref::<ObjectArray>()
                .and_then(|a| a.get(index).cloned())
        }) {
            Dispatch::Native(value) => value,
            Dispatch::Foreign(reply) => reply_object(reply),
        },
    )
}

/// Number of entries in a dictionary object.
///
/// # Errors
///
/// Returns an error if the dictionary type cannot be registered.
///
/// # Panics
///
/// Panics if `dictionary` is a native instance of another type.
pub fn dictionary_count(runtime: &Runtime, dictionary: &Object) -> Result<Option<usize>> {
    let type_id = runtime.native_type_id::<ObjectDictionary>()?;
    Ok(
        match runtime.dispatch(dictionary, type_id, "count", &[], |instance| {
            instance
                .downcast_ref::<ObjectDictionary>()
                .map(Dictionary::count)
        }) {
            Dispatch::Native(count) => count,
            Dispatch::Foreign(reply) => reply_index(reply),
        },
    )
}

/// The value stored for `key` in a dictionary object, retained.
///
/// # Errors
///
/// Returns an error if the dictionary type cannot be registered.
///
/// # Panics
///
/// Panics if `dictionary` is a native instance of another type.
pub fn dictionary_get(
    runtime: &Runtime,
    dictionary: &Object,
    key: &Object,
) -> Result<Option<Object>> {
    let type_id = runtime.native_type_id::<ObjectDictionary>()?;
    let args = [key.clone()];
    Ok(
        match runtime.dispatch(dictionary, type_id, "objectForKey", &args, |instance| {
            instance
                .downcast_ref::<ObjectDictionary>()
                .and_then(|d| d.get(key).cloned())
        }) {
            Dispatch::Native(value) => value,
            Dispatch::Foreign(reply) => reply_object(reply),
        },
    )
}

/// `true` if a set object contains `member`.
///
/// # Errors
///
/// Returns an error if the set type cannot be registered.
///
/// # Panics
///
/// Panics if `set` is a native instance of another type.
pub fn set_contains(runtime: &Runtime, set: &Object, member: &Object) -> Result<Option<bool>> {
    let type_id = runtime.native_type_id::<ObjectSet>()?;
    let args = [member.clone()];
    Ok(
        match runtime.dispatch(set, type_id, "containsObject", &args, |instance| {
            instance
                .downcast_ref::<ObjectSet>()
                .map(|s| s.contains(member))
        }) {
            Dispatch::Native(found) => found,
            Dispatch::Foreign(ForeignReply::Bool(found)) => Some(found),
            Dispatch::Foreign(_) => None,
        },
    )
}
