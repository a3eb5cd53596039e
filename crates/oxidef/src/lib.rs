//! `OxideF`: a reference-counted object runtime with a generic collection
//! engine.
//!
//! `OxideF` provides the bottom layer of a dynamic object system:
//!
//! - **Object model** with a per-type operation table, atomic retain/release
//!   and constant (never freed) instances
//! - **Foreign bridging** so handles owned by an external object system can
//!   travel through every runtime operation
//! - **Hash table engine** with double hashing, prime capacities and
//!   per-key occurrence counts, shared by dictionaries, sets and bags
//! - **Arrays** built on a single splice primitive, with in-place quicksort
//!   and leftmost binary search
//!
//! # Architecture
//!
//! - **Runtime Layer** ([`runtime`]): type registry, instances, objects
//! - **Collection Layer** ([`collections`]): callback sets, hash table, array
//! - **Memory Layer** (`oxidef-mem`): pluggable allocators and raw buffers
//!
//! # Example
//!
//! ```rust
//! use oxidef::collections::{CallbackSet, Dictionary};
//! use oxidef::{Object, Runtime, RuntimeConfig};
//! use oxidef_mem::default_allocator;
//!
//! let runtime = Runtime::new(RuntimeConfig::default());
//! let key: Object = runtime.create_native(None, String::from("answer")).unwrap().into();
//! let value: Object = runtime.create_native(None, 42i64).unwrap().into();
//!
//! let mut dict = Dictionary::new(
//!     default_allocator(),
//!     CallbackSet::objects(),
//!     CallbackSet::objects(),
//! )
//! .unwrap();
//! dict.set(key.clone(), value).unwrap();
//!
//! let found = dict.get(&key).unwrap();
//! assert_eq!(found.downcast_ref::<i64>(), Some(&42));
//! ```

pub mod collections;
pub mod config;
pub mod error;
pub mod runtime;

// Re-export commonly used types
pub use collections::{Array, Bag, CallbackSet, Dictionary, HashTable, Set};
pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use runtime::{
    ForeignBridge, ForeignClass, ForeignHandle, ForeignObject, ForeignReply, Instance, NativeType,
    Object, Runtime, StaticInstance, TypeDescriptor, TypeId,
};
