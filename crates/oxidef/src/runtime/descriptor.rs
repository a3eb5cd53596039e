//! Type identifiers and per-type operation tables.
//!
//! A [`TypeDescriptor`] names a runtime type and carries the optional
//! polymorphic operations the runtime dispatches to: initialise, copy,
//! finalize, equality, hash and the two describers. Missing operations
//! fall back to identity semantics.
//!
//! # Example
//!
//! ```rust
//! use oxidef::runtime::{Instance, TypeDescriptor};
//!
//! fn first_byte_equal(a: &Instance, b: &Instance) -> bool {
//!     a.payload().first() == b.payload().first()
//! }
//!
//! let descriptor = TypeDescriptor::new("Tag").with_equal(first_byte_equal);
//! assert_eq!(descriptor.name(), "Tag");
//! assert!(descriptor.has_equal());
//! ```

use crate::runtime::instance::Instance;
use oxidef_mem::AllocatorRef;
use std::fmt;
use std::num::NonZeroU32;

/// Stable identifier of a registered type.
///
/// Identifier 0 means "not a valid type" and cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(NonZeroU32);

impl TypeId {
    /// Wraps a raw identifier, rejecting the reserved value 0.
    #[must_use]
    pub const fn new(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(id) => Some(TypeId(id)),
            None => None,
        }
    }

    /// Returns the raw identifier.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0.get() as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Runs once on a freshly zeroed instance before it is handed out.
pub type InitFn = fn(&mut Instance);

/// Produces a deep copy in the given allocator; `None` on exhaustion.
pub type CopyFn = fn(&Instance, &AllocatorRef) -> Option<Instance>;

/// Releases whatever the payload owns. Runs exactly once, right before the
/// memory goes back to the allocator.
pub type FinalizeFn = fn(&mut Instance);

/// Equality between two instances of the same type.
pub type EqualFn = fn(&Instance, &Instance) -> bool;

/// Hash consistent with [`EqualFn`].
pub type HashFn = fn(&Instance) -> u64;

/// Human-readable or debug rendering.
pub type DescribeFn = fn(&Instance) -> String;

/// Per-type record of optional operations.
#[derive(Clone)]
pub struct TypeDescriptor {
    pub(crate) name: String,
    pub(crate) init: Option<InitFn>,
    pub(crate) copy: Option<CopyFn>,
    pub(crate) finalize: Option<FinalizeFn>,
    pub(crate) equal: Option<EqualFn>,
    pub(crate) hash: Option<HashFn>,
    pub(crate) describe: Option<DescribeFn>,
    pub(crate) debug_describe: Option<DescribeFn>,
    /// Rust type stored in the payload, for typed instances.
    pub(crate) native: Option<std::any::TypeId>,
}

impl TypeDescriptor {
    /// Creates a descriptor with no operations.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        TypeDescriptor {
            name: name.into(),
            init: None,
            copy: None,
            finalize: None,
            equal: None,
            hash: None,
            describe: None,
            debug_describe: None,
            native: None,
        }
    }

    /// Sets the initializer.
    #[must_use]
    pub fn with_init(mut self, init: InitFn) -> Self {
        self.init = Some(init);
        self
    }

    /// Sets the deep-copy function.
    #[must_use]
    pub fn with_copy(mut self, copy: CopyFn) -> Self {
        self.copy = Some(copy);
        self
    }

    /// Sets the finalizer.
    #[must_use]
    pub fn with_finalize(mut self, finalize: FinalizeFn) -> Self {
        self.finalize = Some(finalize);
        self
    }

    /// Sets the equality predicate.
    #[must_use]
    pub fn with_equal(mut self, equal: EqualFn) -> Self {
        self.equal = Some(equal);
        self
    }

    /// Sets the hash function.
    #[must_use]
    pub fn with_hash(mut self, hash: HashFn) -> Self {
        self.hash = Some(hash);
        self
    }

    /// Sets the formatting describer.
    #[must_use]
    pub fn with_describe(mut self, describe: DescribeFn) -> Self {
        self.describe = Some(describe);
        self
    }

    /// Sets the debug describer.
    #[must_use]
    pub fn with_debug_describe(mut self, describe: DescribeFn) -> Self {
        self.debug_describe = Some(describe);
        self
    }

    /// Display name of the type.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` if an equality predicate is registered.
    #[must_use]
    pub fn has_equal(&self) -> bool {
        self.equal.is_some()
    }

    /// `true` if a hash function is registered.
    #[must_use]
    pub fn has_hash(&self) -> bool {
        self.hash.is_some()
    }

    /// `true` if the payload holds a typed Rust value.
    #[must_use]
    pub fn is_native(&self) -> bool {
        self.native.is_some()
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("init", &self.init.is_some())
            .field("copy", &self.copy.is_some())
            .field("finalize", &self.finalize.is_some())
            .field("equal", &self.equal.is_some())
            .field("hash", &self.hash.is_some())
            .field("describe", &self.describe.is_some())
            .field("native", &self.native.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn never_equal(_: &Instance, _: &Instance) -> bool {
        false
    }

    fn zero_hash(_: &Instance) -> u64 {
        0
    }

    #[test]
    fn test_type_id_rejects_zero() {
        assert!(TypeId::new(0).is_none());
        let id = TypeId::new(7).unwrap();
        assert_eq!(id.get(), 7);
        assert_eq!(id.to_string(), "#7");
    }

    #[test]
    fn test_builder_sets_operations() {
        let descriptor = TypeDescriptor::new("Probe")
            .with_equal(never_equal)
            .with_hash(zero_hash);

        assert_eq!(descriptor.name(), "Probe");
        assert!(descriptor.has_equal());
        assert!(descriptor.has_hash());
        assert!(!descriptor.is_native());

        let debug = format!("{descriptor:?}");
        assert!(debug.contains("Probe"));
        assert!(debug.contains("equal: true"));
        assert!(debug.contains("finalize: false"));
    }
}
