//! Polymorphic object values.
//!
//! An [`Object`] is either a native runtime [`Instance`] or a handle owned
//! by an external object system. Every operation matches on the tag first:
//! native instances dispatch through the descriptor captured at creation,
//! foreign handles answer for themselves.

use crate::runtime::bridge::ForeignObject;
use crate::runtime::descriptor::TypeId;
use crate::runtime::instance::Instance;
use oxidef_mem::AllocatorRef;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A runtime value: native instance or foreign handle.
///
/// Cloning retains, dropping releases. [`PartialEq`] and [`Hash`] go through
/// the type's own equality and hash, so objects can be used as keys in any
/// collection.
///
/// # Example
///
/// ```rust
/// use oxidef::runtime::{Object, Runtime, TypeDescriptor};
/// use oxidef::RuntimeConfig;
///
/// let runtime = Runtime::new(RuntimeConfig::default());
/// let point = runtime.register_type(TypeDescriptor::new("Point")).unwrap();
///
/// let a = Object::from(runtime.create_instance(None, point, 16).unwrap());
/// let b = a.clone();
///
/// assert!(a.equal(&b));
/// assert_eq!(a.hash_value(), b.hash_value());
/// assert!(a.describe().starts_with("<Point: 0x"));
/// ```
#[derive(Clone)]
pub enum Object {
    /// Laid out and owned by this runtime.
    Native(Instance),
    /// Owned by an external object system.
    Foreign(ForeignObject),
}

impl Object {
    /// The type this object is, or claims to be.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        match self {
            Object::Native(instance) => instance.type_id(),
            Object::Foreign(foreign) => foreign.claimed_type(),
        }
    }

    /// Address used for identity.
    #[must_use]
    pub fn addr(&self) -> usize {
        match self {
            Object::Native(instance) => instance.addr(),
            Object::Foreign(foreign) => foreign.addr(),
        }
    }

    /// `true` if both values are the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Object) -> bool {
        self.addr() == other.addr()
    }

    /// The native instance, if this is one.
    #[must_use]
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Object::Native(instance) => Some(instance),
            Object::Foreign(_) => None,
        }
    }

    /// The foreign handle, if this is one.
    #[must_use]
    pub fn as_foreign(&self) -> Option<&ForeignObject> {
        match self {
            Object::Native(_) => None,
            Object::Foreign(foreign) => Some(foreign),
        }
    }

    /// Unwraps a native instance.
    #[must_use]
    pub fn into_instance(self) -> Option<Instance> {
        match self {
            Object::Native(instance) => Some(instance),
            Object::Foreign(_) => None,
        }
    }

    /// Borrows the typed payload of a native instance.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.as_instance()?.downcast_ref::<T>()
    }

    /// Owners of a native instance; foreign handles report their `Arc`
    /// strong count.
    #[must_use]
    pub fn retain_count(&self) -> usize {
        match self {
            Object::Native(instance) => instance.retain_count(),
            Object::Foreign(foreign) => std::sync::Arc::strong_count(foreign.handle()),
        }
    }

    /// Object equality.
    ///
    /// Identical objects are equal. If either side is foreign its handle
    /// decides. Otherwise the types must match and the type's equality
    /// decides, defaulting to `false`.
    #[must_use]
    pub fn equal(&self, other: &Object) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (self, other) {
            (Object::Foreign(foreign), _) => foreign.handle().equal(other),
            (_, Object::Foreign(foreign)) => foreign.handle().equal(self),
            (Object::Native(a), Object::Native(b)) => {
                if a.type_id() != b.type_id() {
                    return false;
                }
                a.descriptor().equal.is_some_and(|equal| equal(a, b))
            }
        }
    }

    /// The type's hash, or the identity hash if it has none.
    #[must_use]
    pub fn hash_value(&self) -> u64 {
        match self {
            Object::Native(instance) => match instance.descriptor().hash {
                Some(hash) => hash(instance),
                None => instance.identity_hash(),
            },
            Object::Foreign(foreign) => foreign.handle().hash(),
        }
    }

    /// The type's description, or `<TypeName: 0xADDR>`.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Object::Native(instance) => match instance.descriptor().describe {
                Some(describe) => describe(instance),
                None => default_description(instance),
            },
            Object::Foreign(foreign) => foreign.handle().describe(),
        }
    }

    /// The type's debug description, falling back to [`Object::describe`].
    #[must_use]
    pub fn debug_describe(&self) -> String {
        match self {
            Object::Native(instance) => match instance.descriptor().debug_describe {
                Some(describe) => describe(instance),
                None => self.describe(),
            },
            Object::Foreign(_) => self.describe(),
        }
    }

    /// Deep copy through the type's copy function.
    ///
    /// Types without one are treated as immutable and the copy is the same
    /// object, retained. Foreign handles are always retained.
    /// Returns `None` if the allocator is exhausted.
    #[must_use]
    pub fn copy_in(&self, allocator: &AllocatorRef) -> Option<Object> {
        match self {
            Object::Native(instance) => match instance.descriptor().copy {
                Some(copy) => copy(instance, allocator).map(Object::Native),
                None => Some(self.clone()),
            },
            Object::Foreign(_) => Some(self.clone()),
        }
    }
}

pub(crate) fn default_description(instance: &Instance) -> String {
    format!("<{}: {:#x}>", instance.type_name(), instance.addr())
}

impl From<Instance> for Object {
    fn from(instance: Instance) -> Self {
        Object::Native(instance)
    }
}

impl From<ForeignObject> for Object {
    fn from(foreign: ForeignObject) -> Self {
        Object::Foreign(foreign)
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.equal(other)
    }
}

impl Eq for Object {}

impl Hash for Object {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_value());
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.debug_describe())
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::bridge::{ForeignClass, ForeignHandle};
    use crate::runtime::descriptor::TypeDescriptor;
    use oxidef_mem::default_allocator;
    use std::sync::Arc;

    fn first_byte_equal(a: &Instance, b: &Instance) -> bool {
        a.payload()[0] == b.payload()[0]
    }

    fn first_byte_hash(a: &Instance) -> u64 {
        u64::from(a.payload()[0])
    }

    fn bytes(descriptor: &Arc<TypeDescriptor>, id: u32, byte: u8) -> Object {
        let mut instance = Instance::allocate(
            &default_allocator(),
            TypeId::new(id).unwrap(),
            Arc::clone(descriptor),
            None,
            1,
        )
        .unwrap();
        instance.payload_mut().unwrap()[0] = byte;
        Object::Native(instance)
    }

    struct AlwaysEqual;

    impl ForeignHandle for AlwaysEqual {
        fn class(&self) -> ForeignClass {
            ForeignClass::new(9).unwrap()
        }

        fn equal(&self, _other: &Object) -> bool {
            true
        }

        fn hash(&self) -> u64 {
            1234
        }

        fn describe(&self) -> String {
            "<external>".into()
        }
    }

    #[test]
    fn test_type_equality_dispatch() {
        let tagged = Arc::new(
            TypeDescriptor::new("Tag")
                .with_equal(first_byte_equal)
                .with_hash(first_byte_hash),
        );
        let a = bytes(&tagged, 1, 4);
        let b = bytes(&tagged, 1, 4);
        let c = bytes(&tagged, 1, 5);

        assert!(a.equal(&b));
        assert!(!a.equal(&c));
        assert_eq!(a.hash_value(), 4);
        assert_eq!(a, b);
    }

    #[test]
    fn test_mismatched_types_are_unequal() {
        let tagged = Arc::new(TypeDescriptor::new("Tag").with_equal(first_byte_equal));
        let a = bytes(&tagged, 1, 4);
        let b = bytes(&tagged, 2, 4);
        assert!(!a.equal(&b));
    }

    #[test]
    fn test_defaults_are_identity() {
        let plain = Arc::new(TypeDescriptor::new("Plain"));
        let a = bytes(&plain, 1, 0);
        let b = bytes(&plain, 1, 0);

        assert!(a.equal(&a.clone()));
        assert!(!a.equal(&b));
        assert_eq!(a.hash_value(), (a.addr() >> 4) as u64);
        assert_eq!(a.describe(), format!("<Plain: {:#x}>", a.addr()));
        assert_eq!(a.debug_describe(), a.describe());
    }

    #[test]
    fn test_copy_without_copy_fn_retains() {
        let plain = Arc::new(TypeDescriptor::new("Plain"));
        let a = bytes(&plain, 1, 0);
        let copy = a.copy_in(&default_allocator()).unwrap();
        assert!(copy.ptr_eq(&a));
        assert_eq!(a.retain_count(), 2);
    }

    #[test]
    fn test_foreign_side_decides() {
        let plain = Arc::new(TypeDescriptor::new("Plain"));
        let native = bytes(&plain, 1, 0);
        let foreign = Object::Foreign(ForeignObject::new(
            TypeId::new(1).unwrap(),
            Arc::new(AlwaysEqual),
        ));

        assert!(foreign.equal(&native));
        assert!(native.equal(&foreign));
        assert_eq!(foreign.hash_value(), 1234);
        assert_eq!(foreign.describe(), "<external>");
        assert_eq!(foreign.type_id().get(), 1);
        assert!(foreign.as_instance().is_none());
    }
}
