//! Typed payloads.
//!
//! A [`NativeType`] is a Rust type stored directly in an instance payload.
//! The runtime registers one descriptor per Rust type, whose operations are
//! monomorphized shims over the trait methods, and drops the value in place
//! when the instance is finalized.

use crate::runtime::descriptor::TypeDescriptor;
use crate::runtime::instance::{Instance, PAYLOAD_ALIGN};
use crate::runtime::object::default_description;
use oxidef_mem::AllocatorRef;
use std::mem;

/// A Rust type that can live in an instance payload.
///
/// Every method has a default, so `impl NativeType for T {}` with just a
/// name gives identity semantics.
///
/// # Example
///
/// ```rust
/// use oxidef::runtime::{NativeType, Runtime};
/// use oxidef::RuntimeConfig;
///
/// struct Celsius(f64);
///
/// impl NativeType for Celsius {
///     const TYPE_NAME: &'static str = "Celsius";
///
///     fn native_equal(&self, other: &Self) -> bool {
///         self.0 == other.0
///     }
///
///     fn native_describe(&self) -> Option<String> {
///         Some(format!("{}°C", self.0))
///     }
/// }
///
/// let runtime = Runtime::new(RuntimeConfig::default());
/// let boiling = runtime.create_native(None, Celsius(100.0)).unwrap();
///
/// assert_eq!(boiling.downcast_ref::<Celsius>().unwrap().0, 100.0);
/// assert_eq!(runtime.describe(&boiling.into()), "100°C");
/// ```
pub trait NativeType: Send + Sync + Sized + 'static {
    /// Name registered for the type.
    const TYPE_NAME: &'static str;

    /// Equality with another value of the same type.
    fn native_equal(&self, other: &Self) -> bool {
        let _ = other;
        false
    }

    /// Hash consistent with [`NativeType::native_equal`]; `None` means the
    /// identity hash.
    fn native_hash(&self) -> Option<u64> {
        None
    }

    /// Description; `None` means `<TypeName: 0xADDR>`.
    fn native_describe(&self) -> Option<String> {
        None
    }

    /// Deep copy; `None` means the value is immutable and copies share it.
    fn native_copy(&self) -> Option<Self> {
        None
    }
}

macro_rules! impl_native_integer {
    ($($ty:ty),* $(,)?) => {$(
        impl NativeType for $ty {
            const TYPE_NAME: &'static str = stringify!($ty);

            fn native_equal(&self, other: &Self) -> bool {
                self == other
            }

            fn native_hash(&self) -> Option<u64> {
                Some(*self as u64)
            }

            fn native_describe(&self) -> Option<String> {
                Some(self.to_string())
            }
        }
    )*};
}

impl_native_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl NativeType for bool {
    const TYPE_NAME: &'static str = "bool";

    fn native_equal(&self, other: &Self) -> bool {
        self == other
    }

    fn native_hash(&self) -> Option<u64> {
        Some(u64::from(*self))
    }

    fn native_describe(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl NativeType for String {
    const TYPE_NAME: &'static str = "String";

    fn native_equal(&self, other: &Self) -> bool {
        self == other
    }

    fn native_hash(&self) -> Option<u64> {
        Some(fxhash::hash64(self.as_bytes()))
    }

    fn native_describe(&self) -> Option<String> {
        Some(self.clone())
    }

    fn native_copy(&self) -> Option<Self> {
        Some(self.clone())
    }
}

fn payload<T: NativeType>(instance: &Instance) -> &T {
    match instance.downcast_ref::<T>() {
        Some(value) => value,
        None => panic!(
            "{} instance does not hold a {}",
            instance.type_name(),
            T::TYPE_NAME
        ),
    }
}

fn equal_shim<T: NativeType>(a: &Instance, b: &Instance) -> bool {
    payload::<T>(a).native_equal(payload::<T>(b))
}

fn hash_shim<T: NativeType>(instance: &Instance) -> u64 {
    payload::<T>(instance)
        .native_hash()
        .unwrap_or_else(|| instance.identity_hash())
}

fn describe_shim<T: NativeType>(instance: &Instance) -> String {
    payload::<T>(instance)
        .native_describe()
        .unwrap_or_else(|| default_description(instance))
}

fn copy_shim<T: NativeType>(instance: &Instance, allocator: &AllocatorRef) -> Option<Instance> {
    match payload::<T>(instance).native_copy() {
        Some(value) => {
            let mut copy = Instance::allocate(
                allocator,
                instance.type_id(),
                instance.descriptor_arc().clone(),
                instance.foreign_class(),
                mem::size_of::<T>(),
            )?;
            // SAFETY: freshly allocated for `T` under the same descriptor.
            unsafe { copy.write_native(value) };
            Some(copy)
        }
        None => Some(instance.retain()),
    }
}

fn finalize_shim<T: NativeType>(instance: &mut Instance) {
    // SAFETY: the finalizer runs exactly once, and typed instances always
    // hold an initialised `T`.
    unsafe { instance.drop_native::<T>() }
}

/// Builds the descriptor registered for `T`.
pub(crate) fn native_descriptor<T: NativeType>() -> TypeDescriptor {
    const { assert!(mem::align_of::<T>() <= PAYLOAD_ALIGN) };

    let mut descriptor = TypeDescriptor::new(T::TYPE_NAME)
        .with_copy(copy_shim::<T>)
        .with_finalize(finalize_shim::<T>)
        .with_equal(equal_shim::<T>)
        .with_hash(hash_shim::<T>)
        .with_describe(describe_shim::<T>);
    descriptor.native = Some(std::any::TypeId::of::<T>());
    descriptor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::descriptor::TypeId;
    use oxidef_mem::default_allocator;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static DROPS: AtomicUsize = AtomicUsize::new(0);

    struct Tracked(u32);

    struct Sentinel;

    impl Drop for Sentinel {
        fn drop(&mut self) {
            DROPS.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl NativeType for Sentinel {
        const TYPE_NAME: &'static str = "Sentinel";
    }

    impl NativeType for Tracked {
        const TYPE_NAME: &'static str = "Tracked";

        fn native_equal(&self, other: &Self) -> bool {
            self.0 == other.0
        }

        fn native_hash(&self) -> Option<u64> {
            Some(u64::from(self.0))
        }

        fn native_copy(&self) -> Option<Self> {
            Some(Tracked(self.0))
        }
    }

    fn create<T: NativeType>(value: T) -> Instance {
        let descriptor = Arc::new(native_descriptor::<T>());
        let mut instance = Instance::allocate(
            &default_allocator(),
            TypeId::new(1).unwrap(),
            descriptor,
            None,
            mem::size_of::<T>(),
        )
        .unwrap();
        unsafe { instance.write_native(value) };
        instance
    }

    #[test]
    fn test_descriptor_is_native() {
        let descriptor = native_descriptor::<Tracked>();
        assert!(descriptor.is_native());
        assert_eq!(descriptor.name(), "Tracked");
    }

    #[test]
    fn test_shims_forward_to_trait() {
        let a = create(Tracked(3));
        let b = create(Tracked(3));
        assert!(equal_shim::<Tracked>(&a, &b));
        assert_eq!(hash_shim::<Tracked>(&a), 3);
        assert!(describe_shim::<Tracked>(&a).starts_with("<Tracked: 0x"));
    }

    #[test]
    fn test_finalize_drops_value_once() {
        let before = DROPS.load(Ordering::SeqCst);
        let a = create(Sentinel);
        let b = a.retain();
        drop(a);
        assert_eq!(DROPS.load(Ordering::SeqCst), before);
        drop(b);
        assert_eq!(DROPS.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn test_copy_makes_distinct_instance() {
        let a = create(Tracked(8));
        let copy = copy_shim::<Tracked>(&a, &default_allocator()).unwrap();
        assert!(!copy.ptr_eq(&a));
        assert_eq!(copy.downcast_ref::<Tracked>().unwrap().0, 8);
        assert_eq!(a.retain_count(), 1);
    }

    #[test]
    fn test_builtin_impls() {
        let a = create(String::from("key"));
        let b = create(String::from("key"));
        assert!(equal_shim::<String>(&a, &b));
        assert_eq!(hash_shim::<String>(&a), hash_shim::<String>(&b));
        assert_eq!(describe_shim::<String>(&a), "key");

        let n = create(-3i32);
        assert_eq!(describe_shim::<i32>(&n), "-3");
        assert_eq!(<i32 as NativeType>::TYPE_NAME, "i32");
    }

    #[test]
    fn test_downcast_rejects_other_types() {
        let a = create(Tracked(2));
        assert!(a.downcast_ref::<u32>().is_none());
        let mut a = a;
        a.get_mut::<Tracked>().unwrap().0 = 5;
        assert_eq!(a.downcast_ref::<Tracked>().unwrap().0, 5);
    }
}
