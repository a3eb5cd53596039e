//! Element policies for the collection engine.
//!
//! A collection stores opaque values and asks a [`Callbacks`] policy how to
//! retain, release, compare, hash and describe them. The policy is chosen
//! per collection at construction; a null [`CallbackSet`] means identity
//! equality, identity hashing and plain clone/drop ownership.

use crate::runtime::{Instance, Object};
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::sync::Arc;

/// A value a collection can hold.
///
/// Cloning must preserve identity: a clone of a value is [`Opaque::same`]
/// as the original.
pub trait Opaque: Clone {
    /// Word identifying this value (an address, or the value itself for
    /// plain words). Equal for [`Opaque::same`] values; distinct values may
    /// share a word.
    fn identity(&self) -> usize;

    /// Exact identity: the same value, or the same object.
    fn same(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

macro_rules! impl_opaque_word {
    ($($ty:ty),* $(,)?) => {$(
        impl Opaque for $ty {
            #[inline]
            fn identity(&self) -> usize {
                *self as usize
            }
        }
    )*};
}

impl_opaque_word!(usize, isize, u32, i32, u16, i16, u8, i8);

macro_rules! impl_opaque_wide {
    ($($ty:ty),* $(,)?) => {$(
        impl Opaque for $ty {
            #[inline]
            #[cfg(target_pointer_width = "64")]
            fn identity(&self) -> usize {
                *self as usize
            }

            // Fold the high half in where a word is narrower.
            #[cfg(not(target_pointer_width = "64"))]
            fn identity(&self) -> usize {
                let bits = *self as u64;
                (bits ^ (bits >> 32)) as usize
            }

            #[inline]
            fn same(&self, other: &Self) -> bool {
                self == other
            }
        }
    )*};
}

impl_opaque_wide!(u64, i64);

impl Opaque for () {
    fn identity(&self) -> usize {
        0
    }
}

impl Opaque for bool {
    fn identity(&self) -> usize {
        usize::from(*self)
    }
}

impl Opaque for char {
    fn identity(&self) -> usize {
        *self as usize
    }
}

impl Opaque for &'static str {
    fn identity(&self) -> usize {
        (self.as_ptr() as usize) ^ self.len().rotate_left(usize::BITS / 2)
    }

    fn same(&self, other: &Self) -> bool {
        std::ptr::eq(*self, *other)
    }
}

impl<T: ?Sized> Opaque for Arc<T> {
    fn identity(&self) -> usize {
        Arc::as_ptr(self).cast::<()>() as usize
    }

    fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl Opaque for Instance {
    fn identity(&self) -> usize {
        self.addr()
    }
}

impl Opaque for Object {
    fn identity(&self) -> usize {
        self.addr()
    }
}

/// Retain / release / equal / hash / describe policy for values of `T`.
///
/// Every method has an identity default.
pub trait Callbacks<T: Opaque>: Send + Sync {
    /// Produces a new owner of `value`.
    fn retain(&self, value: &T) -> T {
        value.clone()
    }

    /// Gives up an owner.
    fn release(&self, value: T) {
        drop(value);
    }

    /// Equality; [`Opaque::same`] by default.
    fn equal(&self, a: &T, b: &T) -> bool {
        a.same(b)
    }

    /// Hash consistent with [`Callbacks::equal`]; the identity word by
    /// default.
    fn hash(&self, value: &T) -> u64 {
        value.identity() as u64
    }

    /// Description; the identity word in hex by default.
    fn describe(&self, value: &T) -> String {
        format!("{:#x}", value.identity())
    }
}

/// The null policy.
struct Identity;

impl<T: Opaque> Callbacks<T> for Identity {}

/// A shared, possibly null, policy.
pub struct CallbackSet<T: Opaque> {
    inner: Option<Arc<dyn Callbacks<T>>>,
}

impl<T: Opaque> CallbackSet<T> {
    /// The null set: identity semantics.
    #[must_use]
    pub fn null() -> Self {
        CallbackSet { inner: None }
    }

    /// Wraps a policy.
    pub fn new(callbacks: impl Callbacks<T> + 'static) -> Self {
        CallbackSet {
            inner: Some(Arc::new(callbacks)),
        }
    }

    /// `true` for the null set.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    #[inline]
    fn policy(&self) -> &dyn Callbacks<T> {
        match &self.inner {
            Some(callbacks) => callbacks.as_ref(),
            None => &Identity,
        }
    }

    /// See [`Callbacks::retain`].
    #[inline]
    pub fn retain(&self, value: &T) -> T {
        self.policy().retain(value)
    }

    /// See [`Callbacks::release`].
    #[inline]
    pub fn release(&self, value: T) {
        self.policy().release(value);
    }

    /// See [`Callbacks::equal`]. An installed policy decides alone.
    #[inline]
    pub fn equal(&self, a: &T, b: &T) -> bool {
        self.policy().equal(a, b)
    }

    /// See [`Callbacks::hash`].
    #[inline]
    pub fn hash(&self, value: &T) -> u64 {
        self.policy().hash(value)
    }

    /// See [`Callbacks::describe`].
    pub fn describe(&self, value: &T) -> String {
        self.policy().describe(value)
    }
}

impl<T: Opaque> Clone for CallbackSet<T> {
    fn clone(&self) -> Self {
        CallbackSet {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Opaque> Default for CallbackSet<T> {
    fn default() -> Self {
        CallbackSet::null()
    }
}

impl<T: Opaque> fmt::Debug for CallbackSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_null() {
            "CallbackSet(null)"
        } else {
            "CallbackSet(custom)"
        })
    }
}

/// Policy for runtime objects: retain and release are the object's own
/// reference count, and equality, hash and description dispatch through
/// the object's type.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectCallbacks;

impl Callbacks<Object> for ObjectCallbacks {
    fn equal(&self, a: &Object, b: &Object) -> bool {
        a.equal(b)
    }

    fn hash(&self, value: &Object) -> u64 {
        value.hash_value()
    }

    fn describe(&self, value: &Object) -> String {
        value.describe()
    }
}

impl CallbackSet<Object> {
    /// Shorthand for `CallbackSet::new(ObjectCallbacks)`.
    #[must_use]
    pub fn objects() -> Self {
        CallbackSet::new(ObjectCallbacks)
    }
}

/// Policy for plain Rust values: `Eq`, `Hash` (through `FxHasher`) and
/// `Debug`.
pub struct ValueCallbacks<T>(std::marker::PhantomData<fn(&T)>);

impl<T> ValueCallbacks<T> {
    /// Creates the policy.
    #[must_use]
    pub fn new() -> Self {
        ValueCallbacks(std::marker::PhantomData)
    }
}

impl<T> Default for ValueCallbacks<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Callbacks<T> for ValueCallbacks<T>
where
    T: Opaque + Eq + Hash + Debug,
{
    fn equal(&self, a: &T, b: &T) -> bool {
        a == b
    }

    fn hash(&self, value: &T) -> u64 {
        fxhash::hash64(value)
    }

    fn describe(&self, value: &T) -> String {
        format!("{value:?}")
    }
}

impl<T> CallbackSet<T>
where
    T: Opaque + Eq + Hash + Debug + 'static,
{
    /// Shorthand for `CallbackSet::new(ValueCallbacks::new())`.
    #[must_use]
    pub fn values() -> Self {
        CallbackSet::new(ValueCallbacks::<T>::new())
    }
}
