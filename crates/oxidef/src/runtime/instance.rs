//! Instance layout and reference counting.
//!
//! Every runtime instance is a single allocation: an `InstanceHeader`
//! followed by the payload. The header has two parts:
//!
//! - a hidden ownership prefix: the allocator the instance was carved from
//!   and a signed count of *extra* retains beyond the creator's
//! - a visible base record: type id, foreign class token and the flags word
//!
//! [`Instance`] is the owning handle. Cloning it retains, dropping it
//! releases; the release that takes the count below zero runs the type's
//! finalizer and hands the memory back to the recorded allocator.
//!
//! # Memory Layout
//!
//! ```text
//! +-----------------------------+  <- allocation (16-byte aligned)
//! | allocator: Option<Arc<..>>  |
//! | extra_retains: AtomicIsize  |
//! | payload_size: usize         |
//! | descriptor: Arc<..>         |
//! | type_id | flags | foreign   |
//! +-----------------------------+  <- payload (16-byte aligned)
//! | payload bytes ...           |
//! +-----------------------------+
//! ```
//!
//! # Constant instances
//!
//! An instance stamped into caller-owned static memory carries
//! [`FLAG_CONSTANT`]. Its counter is never touched, it is never finalized or
//! freed, and its retain count reads as `usize::MAX`.

use crate::runtime::bridge::ForeignClass;
use crate::runtime::descriptor::{TypeDescriptor, TypeId};
use oxidef_mem::AllocatorRef;
use std::alloc::Layout;
use std::fmt;
use std::mem::{self, MaybeUninit};
use std::ptr::{self, NonNull};
use std::sync::Arc;
use std::sync::atomic::{AtomicIsize, AtomicU32, Ordering};

/// Read-only bit: the instance is constant and never deallocated.
pub const FLAG_CONSTANT: u32 = 1 << 0;

/// First bit available for type-specific info.
pub const INFO_SHIFT: u32 = 8;

/// Info bit: the instance is a mutable variant of its type.
pub const INFO_MUTABLE: u32 = 1 << INFO_SHIFT;

/// Info bit: the instance stores its contents inline after the header.
pub const INFO_INLINE: u32 = 1 << (INFO_SHIFT + 1);

/// Bits reserved for the runtime itself.
const RUNTIME_FLAGS_MASK: u32 = (1 << INFO_SHIFT) - 1;

/// Alignment of every instance allocation and of the payload.
pub const PAYLOAD_ALIGN: usize = 16;

/// Retains past this are treated as a leak and abort the operation.
const MAX_EXTRA_RETAINS: isize = isize::MAX / 2;

/// Visible base record of an instance.
#[repr(C)]
pub(crate) struct InstanceBase {
    type_id: TypeId,
    flags: AtomicU32,
    foreign_class: Option<ForeignClass>,
}

/// Header placed in front of every payload.
#[repr(C, align(16))]
pub(crate) struct InstanceHeader {
    /// `None` only for constant instances.
    allocator: Option<AllocatorRef>,
    /// Retains beyond the creator's; -1 while finalizing.
    extra_retains: AtomicIsize,
    payload_size: usize,
    descriptor: Arc<TypeDescriptor>,
    base: InstanceBase,
}

impl InstanceHeader {
    #[inline]
    fn is_constant(&self) -> bool {
        self.base.flags.load(Ordering::Relaxed) & FLAG_CONSTANT != 0
    }
}

const HEADER_SIZE: usize = mem::size_of::<InstanceHeader>();

/// Caller-owned storage for a constant instance with `N` payload bytes.
///
/// Stamp it with
/// [`Runtime::init_static_instance`](crate::runtime::Runtime::init_static_instance).
///
/// # Example
///
/// ```rust
/// use oxidef::runtime::{Runtime, StaticInstance, TypeDescriptor};
/// use oxidef::RuntimeConfig;
///
/// let runtime = Runtime::new(RuntimeConfig::default());
/// let boolean = runtime.register_type(TypeDescriptor::new("Boolean")).unwrap();
///
/// let slot: &'static mut StaticInstance<1> = Box::leak(Box::new(StaticInstance::new([1])));
/// let truth = runtime.init_static_instance(slot, boolean);
///
/// assert!(truth.is_constant());
/// assert_eq!(truth.retain_count(), usize::MAX);
/// assert_eq!(truth.payload(), &[1]);
/// ```
#[repr(C)]
pub struct StaticInstance<const N: usize> {
    header: MaybeUninit<InstanceHeader>,
    payload: [u8; N],
}

impl<const N: usize> StaticInstance<N> {
    /// Creates unstamped storage holding `payload`.
    #[must_use]
    pub const fn new(payload: [u8; N]) -> Self {
        StaticInstance {
            header: MaybeUninit::uninit(),
            payload,
        }
    }
}

/// Owning handle to a runtime instance.
///
/// `Clone` is a retain and `Drop` is a release. Both are atomic, so handles
/// to the same instance may be cloned and dropped from any number of
/// threads. Everything else about the payload follows the usual borrow
/// rules: mutable access requires the handle to be the only owner.
pub struct Instance {
    ptr: NonNull<InstanceHeader>,
}

// SAFETY: the reference count is atomic, the header is immutable apart from
// atomics, and mutable payload access requires unique ownership. Typed
// payloads are restricted to `Send + Sync` types.
unsafe impl Send for Instance {}
// SAFETY: see above.
unsafe impl Sync for Instance {}

impl Instance {
    /// Allocates a zeroed instance from `allocator`.
    ///
    /// Returns `None` if the size overflows or the allocator refuses.
    pub(crate) fn allocate(
        allocator: &AllocatorRef,
        type_id: TypeId,
        descriptor: Arc<TypeDescriptor>,
        foreign_class: Option<ForeignClass>,
        extra_bytes: usize,
    ) -> Option<Instance> {
        let layout = Self::layout_for(extra_bytes)?;
        let raw = allocator.allocate_zeroed(layout)?;
        let ptr = raw.cast::<InstanceHeader>();

        // SAFETY: `raw` is a fresh, suitably aligned block of at least
        // HEADER_SIZE bytes.
        unsafe {
            ptr.as_ptr().write(InstanceHeader {
                allocator: Some(Arc::clone(allocator)),
                extra_retains: AtomicIsize::new(0),
                payload_size: extra_bytes,
                descriptor,
                base: InstanceBase {
                    type_id,
                    flags: AtomicU32::new(0),
                    foreign_class,
                },
            });
        }

        Some(Instance { ptr })
    }

    /// Stamps caller-owned static storage as a constant instance.
    pub(crate) fn stamp_static<const N: usize>(
        slot: &'static mut StaticInstance<N>,
        type_id: TypeId,
        descriptor: Arc<TypeDescriptor>,
        foreign_class: Option<ForeignClass>,
    ) -> Instance {
        slot.header.write(InstanceHeader {
            allocator: None,
            extra_retains: AtomicIsize::new(0),
            payload_size: N,
            descriptor,
            base: InstanceBase {
                type_id,
                flags: AtomicU32::new(FLAG_CONSTANT),
                foreign_class,
            },
        });
        Instance {
            ptr: NonNull::from(slot).cast(),
        }
    }

    fn layout_for(extra_bytes: usize) -> Option<Layout> {
        let total = HEADER_SIZE.checked_add(extra_bytes)?;
        Layout::from_size_align(total, PAYLOAD_ALIGN).ok()
    }

    #[inline]
    fn header(&self) -> &InstanceHeader {
        // SAFETY: the header stays valid for as long as any handle exists.
        unsafe { self.ptr.as_ref() }
    }

    /// The type this instance was created as.
    #[inline]
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.header().base.type_id
    }

    /// The descriptor captured at creation.
    ///
    /// Unregistering the type later does not affect live instances.
    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.header().descriptor
    }

    pub(crate) fn descriptor_arc(&self) -> &Arc<TypeDescriptor> {
        &self.header().descriptor
    }

    /// Display name of the instance's type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.descriptor().name()
    }

    /// External class token stamped at creation, if a bridge paired one.
    #[must_use]
    pub fn foreign_class(&self) -> Option<ForeignClass> {
        self.header().base.foreign_class
    }

    /// Allocator the instance came from; `None` for constant instances.
    #[must_use]
    pub fn allocator(&self) -> Option<&AllocatorRef> {
        self.header().allocator.as_ref()
    }

    /// `true` for constant (static) instances.
    #[inline]
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.header().is_constant()
    }

    /// The raw flags word.
    #[must_use]
    pub fn flags(&self) -> u32 {
        self.header().base.flags.load(Ordering::Acquire)
    }

    /// `true` if every bit of `mask` is set.
    #[must_use]
    pub fn has_info(&self, mask: u32) -> bool {
        self.flags() & mask == mask
    }

    /// Sets or clears type-specific info bits.
    ///
    /// # Panics
    ///
    /// Panics if `mask` touches the runtime's own bits (0..8).
    pub fn set_info(&self, mask: u32, on: bool) {
        assert!(
            mask & RUNTIME_FLAGS_MASK == 0,
            "info mask {mask:#x} overlaps runtime flags"
        );
        let flags = &self.header().base.flags;
        if on {
            flags.fetch_or(mask, Ordering::AcqRel);
        } else {
            flags.fetch_and(!mask, Ordering::AcqRel);
        }
    }

    /// Number of owners, or `usize::MAX` for constant instances.
    #[must_use]
    pub fn retain_count(&self) -> usize {
        if self.is_constant() {
            return usize::MAX;
        }
        let extra = self.header().extra_retains.load(Ordering::Acquire);
        usize::try_from(extra + 1).unwrap_or(0)
    }

    /// `true` if this handle is the only owner (always false for constants).
    ///
    /// Also true inside a finalizer.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        !self.is_constant() && self.header().extra_retains.load(Ordering::Acquire) <= 0
    }

    /// Adds an owner and returns the new handle.
    ///
    /// A no-op for constant instances.
    ///
    /// # Panics
    ///
    /// Panics if the instance is being finalized or the count overflows.
    #[must_use]
    pub fn retain(&self) -> Instance {
        let header = self.header();
        if !header.is_constant() {
            let old = header.extra_retains.fetch_add(1, Ordering::Relaxed);
            if !(0..MAX_EXTRA_RETAINS).contains(&old) {
                header.extra_retains.fetch_sub(1, Ordering::Relaxed);
                panic!(
                    "retain of {} instance with invalid count {}",
                    header.descriptor.name(),
                    old
                );
            }
        }
        Instance { ptr: self.ptr }
    }

    /// Drops this owner. The last release finalizes and frees the instance.
    pub fn release(self) {
        drop(self);
    }

    /// Address of the instance, used for identity.
    #[inline]
    #[must_use]
    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Identity hash: the address with its alignment bits shifted out.
    #[inline]
    #[must_use]
    pub fn identity_hash(&self) -> u64 {
        (self.addr() >> 4) as u64
    }

    /// `true` if both handles name the same instance.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        self.ptr == other.ptr
    }

    /// Consumes the handle without releasing it.
    #[must_use]
    pub fn into_raw(self) -> *const () {
        let raw = self.ptr.as_ptr() as *const ();
        mem::forget(self);
        raw
    }

    /// Rebuilds a handle from [`Instance::into_raw`].
    ///
    /// # Safety
    ///
    /// `raw` must come from `into_raw` and carry one owner that has not yet
    /// been reclaimed.
    #[must_use]
    pub unsafe fn from_raw(raw: *const ()) -> Instance {
        Instance {
            // SAFETY: `into_raw` never returns null.
            ptr: unsafe { NonNull::new_unchecked(raw as *mut InstanceHeader) },
        }
    }

    /// Size of the payload in bytes.
    #[must_use]
    pub fn payload_size(&self) -> usize {
        self.header().payload_size
    }

    #[inline]
    fn payload_ptr(&self) -> *mut u8 {
        // SAFETY: the payload starts right after the header inside the
        // same allocation.
        unsafe { self.ptr.as_ptr().cast::<u8>().add(HEADER_SIZE) }
    }

    /// Payload bytes of an untyped instance.
    ///
    /// # Panics
    ///
    /// Panics for typed instances; use [`Instance::downcast_ref`].
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        assert!(
            !self.descriptor().is_native(),
            "typed {} instance has no byte payload",
            self.type_name()
        );
        // SAFETY: `payload_size` initialised (zeroed or static) bytes follow
        // the header.
        unsafe { std::slice::from_raw_parts(self.payload_ptr(), self.payload_size()) }
    }

    /// Mutable payload bytes, if this handle is the only owner.
    #[must_use]
    pub fn payload_mut(&mut self) -> Option<&mut [u8]> {
        if !self.is_unique() || self.descriptor().is_native() {
            return None;
        }
        // SAFETY: unique ownership, and `&mut self` excludes other borrows
        // through this handle.
        Some(unsafe { std::slice::from_raw_parts_mut(self.payload_ptr(), self.payload_size()) })
    }

    fn holds<T: 'static>(&self) -> bool {
        self.descriptor().native == Some(std::any::TypeId::of::<T>())
            && self.payload_size() >= mem::size_of::<T>()
    }

    /// Writes the typed value of a fresh instance.
    ///
    /// # Safety
    ///
    /// The instance must have been allocated for `T` and not yet hold a
    /// value.
    pub(crate) unsafe fn write_native<T: 'static>(&mut self, value: T) {
        debug_assert!(self.holds::<T>());
        // SAFETY: caller contract; the payload is 16-byte aligned and large
        // enough.
        unsafe { self.payload_ptr().cast::<T>().write(value) }
    }

    /// Drops the typed value in place during finalization.
    ///
    /// # Safety
    ///
    /// Must be called at most once, from the finalizer, on an instance
    /// holding a `T`.
    pub(crate) unsafe fn drop_native<T: 'static>(&mut self) {
        debug_assert!(self.holds::<T>());
        // SAFETY: caller contract.
        unsafe { ptr::drop_in_place(self.payload_ptr().cast::<T>()) }
    }

    /// Borrows the typed payload if the instance holds a `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        if !self.holds::<T>() {
            return None;
        }
        // SAFETY: typed instances are written before they are handed out.
        Some(unsafe { &*self.payload_ptr().cast::<T>() })
    }

    /// Mutably borrows the typed payload if the instance holds a `T` and
    /// this handle is the only owner.
    #[must_use]
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        if !self.holds::<T>() || !self.is_unique() {
            return None;
        }
        // SAFETY: unique ownership plus `&mut self`.
        Some(unsafe { &mut *self.payload_ptr().cast::<T>() })
    }

    /// Runs the finalizer and frees the memory.
    ///
    /// # Safety
    ///
    /// The counter must have just dropped below zero through this handle.
    unsafe fn destroy(&mut self) {
        if let Some(finalize) = self.descriptor().finalize {
            finalize(self);
        }

        let ptr = self.ptr;
        let payload_size = self.payload_size();
        let allocator = self.header().allocator.clone();

        // SAFETY: no other handle exists; the header fields are dropped
        // exactly once here.
        unsafe { ptr::drop_in_place(ptr.as_ptr()) };

        if let (Some(allocator), Some(layout)) = (allocator, Self::layout_for(payload_size)) {
            // SAFETY: `ptr` was allocated from `allocator` with this layout.
            unsafe { allocator.deallocate(ptr.cast(), layout) };
        }
    }
}

impl Clone for Instance {
    fn clone(&self) -> Self {
        self.retain()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        let header = self.header();
        if header.is_constant() {
            return;
        }
        let old = header.extra_retains.fetch_sub(1, Ordering::AcqRel);
        if old > 0 {
            return;
        }
        assert!(
            old == 0,
            "over-release of instance of type {}",
            header.base.type_id
        );
        // SAFETY: the count went from 0 to -1: we were the last owner.
        unsafe { self.destroy() };
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_name())
            .field("type_id", &self.type_id())
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("retain_count", &self.retain_count())
            .finish()
    }
}
