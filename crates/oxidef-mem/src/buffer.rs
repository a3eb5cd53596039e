//! Typed, uninitialised storage owned through an [`Allocator`].
//!
//! [`RawBuffer`] is the backing store of the runtime's collections. It only
//! owns memory: it never reads, writes or drops elements. The owning
//! container tracks which slots are initialised and drops them itself
//! before the buffer goes away.

use crate::allocator::AllocatorRef;
use crate::error::AllocError;
use std::alloc::Layout;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

/// Allocator-backed storage for up to `capacity` values of `T`.
pub struct RawBuffer<T> {
    ptr: NonNull<T>,
    capacity: usize,
    allocator: AllocatorRef,
    _marker: PhantomData<T>,
}

impl<T> RawBuffer<T> {
    const IS_ZST: bool = mem::size_of::<T>() == 0;

    /// Creates an empty buffer that allocates nothing until it grows.
    #[must_use]
    pub fn new_in(allocator: AllocatorRef) -> Self {
        RawBuffer {
            ptr: NonNull::dangling(),
            capacity: if Self::IS_ZST { usize::MAX } else { 0 },
            allocator,
            _marker: PhantomData,
        }
    }

    /// Creates a buffer with room for exactly `capacity` values.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::CapacityOverflow`] if the layout would overflow,
    /// or [`AllocError::OutOfMemory`] if the allocator refuses the request.
    pub fn try_with_capacity_in(
        capacity: usize,
        allocator: AllocatorRef,
    ) -> Result<Self, AllocError> {
        let mut buffer = Self::new_in(allocator);
        if capacity > 0 {
            buffer.try_resize(capacity)?;
        }
        Ok(buffer)
    }

    /// Number of values the buffer can hold.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The allocator this buffer was created with.
    #[must_use]
    pub fn allocator(&self) -> &AllocatorRef {
        &self.allocator
    }

    /// Pointer to the first slot.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Mutable pointer to the first slot.
    #[inline]
    #[must_use]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Resizes the storage to exactly `new_capacity` slots, keeping the
    /// contents of the first `min(old, new)` slots.
    ///
    /// The caller must have dropped or moved out any initialised values in
    /// slots at or beyond `new_capacity` before shrinking.
    ///
    /// # Errors
    ///
    /// On error the buffer is unchanged.
    pub fn try_resize(&mut self, new_capacity: usize) -> Result<(), AllocError> {
        if Self::IS_ZST || new_capacity == self.capacity {
            return Ok(());
        }
        if new_capacity == 0 {
            self.release();
            return Ok(());
        }

        let new_layout =
            Layout::array::<T>(new_capacity).map_err(|_| AllocError::CapacityOverflow)?;
        let requested = new_layout.size();

        let raw = if self.capacity == 0 {
            self.allocator.allocate(new_layout)
        } else {
            let old_layout = Self::layout(self.capacity);
            // SAFETY: `ptr` was allocated by `allocator` with `old_layout`
            // and is still live.
            unsafe {
                self.allocator
                    .reallocate(self.ptr.cast(), old_layout, requested)
            }
        };

        let raw = raw.ok_or(AllocError::OutOfMemory { requested })?;
        self.ptr = raw.cast();
        self.capacity = new_capacity;
        Ok(())
    }

    /// Layout of `capacity` slots; only called for capacities that were
    /// already validated.
    fn layout(capacity: usize) -> Layout {
        Layout::array::<T>(capacity).expect("validated capacity")
    }

    /// Returns the storage to the allocator.
    fn release(&mut self) {
        if Self::IS_ZST || self.capacity == 0 {
            return;
        }
        let layout = Self::layout(self.capacity);
        // SAFETY: `ptr` was allocated by `allocator` with `layout`.
        unsafe { self.allocator.deallocate(self.ptr.cast(), layout) };
        self.ptr = NonNull::dangling();
        self.capacity = 0;
    }
}

impl<T> Drop for RawBuffer<T> {
    fn drop(&mut self) {
        self.release();
    }
}

// SAFETY: RawBuffer owns its storage exclusively, like `Vec<T>`.
unsafe impl<T: Send> Send for RawBuffer<T> {}
unsafe impl<T: Sync> Sync for RawBuffer<T> {}

impl<T> std::fmt::Debug for RawBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawBuffer")
            .field("capacity", &self.capacity)
            .field("allocator", &self.allocator.name())
            .finish()
    }
}
