//! The allocator seam used by runtime instances.
//!
//! An [`Allocator`] is chosen when an instance is created and stays fixed for
//! that instance's lifetime: every later reallocation or free of the
//! instance's own memory and buffers goes back through the same allocator.
//! Instances hold it as an [`AllocatorRef`] so the allocator outlives
//! everything carved out of it.
//!
//! # Example
//!
//! ```rust
//! use oxidef_mem::{Allocator, default_allocator};
//! use std::alloc::Layout;
//!
//! let alloc = default_allocator();
//! let layout = Layout::from_size_align(64, 16).unwrap();
//! let ptr = alloc.allocate_zeroed(layout).expect("allocation failed");
//!
//! unsafe {
//!     assert_eq!(*ptr.as_ptr(), 0);
//!     alloc.deallocate(ptr, layout);
//! }
//! ```

use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};
use std::sync::{Arc, OnceLock};

/// Shared handle to an allocator.
pub type AllocatorRef = Arc<dyn Allocator>;

/// Raw memory provider.
///
/// Implementations must be thread-safe: instances created from the same
/// allocator may be released on different threads.
///
/// Callers never pass zero-sized layouts.
pub trait Allocator: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &str {
        "custom"
    }

    /// Allocates uninitialised memory for `layout`.
    ///
    /// Returns `None` if the request cannot be satisfied. Must not panic on
    /// exhaustion.
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Allocates memory for `layout` and fills it with zero bytes.
    fn allocate_zeroed(&self, layout: Layout) -> Option<NonNull<u8>> {
        let ptr = self.allocate(layout)?;
        // SAFETY: `ptr` was just returned for `layout`, so `layout.size()`
        // bytes starting at it are writable.
        unsafe { ptr::write_bytes(ptr.as_ptr(), 0, layout.size()) };
        Some(ptr)
    }

    /// Resizes a block to `new_size` bytes, keeping the alignment of
    /// `old_layout` and the first `min(old, new)` bytes of content.
    ///
    /// On `None` the original block is untouched and still owned by the
    /// caller.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this allocator for `old_layout` and
    /// not yet deallocated.
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        let new_layout =
            Layout::from_size_align(new_size, old_layout.align()).ok()?;
        let new_ptr = self.allocate(new_layout)?;
        // SAFETY: both blocks are live, distinct, and at least
        // `min(old, new)` bytes long.
        unsafe {
            ptr::copy_nonoverlapping(
                ptr.as_ptr(),
                new_ptr.as_ptr(),
                old_layout.size().min(new_size),
            );
            self.deallocate(ptr, old_layout);
        }
        Some(new_ptr)
    }

    /// Returns a block to the allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this allocator for `layout` and not
    /// yet deallocated.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The process allocator (`std::alloc`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    fn name(&self) -> &str {
        "system"
    }

    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.size() == 0 {
            return None;
        }
        // SAFETY: layout has a non-zero size.
        NonNull::new(unsafe { alloc::alloc(layout) })
    }

    fn allocate_zeroed(&self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.size() == 0 {
            return None;
        }
        // SAFETY: layout has a non-zero size.
        NonNull::new(unsafe { alloc::alloc_zeroed(layout) })
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        if new_size == 0 {
            return None;
        }
        // Reject sizes that would overflow isize once rounded to alignment.
        Layout::from_size_align(new_size, old_layout.align()).ok()?;
        // SAFETY: the caller guarantees `ptr`/`old_layout` came from us; the
        // new size is non-zero and valid for the alignment.
        NonNull::new(unsafe { alloc::realloc(ptr.as_ptr(), old_layout, new_size) })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded caller contract.
        unsafe { alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

/// Returns the process-wide default allocator.
///
/// Created on first use; every call returns a handle to the same
/// [`SystemAllocator`].
#[must_use]
pub fn default_allocator() -> AllocatorRef {
    static DEFAULT: OnceLock<AllocatorRef> = OnceLock::new();
    DEFAULT.get_or_init(|| Arc::new(SystemAllocator)).clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allocator_is_shared() {
        let a = default_allocator();
        let b = default_allocator();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), "system");
    }

    #[test]
    fn test_system_allocate_zeroed() {
        let alloc = SystemAllocator;
        let layout = Layout::from_size_align(128, 16).unwrap();
        let ptr = alloc.allocate_zeroed(layout).unwrap();

        // SAFETY: 128 zeroed bytes were just allocated.
        unsafe {
            let bytes = std::slice::from_raw_parts(ptr.as_ptr(), 128);
            assert!(bytes.iter().all(|&b| b == 0));
            alloc.deallocate(ptr, layout);
        }
    }

    #[test]
    fn test_system_reallocate_keeps_prefix() {
        let alloc = SystemAllocator;
        let layout = Layout::from_size_align(8, 8).unwrap();
        let ptr = alloc.allocate(layout).unwrap();

        unsafe {
            for i in 0..8u8 {
                ptr.as_ptr().add(i as usize).write(i);
            }
            let grown = alloc.reallocate(ptr, layout, 64).unwrap();
            let bytes = std::slice::from_raw_parts(grown.as_ptr(), 8);
            assert_eq!(bytes, &[0, 1, 2, 3, 4, 5, 6, 7]);
            alloc.deallocate(grown, Layout::from_size_align(64, 8).unwrap());
        }
    }

    #[test]
    fn test_zero_sized_requests_fail() {
        let alloc = SystemAllocator;
        let layout = Layout::from_size_align(0, 8).unwrap();
        assert!(alloc.allocate(layout).is_none());
        assert!(alloc.allocate_zeroed(layout).is_none());
    }
}
