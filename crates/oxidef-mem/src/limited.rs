//! Budgeted allocator with live-allocation accounting.
//!
//! [`LimitedAllocator`] wraps another allocator, refuses requests that would
//! push the outstanding byte count past a budget, and counts allocations and
//! frees. Hosts use it to cap the memory a subsystem may hold; tests use it
//! to force allocation failure and to prove that every byte handed out was
//! returned.

use crate::allocator::{Allocator, AllocatorRef};
use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters kept by a [`LimitedAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AllocStats {
    /// Successful allocations (reallocations count once more).
    pub allocations: usize,
    /// Blocks returned.
    pub deallocations: usize,
    /// Requests refused because of the budget or the inner allocator.
    pub failures: usize,
    /// Bytes currently outstanding.
    pub live_bytes: usize,
}

/// An allocator that enforces a byte budget on top of another allocator.
pub struct LimitedAllocator {
    inner: AllocatorRef,
    limit: usize,
    live_bytes: AtomicUsize,
    allocations: AtomicUsize,
    deallocations: AtomicUsize,
    failures: AtomicUsize,
}

impl LimitedAllocator {
    /// Wraps `inner` with a budget of `limit` outstanding bytes.
    #[must_use]
    pub fn new(inner: AllocatorRef, limit: usize) -> Self {
        LimitedAllocator {
            inner,
            limit,
            live_bytes: AtomicUsize::new(0),
            allocations: AtomicUsize::new(0),
            deallocations: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    /// Wraps `inner` without a budget, keeping only the accounting.
    #[must_use]
    pub fn unlimited(inner: AllocatorRef) -> Self {
        Self::new(inner, usize::MAX)
    }

    /// Returns the configured budget in bytes.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns a snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> AllocStats {
        AllocStats {
            allocations: self.allocations.load(Ordering::Relaxed),
            deallocations: self.deallocations.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            live_bytes: self.live_bytes.load(Ordering::Acquire),
        }
    }

    /// Reserves `size` bytes of budget; `false` if it would overflow.
    fn reserve(&self, size: usize) -> bool {
        let reserved = self.live_bytes.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |live| live.checked_add(size).filter(|&total| total <= self.limit),
        );
        if reserved.is_err() {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        reserved.is_ok()
    }

    fn unreserve(&self, size: usize) {
        self.live_bytes.fetch_sub(size, Ordering::AcqRel);
    }
}

impl Allocator for LimitedAllocator {
    fn name(&self) -> &str {
        "limited"
    }

    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        if !self.reserve(layout.size()) {
            return None;
        }
        match self.inner.allocate(layout) {
            Some(ptr) => {
                self.allocations.fetch_add(1, Ordering::Relaxed);
                Some(ptr)
            }
            None => {
                self.unreserve(layout.size());
                self.failures.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn allocate_zeroed(&self, layout: Layout) -> Option<NonNull<u8>> {
        if !self.reserve(layout.size()) {
            return None;
        }
        match self.inner.allocate_zeroed(layout) {
            Some(ptr) => {
                self.allocations.fetch_add(1, Ordering::Relaxed);
                Some(ptr)
            }
            None => {
                self.unreserve(layout.size());
                self.failures.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        let old_size = old_layout.size();
        if new_size > old_size && !self.reserve(new_size - old_size) {
            return None;
        }
        // SAFETY: forwarded caller contract.
        match unsafe { self.inner.reallocate(ptr, old_layout, new_size) } {
            Some(new_ptr) => {
                if new_size < old_size {
                    self.unreserve(old_size - new_size);
                }
                self.allocations.fetch_add(1, Ordering::Relaxed);
                self.deallocations.fetch_add(1, Ordering::Relaxed);
                Some(new_ptr)
            }
            None => {
                if new_size > old_size {
                    self.unreserve(new_size - old_size);
                }
                self.failures.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded caller contract.
        unsafe { self.inner.deallocate(ptr, layout) };
        self.unreserve(layout.size());
        self.deallocations.fetch_add(1, Ordering::Relaxed);
    }
}
