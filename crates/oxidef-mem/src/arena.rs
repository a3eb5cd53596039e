//! Bump allocator for long-lived and constant instances.
//!
//! [`ArenaAllocator`] hands out memory from large chunks with an atomic bump
//! pointer. Individual frees are no-ops; every chunk is returned to the
//! system when the arena itself is dropped. Because instances hold their
//! allocator through an [`AllocatorRef`](crate::AllocatorRef), the arena
//! cannot be dropped while anything allocated from it is still alive.
//!
//! This is the allocator of choice for process-wide singletons (canonical
//! booleans, sentinel numbers) and for short phases that build many
//! collections and drop them together.
//!
//! # Thread Safety
//!
//! Allocation from the current chunk is a lock-free CAS loop. Installing a
//! new chunk takes the chunk list lock.
//!
//! # Example
//!
//! ```rust
//! use oxidef_mem::{Allocator, ArenaAllocator};
//! use std::alloc::Layout;
//!
//! let arena = ArenaAllocator::new(4096);
//! let layout = Layout::new::<u64>();
//! let ptr = arena.allocate(layout).unwrap();
//! assert_eq!(ptr.as_ptr() as usize % 16, 0);
//! assert_eq!(arena.stats().chunk_count, 1);
//! ```

use crate::allocator::Allocator;
use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::Mutex;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

/// Default minimum alignment of every arena allocation.
const DEFAULT_ALIGNMENT: usize = 16;

/// Minimum chunk size (one page).
const MIN_CHUNK_SIZE: usize = 4096;

/// Chunks stop doubling at this size.
const MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// A fixed-size region with an atomic bump pointer.
struct Chunk {
    /// Start of the region.
    start: NonNull<u8>,
    /// Next free byte.
    ptr: AtomicPtr<u8>,
    /// Size of the region in bytes.
    capacity: usize,
}

impl Chunk {
    /// Allocates a chunk of `size` bytes from the system allocator.
    ///
    /// Returns `None` if the system allocator is exhausted.
    fn new(size: usize) -> Option<Self> {
        let layout = Layout::from_size_align(size, DEFAULT_ALIGNMENT).ok()?;
        // SAFETY: size >= MIN_CHUNK_SIZE, so the layout is non-zero.
        let start = NonNull::new(unsafe { alloc::alloc(layout) })?;

        Some(Chunk {
            start,
            ptr: AtomicPtr::new(start.as_ptr()),
            capacity: size,
        })
    }

    /// Claims `size` bytes aligned to `align`, or `None` if the chunk is full.
    fn try_alloc(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        let end_addr = self.start.as_ptr().addr() + self.capacity;

        loop {
            let current = self.ptr.load(Ordering::Acquire);
            let aligned = round_up(current.addr(), align);
            let new_addr = aligned.checked_add(size)?;
            if new_addr > end_addr {
                return None;
            }

            // with_addr keeps the provenance of the chunk allocation.
            let new_ptr = current.with_addr(new_addr);
            if self
                .ptr
                .compare_exchange_weak(
                    current,
                    new_ptr,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                // SAFETY: `aligned` lies inside the chunk, which starts at a
                // non-null address.
                return Some(unsafe {
                    NonNull::new_unchecked(current.with_addr(aligned))
                });
            }
        }
    }

    fn used(&self) -> usize {
        self.ptr.load(Ordering::Acquire).addr() - self.start.as_ptr().addr()
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        // SAFETY: same size and alignment as in `Chunk::new`.
        unsafe {
            let layout =
                Layout::from_size_align_unchecked(self.capacity, DEFAULT_ALIGNMENT);
            alloc::dealloc(self.start.as_ptr(), layout);
        }
    }
}

/// Bump allocator over a growing list of chunks.
pub struct ArenaAllocator {
    /// Every chunk ever installed. Boxed so `current` stays valid.
    chunks: Mutex<Vec<Box<Chunk>>>,
    /// Chunk currently served by the lock-free fast path.
    current: AtomicPtr<Chunk>,
    /// Size of the next chunk to install.
    next_chunk_size: AtomicUsize,
    /// Minimum alignment of every allocation.
    alignment: usize,
    /// Bytes handed out so far.
    total_allocated: AtomicUsize,
}

/// Snapshot of arena usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    /// Bytes handed out (excluding alignment padding).
    pub total_allocated: usize,
    /// Number of chunks installed.
    pub chunk_count: usize,
    /// Sum of all chunk sizes.
    pub total_capacity: usize,
    /// Bytes consumed across chunks, padding included.
    pub total_used: usize,
}

impl ArenaAllocator {
    /// Creates an arena whose first chunk holds at least `initial_size`
    /// bytes, with the default 16-byte alignment.
    ///
    /// # Panics
    ///
    /// Panics if the first chunk cannot be allocated.
    #[must_use]
    pub fn new(initial_size: usize) -> Self {
        Self::with_config(initial_size, DEFAULT_ALIGNMENT)
    }

    /// Creates an arena with an explicit first-chunk size and minimum
    /// alignment.
    ///
    /// The chunk size is raised to at least 4 KiB and rounded to a power of
    /// two. Alignments above 16 are honoured per allocation by padding.
    ///
    /// # Panics
    ///
    /// Panics if `alignment` is not a power of two or the first chunk cannot
    /// be allocated.
    #[must_use]
    pub fn with_config(initial_size: usize, alignment: usize) -> Self {
        assert!(
            alignment.is_power_of_two(),
            "arena alignment must be a power of two, got {alignment}"
        );
        let size = initial_size.max(MIN_CHUNK_SIZE).next_power_of_two();
        let mut first =
            Box::new(Chunk::new(size).expect("failed to allocate first arena chunk"));
        let current: *mut Chunk = &mut *first;

        ArenaAllocator {
            chunks: Mutex::new(vec![first]),
            current: AtomicPtr::new(current),
            next_chunk_size: AtomicUsize::new((size * 2).min(MAX_CHUNK_SIZE)),
            alignment,
            total_allocated: AtomicUsize::new(0),
        }
    }

    /// Returns a usage snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the chunk list lock is poisoned.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        let chunks = self.chunks.lock().unwrap();
        ArenaStats {
            total_allocated: self.total_allocated.load(Ordering::Relaxed),
            chunk_count: chunks.len(),
            total_capacity: chunks.iter().map(|c| c.capacity).sum(),
            total_used: chunks.iter().map(|c| c.used()).sum(),
        }
    }

    /// Slow path: claims `size` bytes at `align` under the chunk lock,
    /// installing a new chunk only if the current one is still full.
    #[cold]
    fn allocate_slow(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        let mut chunks = self.chunks.lock().ok()?;

        // Another thread may have installed a fresh chunk while we waited.
        // SAFETY: `current` points at a boxed chunk owned by `chunks`.
        let current = unsafe { &*self.current.load(Ordering::Acquire) };
        if let Some(ptr) = current.try_alloc(size, align) {
            return Some(ptr);
        }

        let wanted = size.saturating_add(align);
        let chunk_size = self
            .next_chunk_size
            .load(Ordering::Relaxed)
            .max(wanted.next_power_of_two());
        let mut chunk = Box::new(Chunk::new(chunk_size)?);
        let ptr = chunk.try_alloc(size, align)?;

        let chunk_ptr: *mut Chunk = &mut *chunk;
        chunks.push(chunk);
        self.current.store(chunk_ptr, Ordering::Release);
        self.next_chunk_size
            .store((chunk_size * 2).min(MAX_CHUNK_SIZE), Ordering::Relaxed);
        Some(ptr)
    }
}

impl Allocator for ArenaAllocator {
    fn name(&self) -> &str {
        "arena"
    }

    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.size() == 0 {
            return None;
        }
        let align = layout.align().max(self.alignment);

        let current = self.current.load(Ordering::Acquire);
        // SAFETY: `current` always points at a boxed chunk owned by
        // `self.chunks`; chunks are only freed when the arena drops.
        let chunk = unsafe { &*current };
        let ptr = match chunk.try_alloc(layout.size(), align) {
            Some(ptr) => ptr,
            None => self.allocate_slow(layout.size(), align)?,
        };
        self.total_allocated
            .fetch_add(layout.size(), Ordering::Relaxed);
        Some(ptr)
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {
        // Memory is reclaimed when the arena drops.
    }
}

// SAFETY: chunk memory is only reached through atomics and the chunk lock;
// raw pointers inside never alias mutable Rust references.
unsafe impl Send for ArenaAllocator {}
unsafe impl Sync for ArenaAllocator {}

#[inline]
fn round_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    value.wrapping_add(align - 1) & !(align - 1)
}
