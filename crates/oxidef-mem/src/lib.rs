//! `OxideF` memory infrastructure
//!
//! Every runtime instance remembers the allocator it was created with and
//! routes all of its own buffer traffic (growth, rehash, free) back through
//! it. This crate provides that allocator seam:
//!
//! - [`Allocator`]: allocate / reallocate / deallocate, object safe
//! - [`SystemAllocator`]: the process allocator, used by [`default_allocator`]
//! - [`ArenaAllocator`]: bump allocation in chunks, frees on drop only
//! - [`LimitedAllocator`]: byte budget plus live-allocation accounting
//! - [`RawBuffer`]: a typed, uninitialised buffer owned through an allocator

pub mod allocator;
pub mod arena;
pub mod buffer;
pub mod error;
pub mod limited;

pub use allocator::{Allocator, AllocatorRef, SystemAllocator, default_allocator};
pub use arena::{ArenaAllocator, ArenaStats};
pub use buffer::RawBuffer;
pub use error::AllocError;
pub use limited::{AllocStats, LimitedAllocator};
