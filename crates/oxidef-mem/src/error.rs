//! Allocation failures.

use std::fmt;

/// Errors reported by fallible allocation paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The allocator could not satisfy a request of `requested` bytes.
    OutOfMemory {
        /// Size of the failed request in bytes.
        requested: usize,
    },

    /// The element count does not fit in an `isize`-sized layout.
    CapacityOverflow,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::OutOfMemory { requested } => {
                write!(f, "Out of memory: request of {requested} bytes failed")
            }
            AllocError::CapacityOverflow => write!(f, "Capacity overflow"),
        }
    }
}

impl std::error::Error for AllocError {}
