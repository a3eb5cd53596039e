//! Error types for the `OxideF` runtime.
//!
//! Only recoverable conditions live here: resource exhaustion and bad
//! configuration. Misuse of the runtime (over-releasing an instance,
//! indexing past the end of an array, naming a type id that was never
//! registered) panics instead, and logical no-ops such as removing an absent
//! key are not errors at all.

use oxidef_mem::AllocError;
use std::fmt;

/// Errors that can occur in the `OxideF` runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An allocator refused a request.
    OutOfMemory {
        /// The requested allocation size in bytes.
        requested: usize,
    },

    /// A size computation overflowed the address space.
    CapacityOverflow,

    /// Every slot of the type table is in use.
    TypeTableFull {
        /// Number of usable type ids in the table.
        capacity: usize,
    },

    /// A configuration value could not be parsed.
    InvalidConfig {
        /// Name of the setting (usually the environment variable).
        name: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OutOfMemory { requested } => {
                write!(f, "Out of memory: request of {requested} bytes failed")
            }
            Error::CapacityOverflow => write!(f, "Capacity overflow"),
            Error::TypeTableFull { capacity } => {
                write!(f, "Type table full: all {capacity} type ids are in use")
            }
            Error::InvalidConfig { name, value } => {
                write!(f, "Invalid value `{value}` for {name}")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<AllocError> for Error {
    fn from(err: AllocError) -> Self {
        match err {
            AllocError::OutOfMemory { requested } => Error::OutOfMemory { requested },
            AllocError::CapacityOverflow => Error::CapacityOverflow,
        }
    }
}

/// Result type for `OxideF` runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::TypeTableFull { capacity: 4 }.to_string(),
            "Type table full: all 4 type ids are in use"
        );
        assert_eq!(
            Error::InvalidConfig {
                name: "OXIDEF_TYPE_TABLE_CAPACITY",
                value: "lots".into()
            }
            .to_string(),
            "Invalid value `lots` for OXIDEF_TYPE_TABLE_CAPACITY"
        );
    }

    #[test]
    fn test_from_alloc_error() {
        assert_eq!(
            Error::from(AllocError::OutOfMemory { requested: 16 }),
            Error::OutOfMemory { requested: 16 }
        );
        assert_eq!(Error::from(AllocError::CapacityOverflow), Error::CapacityOverflow);
    }
}
