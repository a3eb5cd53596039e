//! Foreign-object bridging.
//!
//! A host may pair runtime types with classes of an external object system.
//! Handles owned by that system travel through the runtime as
//! [`Object::Foreign`](crate::runtime::Object::Foreign): they are never read
//! as native layouts, and every polymorphic operation on them is redirected
//! to the [`ForeignHandle`] instead.
//!
//! The bridge itself (how a named operation reaches the external system) is
//! the host's business; the runtime only needs:
//!
//! - [`ForeignBridge::class_for_type`]: the external class token paired with
//!   a runtime type, stamped into every native instance of that type
//! - [`ForeignHandle`]: equality, hash, description and named dispatch for a
//!   foreign handle
//!
//! # Example
//!
//! ```rust
//! use oxidef::runtime::{ForeignBridge, ForeignClass, TypeId};
//!
//! struct EvenTypesBridged;
//!
//! impl ForeignBridge for EvenTypesBridged {
//!     fn class_for_type(&self, type_id: TypeId) -> Option<ForeignClass> {
//!         (type_id.get() % 2 == 0).then(|| ForeignClass::new(0x1000 + type_id.get() as usize))
//!             .flatten()
//!     }
//! }
//! ```

use crate::runtime::descriptor::TypeId;
use crate::runtime::object::Object;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Opaque token naming a class of the external object system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForeignClass(NonZeroUsize);

impl ForeignClass {
    /// Wraps a non-zero class token.
    #[must_use]
    pub const fn new(token: usize) -> Option<Self> {
        match NonZeroUsize::new(token) {
            Some(token) => Some(ForeignClass(token)),
            None => None,
        }
    }

    /// Returns the raw token.
    #[must_use]
    pub const fn token(self) -> usize {
        self.0.get()
    }
}

/// The host's table of external classes, consulted at instance creation.
pub trait ForeignBridge: Send + Sync {
    /// Returns the external class paired with `type_id`, if any.
    fn class_for_type(&self, type_id: TypeId) -> Option<ForeignClass>;
}

/// Reply to a named operation forwarded to a foreign handle.
#[derive(Clone)]
pub enum ForeignReply {
    /// The external system does not implement the operation.
    Unhandled,
    /// The operation ran and produced nothing.
    Void,
    /// An object result.
    Object(Object),
    /// An index or count result.
    Index(usize),
    /// A boolean result.
    Bool(bool),
}

impl fmt::Debug for ForeignReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForeignReply::Unhandled => f.write_str("Unhandled"),
            ForeignReply::Void => f.write_str("Void"),
            ForeignReply::Object(obj) => write!(f, "Object({})", obj.describe()),
            ForeignReply::Index(i) => write!(f, "Index({i})"),
            ForeignReply::Bool(b) => write!(f, "Bool({b})"),
        }
    }
}

/// A handle owned by the external object system.
///
/// Retain and release are the handle's own `Arc` count; the external system
/// keeps whatever count it needs behind the handle.
pub trait ForeignHandle: Send + Sync {
    /// The external class of this handle.
    fn class(&self) -> ForeignClass;

    /// External equality. Identity has already been ruled out.
    fn equal(&self, other: &Object) -> bool;

    /// External hash.
    fn hash(&self) -> u64;

    /// External description.
    fn describe(&self) -> String;

    /// Runs a named operation in the external system.
    fn perform(&self, selector: &str, args: &[Object]) -> ForeignReply {
        let _ = (selector, args);
        ForeignReply::Unhandled
    }
}

/// A foreign handle together with the runtime type it claims to be.
#[derive(Clone)]
pub struct ForeignObject {
    claimed_type: TypeId,
    handle: Arc<dyn ForeignHandle>,
}

impl ForeignObject {
    /// Wraps `handle` as a value claiming to be of `claimed_type`.
    #[must_use]
    pub fn new(claimed_type: TypeId, handle: Arc<dyn ForeignHandle>) -> Self {
        ForeignObject {
            claimed_type,
            handle,
        }
    }

    /// The runtime type this handle stands in for.
    #[must_use]
    pub fn claimed_type(&self) -> TypeId {
        self.claimed_type
    }

    /// The external class of the handle.
    #[must_use]
    pub fn class(&self) -> ForeignClass {
        self.handle.class()
    }

    /// The underlying handle.
    #[must_use]
    pub fn handle(&self) -> &Arc<dyn ForeignHandle> {
        &self.handle
    }

    /// Address used for identity comparisons.
    #[must_use]
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.handle).cast::<()>() as usize
    }

    /// `true` if both values wrap the same handle.
    #[must_use]
    pub fn ptr_eq(&self, other: &ForeignObject) -> bool {
        self.addr() == other.addr()
    }

    /// Forwards a named operation.
    pub fn perform(&self, selector: &str, args: &[Object]) -> ForeignReply {
        oxidef_log::trace!(
            "forwarding `{}` to foreign class {:#x}",
            selector,
            self.class().token()
        );
        self.handle.perform(selector, args)
    }
}

impl fmt::Debug for ForeignObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignObject")
            .field("claimed_type", &self.claimed_type)
            .field("class", &self.class().token())
            .finish()
    }
}
