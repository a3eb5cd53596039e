//! The type table.
//!
//! Append-only: slot 0 is reserved, every registration takes the next slot,
//! and unregistering only clears a slot so its id is never handed out again.
//! Lookups clone the descriptor's `Arc` and drop the lock before returning,
//! so no caller ever runs a type operation while the table is locked.

use crate::error::{Error, Result};
use crate::runtime::descriptor::{TypeDescriptor, TypeId};
use fxhash::FxBuildHasher;
use hashbrown::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

pub(crate) struct TypeRegistry {
    /// Index = raw type id; index 0 stays `None`.
    slots: RwLock<Vec<Option<Arc<TypeDescriptor>>>>,
    /// Rust types already registered through `native_id`.
    natives: RwLock<HashMap<std::any::TypeId, TypeId, FxBuildHasher>>,
    capacity: usize,
}

impl TypeRegistry {
    pub(crate) fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity.min(1024) + 1);
        slots.push(None);
        TypeRegistry {
            slots: RwLock::new(slots),
            natives: RwLock::new(HashMap::with_hasher(FxBuildHasher::default())),
            capacity,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of ids handed out so far, including unregistered ones.
    pub(crate) fn issued(&self) -> usize {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).len() - 1
    }

    pub(crate) fn register(&self, descriptor: TypeDescriptor) -> Result<TypeId> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let next = slots.len();
        let id = u32::try_from(next)
            .ok()
            .filter(|_| next <= self.capacity)
            .and_then(TypeId::new);

        let Some(id) = id else {
            oxidef_log::warn!(
                "type table full ({} ids), cannot register `{}`",
                self.capacity,
                descriptor.name()
            );
            return Err(Error::TypeTableFull {
                capacity: self.capacity,
            });
        };

        oxidef_log::debug!("registered type `{}` as {}", descriptor.name(), id);
        slots.push(Some(Arc::new(descriptor)));
        Ok(id)
    }

    /// Clears the slot and forgets any Rust type mapped to it, so the next
    /// typed creation registers afresh. Returns the descriptor that was
    /// registered, if any.
    pub(crate) fn unregister(&self, id: TypeId) -> Option<Arc<TypeDescriptor>> {
        // Same lock order as `native_id`: natives, then slots.
        let mut natives = self.natives.write().unwrap_or_else(PoisonError::into_inner);
        let removed = self
            .slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(id.index())
            .and_then(Option::take);
        if let Some(descriptor) = &removed {
            natives.retain(|_, native| *native != id);
            oxidef_log::debug!("unregistered type `{}` ({})", descriptor.name(), id);
        }
        removed
    }

    pub(crate) fn get(&self, id: TypeId) -> Option<Arc<TypeDescriptor>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id.index())
            .and_then(Clone::clone)
    }

    /// Returns the id registered for a Rust type, registering it with
    /// `make` on first use.
    pub(crate) fn native_id(
        &self,
        rust_type: std::any::TypeId,
        make: impl FnOnce() -> TypeDescriptor,
    ) -> Result<TypeId> {
        if let Some(&id) = self
            .natives
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&rust_type)
        {
            return Ok(id);
        }

        let mut natives = self.natives.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have won the race.
        if let Some(&id) = natives.get(&rust_type) {
            return Ok(id);
        }
        let id = self.register(make())?;
        natives.insert(rust_type, id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_start_at_one_and_are_never_reused() {
        let registry = TypeRegistry::new(8);
        let a = registry.register(TypeDescriptor::new("A")).unwrap();
        let b = registry.register(TypeDescriptor::new("B")).unwrap();
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 2);

        assert_eq!(registry.unregister(a).unwrap().name(), "A");
        assert!(registry.get(a).is_none());
        assert!(registry.unregister(a).is_none());

        let c = registry.register(TypeDescriptor::new("C")).unwrap();
        assert_eq!(c.get(), 3);
        assert_eq!(registry.issued(), 3);
    }

    #[test]
    fn test_table_full() {
        let registry = TypeRegistry::new(2);
        registry.register(TypeDescriptor::new("A")).unwrap();
        registry.register(TypeDescriptor::new("B")).unwrap();
        let err = registry.register(TypeDescriptor::new("C")).unwrap_err();
        assert_eq!(err, Error::TypeTableFull { capacity: 2 });
    }

    #[test]
    fn test_native_id_registers_once() {
        let registry = TypeRegistry::new(8);
        let rust_type = std::any::TypeId::of::<u32>();
        let first = registry
            .native_id(rust_type, || TypeDescriptor::new("u32"))
            .unwrap();
        let second = registry
            .native_id(rust_type, || panic!("registered twice"))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.issued(), 1);
    }

    #[test]
    fn test_unregister_forgets_native_mapping() {
        let registry = TypeRegistry::new(8);
        let rust_type = std::any::TypeId::of::<u32>();
        let first = registry
            .native_id(rust_type, || TypeDescriptor::new("u32"))
            .unwrap();
        registry.unregister(first).unwrap();

        let second = registry
            .native_id(rust_type, || TypeDescriptor::new("u32"))
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(registry.get(second).unwrap().name(), "u32");
    }

    #[test]
    fn test_unknown_id_lookup() {
        let registry = TypeRegistry::new(8);
        assert!(registry.get(TypeId::new(5).unwrap()).is_none());
    }
}
