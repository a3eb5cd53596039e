//! `OxideF` object runtime.
//!
//! This module provides the reference-counted object model every collection
//! is built on:
//!
//! - [`descriptor`]: type ids and per-type operation tables
//! - [`instance`]: instance layout, atomic retain/release, constant instances
//! - [`object`]: the `Native | Foreign` object value and its dispatch
//! - [`bridge`]: the foreign-object hook (external class tokens and handles)
//! - [`native`]: typed Rust payloads
//!
//! # Architecture
//!
//! A [`Runtime`] owns the type table and the optional foreign bridge. It is
//! passed explicitly, or the lazily created [`Runtime::global`] is used.
//! Instances capture their descriptor at creation, so equality, hashing and
//! finalization never go back through the table lock.
//!
//! # Example
//!
//! ```rust
//! use oxidef::runtime::{Runtime, TypeDescriptor};
//! use oxidef::RuntimeConfig;
//!
//! let runtime = Runtime::new(RuntimeConfig::default());
//! let blob = runtime.register_type(TypeDescriptor::new("Blob")).unwrap();
//!
//! let instance = runtime.create_instance(None, blob, 32).unwrap();
//! let second = instance.retain();
//!
//! assert_eq!(instance.retain_count(), 2);
//! assert_eq!(runtime.type_name(blob).as_deref(), Some("Blob"));
//! drop(second);
//! ```

pub mod bridge;
pub mod descriptor;
pub mod instance;
pub mod native;
pub mod object;
mod registry;

pub use bridge::{ForeignBridge, ForeignClass, ForeignHandle, ForeignObject, ForeignReply};
pub use descriptor::{
    CopyFn, DescribeFn, EqualFn, FinalizeFn, HashFn, InitFn, TypeDescriptor, TypeId,
};
pub use instance::{
    FLAG_CONSTANT, INFO_INLINE, INFO_MUTABLE, INFO_SHIFT, Instance, PAYLOAD_ALIGN, StaticInstance,
};
pub use native::NativeType;
pub use object::Object;

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use oxidef_mem::{AllocatorRef, default_allocator};
use registry::TypeRegistry;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Outcome of [`Runtime::dispatch`].
#[derive(Debug)]
pub enum Dispatch<R> {
    /// The native implementation ran.
    Native(R),
    /// The operation was forwarded to an external handle.
    Foreign(ForeignReply),
}

/// Type table, foreign bridge and configuration.
///
/// # Thread Safety
///
/// All methods take `&self`. The type table sits behind a single `RwLock`
/// that is released before any type operation runs.
pub struct Runtime {
    registry: TypeRegistry,
    bridge: Option<Arc<dyn ForeignBridge>>,
    config: RuntimeConfig,
}

static GLOBAL: OnceLock<Runtime> = OnceLock::new();

impl Runtime {
    /// Creates a runtime without a foreign bridge.
    ///
    /// Applies `config.log_level` to the logger if set.
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        if let Some(level) = config.log_level {
            oxidef_log::set_level(level);
        }
        oxidef_log::debug!(
            "runtime created with {} type ids",
            config.type_table_capacity
        );
        Runtime {
            registry: TypeRegistry::new(config.type_table_capacity),
            bridge: None,
            config,
        }
    }

    /// Creates a runtime that stamps instances with the bridge's external
    /// class tokens.
    #[must_use]
    pub fn with_bridge(config: RuntimeConfig, bridge: Arc<dyn ForeignBridge>) -> Self {
        let mut runtime = Runtime::new(config);
        oxidef_log::info!("foreign bridge installed");
        runtime.bridge = Some(bridge);
        runtime
    }

    /// Returns the process-wide runtime.
    ///
    /// Created on first use from [`RuntimeConfig::from_env`]; an invalid
    /// environment falls back to the defaults with a warning.
    pub fn global() -> &'static Runtime {
        GLOBAL.get_or_init(|| {
            let config = RuntimeConfig::from_env().unwrap_or_else(|err| {
                oxidef_log::warn!("{err}; using default runtime configuration");
                RuntimeConfig::default()
            });
            Runtime::new(config)
        })
    }

    /// The configuration this runtime was built with.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// `true` if a foreign bridge is installed.
    #[must_use]
    pub fn has_bridge(&self) -> bool {
        self.bridge.is_some()
    }

    /// Registers a type and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeTableFull`] once every id up to the configured
    /// capacity has been issued.
    ///
    /// # Example
    ///
    /// ```rust
    /// use oxidef::runtime::{Runtime, TypeDescriptor};
    /// use oxidef::{Error, RuntimeConfig};
    ///
    /// let runtime = Runtime::new(RuntimeConfig::default().with_type_table_capacity(1));
    /// assert!(runtime.register_type(TypeDescriptor::new("A")).is_ok());
    /// assert_eq!(
    ///     runtime.register_type(TypeDescriptor::new("B")),
    ///     Err(Error::TypeTableFull { capacity: 1 })
    /// );
    /// ```
    pub fn register_type(&self, descriptor: TypeDescriptor) -> Result<TypeId> {
        self.registry.register(descriptor)
    }

    /// Clears a type's slot. Its id is never reused and live instances keep
    /// working. Returns `false` if nothing was registered under `type_id`.
    pub fn unregister_type(&self, type_id: TypeId) -> bool {
        self.registry.unregister(type_id).is_some()
    }

    /// The descriptor registered under `type_id`.
    #[must_use]
    pub fn descriptor(&self, type_id: TypeId) -> Option<Arc<TypeDescriptor>> {
        self.registry.get(type_id)
    }

    /// Display name of a registered type.
    #[must_use]
    pub fn type_name(&self, type_id: TypeId) -> Option<String> {
        self.registry.get(type_id).map(|d| d.name().to_string())
    }

    /// Number of ids issued so far, including unregistered ones.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.registry.issued()
    }

    /// Maximum number of ids this runtime can issue.
    #[must_use]
    pub fn type_capacity(&self) -> usize {
        self.registry.capacity()
    }

    /// External class the bridge pairs with `type_id`.
    #[must_use]
    pub fn foreign_class_for(&self, type_id: TypeId) -> Option<ForeignClass> {
        self.bridge.as_ref()?.class_for_type(type_id)
    }

    fn expect_descriptor(&self, type_id: TypeId) -> Arc<TypeDescriptor> {
        match self.registry.get(type_id) {
            Some(descriptor) => descriptor,
            None => panic!("type id {type_id} is not registered"),
        }
    }

    /// Allocates a zeroed instance with `extra_bytes` of payload and runs
    /// the type's initializer.
    ///
    /// `None` selects the default allocator.
    ///
    /// # Returns
    ///
    /// `None` if the allocator refuses the request.
    ///
    /// # Panics
    ///
    /// Panics if `type_id` is not registered, or names a typed Rust payload
    /// (use [`Runtime::create_native`]).
    #[must_use]
    pub fn create_instance(
        &self,
        allocator: Option<&AllocatorRef>,
        type_id: TypeId,
        extra_bytes: usize,
    ) -> Option<Instance> {
        let descriptor = self.expect_descriptor(type_id);
        assert!(
            !descriptor.is_native(),
            "typed type `{}` must be created with create_native",
            descriptor.name()
        );
        let init = descriptor.init;
        let foreign_class = self.foreign_class_for(type_id);

        let default;
        let allocator = match allocator {
            Some(allocator) => allocator,
            None => {
                default = default_allocator();
                &default
            }
        };

        let Some(mut instance) =
            Instance::allocate(allocator, type_id, descriptor, foreign_class, extra_bytes)
        else {
            oxidef_log::warn!(
                "allocator `{}` refused a {} instance ({} extra bytes)",
                allocator.name(),
                type_id,
                extra_bytes
            );
            return None;
        };

        if let Some(init) = init {
            init(&mut instance);
        }
        Some(instance)
    }

    /// Stamps caller-owned static storage as a constant instance of
    /// `type_id`. No initializer runs; the payload is whatever the storage
    /// was created with.
    ///
    /// # Panics
    ///
    /// Panics if `type_id` is not registered or names a typed Rust payload.
    pub fn init_static_instance<const N: usize>(
        &self,
        slot: &'static mut StaticInstance<N>,
        type_id: TypeId,
    ) -> Instance {
        let descriptor = self.expect_descriptor(type_id);
        assert!(
            !descriptor.is_native(),
            "typed type `{}` cannot be stamped into static storage",
            descriptor.name()
        );
        let foreign_class = self.foreign_class_for(type_id);
        Instance::stamp_static(slot, type_id, descriptor, foreign_class)
    }

    /// The id registered for the Rust type `T`, registering it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeTableFull`] if `T` is new and the table is full.
    pub fn native_type_id<T: NativeType>(&self) -> Result<TypeId> {
        self.registry
            .native_id(std::any::TypeId::of::<T>(), native::native_descriptor::<T>)
    }

    /// Moves `value` into a new instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeTableFull`] if `T` cannot be registered, or
    /// [`Error::OutOfMemory`] if the allocator refuses.
    pub fn create_native<T: NativeType>(
        &self,
        allocator: Option<&AllocatorRef>,
        value: T,
    ) -> Result<Instance> {
        let type_id = self.native_type_id::<T>()?;
        let descriptor = self.expect_descriptor(type_id);
        let foreign_class = self.foreign_class_for(type_id);
        let allocator = allocator.cloned().unwrap_or_else(default_allocator);
        let size = std::mem::size_of::<T>();

        let mut instance =
            Instance::allocate(&allocator, type_id, descriptor, foreign_class, size)
                .ok_or(Error::OutOfMemory { requested: size })?;
        // SAFETY: allocated for `T` under T's own descriptor.
        unsafe { instance.write_native(value) };
        Ok(instance)
    }

    /// `true` if `object` must not be read as a native `type_id` instance.
    ///
    /// Foreign handles always are. A native instance is when its stamped
    /// external class disagrees with the class the bridge pairs with
    /// `type_id`.
    #[must_use]
    pub fn is_foreign(&self, type_id: TypeId, object: &Object) -> bool {
        match object {
            Object::Foreign(_) => true,
            Object::Native(instance) => instance.foreign_class() != self.foreign_class_for(type_id),
        }
    }

    /// Runs `native` on the instance, or forwards `selector` to the
    /// external system if `object` is foreign for `type_id`.
    ///
    /// # Panics
    ///
    /// Panics if `object` is a native instance of some other type.
    pub fn dispatch<R>(
        &self,
        object: &Object,
        type_id: TypeId,
        selector: &str,
        args: &[Object],
        native: impl FnOnce(&Instance) -> R,
    ) -> Dispatch<R> {
        match object {
            Object::Foreign(foreign) => Dispatch::Foreign(foreign.perform(selector, args)),
            Object::Native(instance) => {
                assert!(
                    instance.type_id() == type_id && !self.is_foreign(type_id, object),
                    "`{}` on a {} instance expected to be {}",
                    selector,
                    instance.type_name(),
                    type_id
                );
                Dispatch::Native(native(instance))
            }
        }
    }

    /// Object equality; see [`Object::equal`].
    #[must_use]
    pub fn equal(&self, a: &Object, b: &Object) -> bool {
        a.equal(b)
    }

    /// Object hash; see [`Object::hash_value`].
    #[must_use]
    pub fn hash(&self, object: &Object) -> u64 {
        object.hash_value()
    }

    /// Object description; see [`Object::describe`].
    #[must_use]
    pub fn describe(&self, object: &Object) -> String {
        object.describe()
    }

    /// Deep copy; `None` selects the default allocator.
    #[must_use]
    pub fn copy(&self, object: &Object, allocator: Option<&AllocatorRef>) -> Option<Object> {
        match allocator {
            Some(allocator) => object.copy_in(allocator),
            None => object.copy_in(&default_allocator()),
        }
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("types", &self.registry.issued())
            .field("capacity", &self.registry.capacity())
            .field("bridge", &self.bridge.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime() -> Runtime {
        Runtime::new(RuntimeConfig::default())
    }

    fn mark_initialized(instance: &mut Instance) {
        if let Some(bytes) = instance.payload_mut() {
            bytes[0] = 0xAB;
        }
    }

    #[test]
    fn test_create_instance_runs_initializer() {
        let rt = runtime();
        let id = rt
            .register_type(TypeDescriptor::new("Init").with_init(mark_initialized))
            .unwrap();
        let instance = rt.create_instance(None, id, 4).unwrap();
        assert_eq!(instance.payload(), &[0xAB, 0, 0, 0]);
        assert_eq!(instance.type_id(), id);
        assert!(instance.foreign_class().is_none());
    }

    #[test]
    #[should_panic(expected = "is not registered")]
    fn test_unknown_type_panics() {
        let rt = runtime();
        let _ = rt.create_instance(None, TypeId::new(77).unwrap(), 0);
    }

    #[test]
    fn test_unregistered_type_keeps_live_instances() {
        let rt = runtime();
        let id = rt.register_type(TypeDescriptor::new("Gone")).unwrap();
        let instance = rt.create_instance(None, id, 0).unwrap();
        assert!(rt.unregister_type(id));
        assert!(!rt.unregister_type(id));
        assert!(rt.descriptor(id).is_none());
        assert_eq!(instance.type_name(), "Gone");
    }

    #[test]
    fn test_native_type_registered_once() {
        let rt = runtime();
        let a = rt.native_type_id::<u64>().unwrap();
        let b = rt.native_type_id::<u64>().unwrap();
        assert_eq!(a, b);
        assert_eq!(rt.type_count(), 1);

        let value = rt.create_native(None, 42u64).unwrap();
        assert_eq!(value.downcast_ref::<u64>(), Some(&42));
        assert_eq!(value.type_id(), a);
    }

    #[test]
    fn test_create_native_after_unregister() {
        let rt = runtime();
        let old = rt.create_native(None, 7u64).unwrap();
        assert!(rt.unregister_type(old.type_id()));

        let fresh = rt.create_native(None, 8u64).unwrap();
        assert_ne!(fresh.type_id(), old.type_id());
        assert_eq!(fresh.downcast_ref::<u64>(), Some(&8));
        assert_eq!(old.downcast_ref::<u64>(), Some(&7));
    }

    #[test]
    fn test_is_foreign_without_bridge() {
        let rt = runtime();
        let id = rt.register_type(TypeDescriptor::new("Local")).unwrap();
        let object = Object::from(rt.create_instance(None, id, 0).unwrap());
        assert!(!rt.is_foreign(id, &object));
    }

    #[test]
    fn test_dispatch_runs_native_closure() {
        let rt = runtime();
        let id = rt.register_type(TypeDescriptor::new("Local")).unwrap();
        let object = Object::from(rt.create_instance(None, id, 3).unwrap());
        match rt.dispatch(&object, id, "length", &[], |i| i.payload_size()) {
            Dispatch::Native(n) => assert_eq!(n, 3),
            Dispatch::Foreign(reply) => panic!("unexpected reply {reply:?}"),
        }
    }

    #[test]
    #[should_panic(expected = "expected to be")]
    fn test_dispatch_rejects_wrong_native_type() {
        let rt = runtime();
        let a = rt.register_type(TypeDescriptor::new("A")).unwrap();
        let b = rt.register_type(TypeDescriptor::new("B")).unwrap();
        let object = Object::from(rt.create_instance(None, a, 0).unwrap());
        let _ = rt.dispatch(&object, b, "count", &[], |_| ());
    }

    #[test]
    fn test_global_is_shared() {
        assert!(std::ptr::eq(Runtime::global(), Runtime::global()));
    }
}
