//! Integration tests for the object runtime: reference counting, type
//! registration, static instances and allocator failure.

mod common;

use common::{number, probe, runtime, string};
use oxidef::runtime::StaticInstance;
use oxidef::{Error, NativeType, Object, Runtime, RuntimeConfig, TypeDescriptor};
use oxidef_mem::{AllocatorRef, LimitedAllocator, default_allocator};
use std::sync::Arc;
use std::sync::atomic::Ordering;

// ============================================================================
// Reference Counting
// ============================================================================

#[test]
fn test_balanced_retains_leave_one_owner() {
    let rt = runtime();
    let (finalized, payload) = probe();
    let instance = rt.create_native(None, payload).unwrap();

    for n in [1usize, 5, 64] {
        let retained: Vec<_> = (0..n).map(|_| instance.retain()).collect();
        assert_eq!(instance.retain_count(), n + 1);
        retained.into_iter().for_each(|i| i.release());
        assert_eq!(instance.retain_count(), 1);
        assert_eq!(finalized.load(Ordering::SeqCst), 0);
    }

    instance.release();
    assert_eq!(finalized.load(Ordering::SeqCst), 1);
}

#[test]
fn test_objects_in_collections_share_ownership() {
    let rt = runtime();
    let (finalized, payload) = probe();
    let object = Object::from(rt.create_native(None, payload).unwrap());

    let copies: Vec<Object> = std::iter::repeat_n(&object, 3).cloned().collect();
    assert_eq!(object.retain_count(), 4);
    drop(object);
    assert_eq!(finalized.load(Ordering::SeqCst), 0);
    drop(copies);
    assert_eq!(finalized.load(Ordering::SeqCst), 1);
}

#[test]
fn test_instance_memory_returns_to_its_allocator() {
    let rt = runtime();
    let limited = Arc::new(LimitedAllocator::unlimited(default_allocator()));
    let alloc: AllocatorRef = limited.clone();
    let ty = rt.register_type(TypeDescriptor::new("Blob")).unwrap();

    let instances: Vec<_> = (0..10)
        .map(|n| rt.create_instance(Some(&alloc), ty, n * 8).unwrap())
        .collect();
    assert_eq!(limited.stats().allocations, 10);
    assert!(limited.stats().live_bytes > 0);
    drop(instances);

    let stats = limited.stats();
    assert_eq!(stats.deallocations, 10);
    assert_eq!(stats.live_bytes, 0);
}

#[test]
fn test_allocation_failure_is_none() {
    let rt = runtime();
    let limited: AllocatorRef = Arc::new(LimitedAllocator::new(default_allocator(), 128));
    let ty = rt.register_type(TypeDescriptor::new("Huge")).unwrap();

    assert!(rt.create_instance(Some(&limited), ty, 4096).is_none());
    assert!(rt.create_instance(Some(&limited), ty, 0).is_some());

    let err = rt.create_native(Some(&limited), Big([0; 512]));
    assert!(matches!(err, Err(Error::OutOfMemory { .. })));
}

#[allow(dead_code)]
struct Big([u64; 512]);

impl NativeType for Big {
    const TYPE_NAME: &'static str = "Big";
}

// ============================================================================
// Type Registry
// ============================================================================

#[test]
fn test_type_table_full() {
    let rt = Runtime::new(RuntimeConfig::default().with_type_table_capacity(3));
    for name in ["A", "B", "C"] {
        rt.register_type(TypeDescriptor::new(name)).unwrap();
    }
    assert_eq!(
        rt.register_type(TypeDescriptor::new("D")),
        Err(Error::TypeTableFull { capacity: 3 })
    );
    assert_eq!(rt.type_count(), 3);
}

#[test]
fn test_type_ids_are_distinct_and_named() {
    let rt = runtime();
    let a = rt.register_type(TypeDescriptor::new("Alpha")).unwrap();
    let b = rt.register_type(TypeDescriptor::new("Beta")).unwrap();
    assert_ne!(a, b);
    assert_eq!(rt.type_name(a).as_deref(), Some("Alpha"));
    assert_eq!(rt.type_name(b).as_deref(), Some("Beta"));
}

// ============================================================================
// Polymorphic Operations
// ============================================================================

#[test]
fn test_equal_hash_describe_through_types() {
    let rt = runtime();
    let a = string(&rt, "hello");
    let b = string(&rt, "hello");
    let c = string(&rt, "world");

    assert!(rt.equal(&a, &b));
    assert!(!rt.equal(&a, &c));
    assert_eq!(rt.hash(&a), rt.hash(&b));
    assert_eq!(rt.describe(&a), "hello");

    // Different types never compare equal.
    let byte = Object::from(rt.create_native(None, 1u8).unwrap());
    assert!(!rt.equal(&number(&rt, 1), &byte));
}

#[test]
fn test_untyped_objects_use_identity() {
    let rt = runtime();
    let ty = rt.register_type(TypeDescriptor::new("Plain")).unwrap();
    let a = Object::from(rt.create_instance(None, ty, 0).unwrap());
    let b = Object::from(rt.create_instance(None, ty, 0).unwrap());

    assert!(rt.equal(&a, &a.clone()));
    assert!(!rt.equal(&a, &b));
    assert_eq!(rt.hash(&a), a.addr() as u64 >> 4);
    assert!(rt.describe(&a).starts_with("<Plain: 0x"));
    assert_eq!(a.debug_describe(), rt.describe(&a));
}

#[test]
fn test_copy_of_immutable_is_retained_identity() {
    let rt = runtime();
    let n = number(&rt, 9);
    let copy = rt.copy(&n, None).unwrap();
    assert!(copy.ptr_eq(&n));
    assert_eq!(n.retain_count(), 2);

    let s = string(&rt, "deep");
    let copy = rt.copy(&s, None).unwrap();
    assert!(!copy.ptr_eq(&s));
    assert!(rt.equal(&copy, &s));
}

// ============================================================================
// Static Instances
// ============================================================================

#[test]
fn test_static_instances_ignore_reference_counting() {
    let rt = runtime();
    let ty = rt.register_type(TypeDescriptor::new("Constant")).unwrap();
    let slot: &'static mut StaticInstance<4> = Box::leak(Box::new(StaticInstance::new(*b"oxid")));
    let constant = rt.init_static_instance(slot, ty);

    let retained: Vec<_> = (0..100).map(|_| constant.retain()).collect();
    assert_eq!(constant.retain_count(), usize::MAX);
    drop(retained);

    assert!(constant.is_constant());
    assert!(constant.allocator().is_none());
    assert_eq!(constant.payload(), b"oxid");
    constant.release();
}
