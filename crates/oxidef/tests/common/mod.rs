// Common test utilities for integration tests
//
// Shared fixtures: a fresh runtime per test, boxed numbers, a payload that
// counts its own finalization, and a deterministic generator for the
// property loops.

#![allow(dead_code)]

use oxidef::{NativeType, Object, Runtime, RuntimeConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A runtime with default settings.
pub fn runtime() -> Runtime {
    Runtime::new(RuntimeConfig::default())
}

/// A boxed `i64`.
pub fn number(runtime: &Runtime, n: i64) -> Object {
    runtime.create_native(None, n).unwrap().into()
}

/// A boxed string.
pub fn string(runtime: &Runtime, s: &str) -> Object {
    runtime.create_native(None, s.to_string()).unwrap().into()
}

/// Payload that bumps a shared counter when it is dropped.
pub struct DropProbe(pub Arc<AtomicUsize>);

impl Drop for DropProbe {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl NativeType for DropProbe {
    const TYPE_NAME: &'static str = "DropProbe";
}

/// Counter paired with a probe reporting into it.
pub fn probe() -> (Arc<AtomicUsize>, DropProbe) {
    let counter = Arc::new(AtomicUsize::new(0));
    (counter.clone(), DropProbe(counter))
}

/// Deterministic xorshift generator.
pub struct Rng(u64);

impl Rng {
    pub fn new(seed: u64) -> Self {
        Rng(seed.max(1))
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    pub fn below(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound
    }
}
