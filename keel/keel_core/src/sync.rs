//! Synchronization helpers for the kernel lifecycle.
//!
//! Provides the two small atomic primitives the lifecycle contract is built
//! on: a readiness flag owned by each singleton instance, and an
//! underflow-safe reference counter backing nested init/destroy.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A readiness flag owned by a singleton instance.
///
/// The singleton base guarantees that an instance *exists*; this flag is how
/// the concrete type signals that the instance is *ready for use*. Only the
/// concrete type ever sets or clears it; the base machinery reads it at most.
///
/// All accesses are sequentially consistent so readiness observed on one
/// thread is visible on every other.
#[derive(Debug, Default)]
pub struct ReadyFlag {
    /// The flag value
    ready: AtomicBool,
}

impl ReadyFlag {
    /// Create a new flag in the not-ready state.
    pub const fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
        }
    }

    /// Mark the owner as ready and return the previous state.
    pub fn mark_ready(&self) -> bool {
        self.ready.swap(true, Ordering::SeqCst)
    }

    /// Clear the flag (typically from the owner's shutdown path) and return
    /// the previous state.
    pub fn clear(&self) -> bool {
        self.ready.swap(false, Ordering::SeqCst)
    }

    /// Get the current state of the flag.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// An underflow-safe reference counter for nested enable/disable pairs.
///
/// `acquire` always succeeds and returns the new count. `release` refuses to
/// go below zero and reports whether the caller just released the final
/// reference, which is the signal to tear shared state down.
#[derive(Debug, Default)]
pub struct InitCounter {
    /// The current reference count
    count: AtomicUsize,
}

impl InitCounter {
    /// Create a new counter at zero.
    pub const fn new() -> Self {
        Self {
            count: AtomicUsize::new(0),
        }
    }

    /// Increment the counter and return the new count.
    pub fn acquire(&self) -> usize {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Decrement the counter.
    ///
    /// Returns `Some(new_count)` on success, `None` if the counter was
    /// already zero. A return of `Some(0)` means the final reference was
    /// just released.
    pub fn release(&self) -> Option<usize> {
        let mut current = self.count.load(Ordering::SeqCst);

        loop {
            if current == 0 {
                return None;
            }

            match self.count.compare_exchange(
                current,
                current - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Some(current - 1),
                Err(actual) => current = actual,
            }
        }
    }

    /// Get the current count.
    pub fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}
