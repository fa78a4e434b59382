//! Keel Runtime - lifecycle core for the Keel kernel
//!
//! This crate provides the bootstrap/shutdown contract for the kernel:
//! the process-wide system gate that bounds the window in which kernel
//! facilities (notably the shared allocator) may be used, the generic
//! singleton base for lazily-constructed shared services, and the explicit
//! thread-teardown hook dispatch for singletons holding thread-affine
//! resources.
//!
//! The intended discipline is: complete [`system::init`] (or construct a
//! [`SystemGuard`]) before touching any kernel facility on any thread, and
//! join every worker before the final [`system::destroy`]. The gate cannot
//! enforce that ordering at each call site; it detects and rejects the
//! sequencing violations it can see and reports outstanding allocations at
//! teardown.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod singleton;
pub mod system;
pub mod thread;

// Re-export key types for convenience
pub use singleton::{KernelSingleton, SingletonSlot, ThreadTeardown};
pub use system::config::KernelConfig;
pub use system::gate::{KernelLifecycleState, LifecycleGate, SystemGuard};
pub use thread::{register_teardown, spawn_default_worker, spawn_worker};
