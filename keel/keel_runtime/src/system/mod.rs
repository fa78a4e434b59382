//! System lifecycle management for the Keel runtime
//!
//! This module provides the process-wide init/destroy gate, kernel
//! configuration, and the allocator leak check.

pub mod config;
pub mod gate;

// Re-export key types for convenience
pub use config::KernelConfig;
pub use gate::{
    check_for_allocator_leaks, destroy, init, init_with, init_with_allocator, is_initialized,
    state, KernelLifecycleState, LifecycleGate, SystemGuard,
};
