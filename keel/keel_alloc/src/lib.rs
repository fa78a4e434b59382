#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Keel Alloc
//!
//! Allocator substrate for the Keel kernel.
//!
//! This crate supplies the shared allocator every kernel facility uses
//! during the active window of the system gate:
//!
//! - The [`KernelAlloc`] trait, the object-safe interface the rest of the
//!   kernel allocates through
//! - [`TrackingAllocator`], the default implementation that delegates to the
//!   platform allocator while bookkeeping every live block
//! - A process-wide install/teardown slot ([`global`]) the system gate hands
//!   the allocator to on init and reclaims on destroy
//! - [`LeakReport`], the diagnostic listing of allocations that outlived
//!   their window
//!
//! The substrate is internally synchronized; callers on any thread may
//! allocate concurrently during the active window. Sequencing (nothing
//! allocates before install, nothing allocates after teardown) is the
//! system gate's contract, not enforced here.

pub mod global;
pub mod tracker;

// Re-export key types for easier access
pub use global::AllocatorSlot;
pub use tracker::{AllocStats, AllocationRecord, KernelAlloc, LeakReport, TrackingAllocator};
