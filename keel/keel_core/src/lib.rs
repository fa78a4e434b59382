//! # Keel Core
//!
//! `keel_core` provides the fundamental building blocks shared by the Keel
//! kernel crates: the error hierarchy, log level utilities, convenience
//! macros, and the small synchronization helpers the lifecycle contract is
//! built on.
//!
//! ## Crate Structure
//!
//! - **error**: Error types for all Keel components
//! - **logging**: Log level utility consumed by the kernel configuration
//! - **sync**: Atomic readiness flag and init ref-counter
//! - **macros**: Convenience macros for logging

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod logging;
pub mod macros;
pub mod sync;

// Re-export key types for convenience
pub use error::{AllocatorError, ConfigError, Error, LifecycleError, Result};
pub use logging::LogLevel;
pub use sync::{InitCounter, ReadyFlag};
