//! Error types for the Keel kernel.
//!
//! This module defines the error hierarchy used throughout the kernel.
//! The errors are organized by concern, with each concern having its own
//! error type.
//!
//! The root error type, `Error`, can wrap any of the concern-specific
//! errors, allowing for uniform error handling at the top level.

use thiserror::Error;

/// Root error type for the Keel kernel.
#[derive(Debug, Error)]
pub enum Error {
    /// Lifecycle sequencing errors
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Allocator substrate errors
    #[error("Allocator error: {0}")]
    Allocator(#[from] AllocatorError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to the system lifecycle gate.
///
/// Every sequencing violation the gate can detect maps to a variant here;
/// the policy is deterministic rejection, never silent corruption.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// The gate has reached its terminal state and cannot be re-entered
    #[error("system has already been destroyed; re-initialization is not supported")]
    AlreadyDestroyed,

    /// Destroy (or an unbalanced release) was requested with no matching init
    #[error("system is not initialized")]
    NotInitialized,

    /// A kernel facility that needs the allocator was used outside the
    /// active window
    #[error("no kernel allocator is installed")]
    AllocatorUnavailable,
}

/// Errors related to the allocator substrate.
#[derive(Debug, Error)]
pub enum AllocatorError {
    /// An allocator is already installed in the global slot
    #[error("a kernel allocator is already installed")]
    AlreadyInstalled,

    /// No allocator is installed in the global slot
    #[error("no kernel allocator is installed")]
    NotInstalled,

    /// The underlying allocator failed to satisfy a request
    #[error("allocation of {0} bytes failed")]
    ExhaustedMemory(usize),

    /// A zero-sized or otherwise unrepresentable layout was requested
    #[error("invalid allocation layout: {0}")]
    InvalidLayout(String),
}

/// Errors related to kernel configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    /// The configuration file could not be parsed
    #[error("failed to parse configuration: {0}")]
    ParseFailed(String),

    /// The configuration is structurally valid but semantically wrong
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type used throughout the Keel kernel.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let lifecycle_err = LifecycleError::NotInitialized;
        let error: Error = lifecycle_err.into();
        assert!(matches!(error, Error::Lifecycle(_)));

        let alloc_err = AllocatorError::NotInstalled;
        let error: Error = alloc_err.into();
        assert!(matches!(error, Error::Allocator(_)));

        let config_err = ConfigError::Invalid("bad".to_string());
        let error: Error = config_err.into();
        assert!(matches!(error, Error::Config(_)));
    }

    #[test]
    fn test_error_display() {
        let error: Error = LifecycleError::AlreadyDestroyed.into();
        let display = format!("{}", error);
        assert!(display.contains("already been destroyed"));

        let error: Error = AllocatorError::ExhaustedMemory(4096).into();
        let display = format!("{}", error);
        assert!(display.contains("4096"));
    }
}
