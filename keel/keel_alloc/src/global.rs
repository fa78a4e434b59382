//! Process-wide allocator slot.
//!
//! The system gate installs an allocator here on init and reclaims it on
//! destroy. Everything between those two points that needs kernel memory
//! resolves the allocator through [`current`].
//!
//! The slot itself carries no lifecycle policy: install fails if occupied,
//! teardown fails if empty, and the gate decides when either happens.

use std::sync::Arc;

use log::{debug, info};
use parking_lot::RwLock;

use keel_core::error::AllocatorError;

use crate::tracker::{KernelAlloc, TrackingAllocator};

/// A single-occupancy slot holding the active allocator.
///
/// The process-wide slot is reached through the free functions in this
/// module; independent slots (mainly for tests) can be created directly.
pub struct AllocatorSlot {
    /// The installed allocator, if any
    inner: RwLock<Option<Arc<dyn KernelAlloc>>>,
}

impl AllocatorSlot {
    /// Create a new, empty slot.
    pub const fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// Install an allocator into this slot.
    ///
    /// Fails with `AlreadyInstalled` if the slot is occupied; the existing
    /// allocator is left untouched.
    pub fn install(&self, allocator: Arc<dyn KernelAlloc>) -> Result<(), AllocatorError> {
        let mut slot = self.inner.write();

        if slot.is_some() {
            return Err(AllocatorError::AlreadyInstalled);
        }

        *slot = Some(allocator);
        info!("Kernel allocator installed");

        Ok(())
    }

    /// Install a fresh default [`TrackingAllocator`].
    pub fn install_default(&self) -> Result<(), AllocatorError> {
        self.install(Arc::new(TrackingAllocator::new()))
    }

    /// Get the installed allocator, if any.
    pub fn current(&self) -> Option<Arc<dyn KernelAlloc>> {
        self.inner.read().clone()
    }

    /// Whether an allocator is installed.
    pub fn is_installed(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Remove and return the installed allocator.
    ///
    /// The allocator is handed back rather than dropped so the caller can
    /// take a final leak report before releasing the last reference.
    pub fn teardown(&self) -> Result<Arc<dyn KernelAlloc>, AllocatorError> {
        let mut slot = self.inner.write();

        match slot.take() {
            Some(allocator) => {
                debug!("Kernel allocator removed from slot");
                Ok(allocator)
            }
            None => Err(AllocatorError::NotInstalled),
        }
    }
}

impl Default for AllocatorSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide slot used by the system gate.
static PROCESS_SLOT: AllocatorSlot = AllocatorSlot::new();

/// Get the process-wide slot.
pub fn process_slot() -> &'static AllocatorSlot {
    &PROCESS_SLOT
}

/// Install an allocator into the process-wide slot.
pub fn install(allocator: Arc<dyn KernelAlloc>) -> Result<(), AllocatorError> {
    PROCESS_SLOT.install(allocator)
}

/// Install a fresh default allocator into the process-wide slot.
pub fn install_default() -> Result<(), AllocatorError> {
    PROCESS_SLOT.install_default()
}

/// Get the allocator installed in the process-wide slot, if any.
pub fn current() -> Option<Arc<dyn KernelAlloc>> {
    PROCESS_SLOT.current()
}

/// Whether the process-wide slot holds an allocator.
pub fn is_installed() -> bool {
    PROCESS_SLOT.is_installed()
}

/// Remove and return the allocator from the process-wide slot.
pub fn teardown() -> Result<Arc<dyn KernelAlloc>, AllocatorError> {
    PROCESS_SLOT.teardown()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::alloc::Layout;

    #[test]
    fn test_slot_lifecycle() {
        let slot = AllocatorSlot::new();
        assert!(!slot.is_installed());
        assert!(slot.current().is_none());

        slot.install_default().unwrap();
        assert!(slot.is_installed());

        // Second install is rejected and leaves the first in place
        let result = slot.install(Arc::new(TrackingAllocator::new()));
        assert!(matches!(result, Err(AllocatorError::AlreadyInstalled)));
        assert!(slot.is_installed());

        let allocator = slot.teardown().unwrap();
        assert!(!slot.is_installed());
        assert!(allocator.outstanding().is_clean());

        // Teardown of an empty slot is rejected
        assert!(matches!(slot.teardown(), Err(AllocatorError::NotInstalled)));
    }

    #[test]
    fn test_teardown_hands_back_bookkeeping() {
        let slot = AllocatorSlot::new();
        slot.install_default().unwrap();

        let allocator = slot.current().unwrap();
        let layout = Layout::from_size_align(32, 8).unwrap();
        let ptr = allocator.allocate(layout).unwrap();

        // The allocator returned by teardown still knows about the block
        let reclaimed = slot.teardown().unwrap();
        let report = reclaimed.outstanding();
        assert_eq!(report.count, 1);
        assert_eq!(report.blocks[0].size, 32);

        unsafe { reclaimed.deallocate(ptr, layout) };
    }
}
