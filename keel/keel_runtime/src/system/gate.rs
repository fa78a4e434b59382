//! Process-wide init/destroy gate.
//!
//! System initialization must take place before any other kernel facility
//! is used; this is done by calling [`init`] (or constructing a
//! [`SystemGuard`]). Among other things, this installs the kernel memory
//! allocator. Similarly, [`destroy`] must be called before process exit for
//! proper cleanup.
//!
//! Init/destroy nest: multiple independent subsystems may each bracket
//! their lifetime with a balanced pair, and only the final balanced
//! `destroy` tears shared state down. Once destroyed, the gate is terminal;
//! re-initialization is rejected rather than silently corrupting state.
//!
//! There is no registry of live singletons, so the gate cannot shut them
//! down centrally; each singleton's owner drives its `shutdown` before the
//! final `destroy`. The gate's own responsibility ends at the allocator
//! handoff and the leak report.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use keel_alloc::global;
use keel_alloc::{AllocatorSlot, KernelAlloc, LeakReport};
use keel_core::error::{LifecycleError, Result};
use keel_core::sync::InitCounter;

use super::config::KernelConfig;

/// Lifecycle state of the kernel.
///
/// Linear progression; `Destroyed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelLifecycleState {
    /// No `init` has completed yet
    Uninitialized,

    /// The kernel window is open; facilities may be used
    Active,

    /// The final `destroy` has completed; the gate cannot be re-entered
    Destroyed,
}

/// The lifecycle state machine behind the process-wide gate.
///
/// Instances exist so the sequencing rules can be exercised directly in
/// tests; production code goes through the module-level functions, which
/// wrap a single process-wide gate bound to the process allocator slot.
pub struct LifecycleGate {
    /// The allocator slot this gate installs into and tears down
    slot: &'static AllocatorSlot,

    /// Current lifecycle state
    state: Mutex<KernelLifecycleState>,

    /// Balanced init/destroy reference count
    refs: InitCounter,

    /// Configuration captured by the first `init`
    config: Mutex<KernelConfig>,
}

impl LifecycleGate {
    /// Create a gate bound to the process-wide allocator slot.
    pub fn new() -> Self {
        Self::with_slot(global::process_slot())
    }

    /// Create a gate bound to a specific allocator slot.
    pub fn with_slot(slot: &'static AllocatorSlot) -> Self {
        Self {
            slot,
            state: Mutex::new(KernelLifecycleState::Uninitialized),
            refs: InitCounter::new(),
            config: Mutex::new(KernelConfig::default()),
        }
    }

    /// Initialize, installing `allocator` (or the default tracking
    /// allocator) on the first balanced call.
    ///
    /// Returns `true` when this call opened the window, `false` when it
    /// nested onto an already-active gate. Nested calls leave the installed
    /// allocator and captured configuration untouched.
    pub fn init(
        &self,
        config: KernelConfig,
        allocator: Option<Arc<dyn KernelAlloc>>,
    ) -> Result<bool> {
        let mut state = self.state.lock();

        match *state {
            KernelLifecycleState::Destroyed => Err(LifecycleError::AlreadyDestroyed.into()),
            KernelLifecycleState::Active => {
                let refs = self.refs.acquire();
                debug!(refs, "Nested kernel init");
                Ok(false)
            }
            KernelLifecycleState::Uninitialized => {
                config.validate()?;

                match allocator {
                    Some(allocator) => self.slot.install(allocator)?,
                    None => self.slot.install_default()?,
                }

                *self.config.lock() = config;
                self.refs.acquire();
                *state = KernelLifecycleState::Active;

                info!("Kernel system initialized");
                Ok(true)
            }
        }
    }

    /// Whether the gate is currently in the active window.
    pub fn is_initialized(&self) -> bool {
        *self.state.lock() == KernelLifecycleState::Active
    }

    /// Get the current lifecycle state.
    pub fn state(&self) -> KernelLifecycleState {
        *self.state.lock()
    }

    /// Release one init reference.
    ///
    /// The final balanced call runs the configured leak report, tears the
    /// allocator down, and moves the gate to its terminal state; it returns
    /// `true` in that case. Calling with no matching `init` is rejected.
    pub fn destroy(&self) -> Result<bool> {
        let mut state = self.state.lock();

        if *state != KernelLifecycleState::Active {
            return Err(LifecycleError::NotInitialized.into());
        }

        match self.refs.release() {
            None => Err(LifecycleError::NotInitialized.into()),
            Some(refs) if refs > 0 => {
                debug!(refs, "Nested kernel destroy");
                Ok(false)
            }
            Some(_) => {
                let config = self.config.lock().clone();

                if config.leak_check_on_destroy {
                    if let Some(allocator) = self.slot.current() {
                        allocator.outstanding().log(config.leak_report_limit);
                    }
                }

                // The gate goes terminal even if the allocator was torn out
                // of the slot behind its back; leaving the window open with
                // zero references would wedge every later call.
                match self.slot.teardown() {
                    Ok(allocator) => drop(allocator),
                    Err(err) => warn!(%err, "Allocator slot already empty at final destroy"),
                }

                *state = KernelLifecycleState::Destroyed;
                info!("Kernel system destroyed");
                Ok(true)
            }
        }
    }

    /// Query the installed allocator's bookkeeping for outstanding blocks.
    ///
    /// Diagnostic only: nothing is freed. The report is also emitted to the
    /// log, capped at the configured block limit. Fails when no allocator
    /// is installed, i.e. outside the active window.
    pub fn check_for_allocator_leaks(&self) -> Result<LeakReport> {
        let allocator = self
            .slot
            .current()
            .ok_or(LifecycleError::AllocatorUnavailable)?;

        let report = allocator.outstanding();
        report.log(self.config.lock().leak_report_limit);

        Ok(report)
    }
}

impl Default for LifecycleGate {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide gate.
static GATE: Lazy<LifecycleGate> = Lazy::new(LifecycleGate::new);

/// Process-global effects of the configuration captured by the first
/// balanced init: the `log` facade filter for the substrate diagnostics and
/// the default kernel worker name prefix.
///
/// Instance gates never apply these; only the process-wide surface does.
fn apply_process_config(config: &KernelConfig) {
    log::set_max_level(config.log_level.to_level_filter());
    crate::thread::set_worker_name_prefix(&config.worker_name_prefix);
}

/// Initialize the kernel with default configuration and allocator.
pub fn init() -> anyhow::Result<()> {
    init_with(KernelConfig::default())
}

/// Initialize the kernel with the given configuration.
///
/// The configuration only takes effect on the first balanced call; nested
/// calls leave the captured configuration untouched.
pub fn init_with(config: KernelConfig) -> anyhow::Result<()> {
    if GATE.init(config.clone(), None)? {
        apply_process_config(&config);
    }
    Ok(())
}

/// Initialize the kernel, overriding the memory implementation with a
/// caller-supplied allocator.
///
/// The override only takes effect on the first balanced call; nested calls
/// keep whatever allocator is already installed.
pub fn init_with_allocator(
    config: KernelConfig,
    allocator: Arc<dyn KernelAlloc>,
) -> anyhow::Result<()> {
    if GATE.init(config.clone(), Some(allocator))? {
        apply_process_config(&config);
    }
    Ok(())
}

/// Returns `true` if the kernel was properly initialized and has not yet
/// been destroyed.
pub fn is_initialized() -> bool {
    GATE.is_initialized()
}

/// Get the current lifecycle state of the process-wide gate.
pub fn state() -> KernelLifecycleState {
    GATE.state()
}

/// De-initialize the kernel, finalizing the allocator handoff on the final
/// balanced call.
pub fn destroy() -> anyhow::Result<()> {
    GATE.destroy()?;
    Ok(())
}

/// Dump any outstanding allocations and return the report.
pub fn check_for_allocator_leaks() -> anyhow::Result<LeakReport> {
    Ok(GATE.check_for_allocator_leaks()?)
}

/// RAII wrapper for a balanced init/destroy pair.
///
/// Constructing the guard first and letting its destructor do the work is
/// the recommended discipline for subsystems that cannot otherwise
/// guarantee balance.
pub struct SystemGuard {
    _private: (),
}

impl SystemGuard {
    /// Initialize the kernel and return a guard whose drop releases the
    /// reference.
    pub fn acquire() -> anyhow::Result<Self> {
        init()?;
        Ok(Self { _private: () })
    }

    /// Initialize with the given configuration.
    pub fn acquire_with(config: KernelConfig) -> anyhow::Result<Self> {
        init_with(config)?;
        Ok(Self { _private: () })
    }
}

impl Drop for SystemGuard {
    fn drop(&mut self) {
        if let Err(err) = destroy() {
            warn!(%err, "Kernel destroy failed during guard drop");
        }
    }
}
