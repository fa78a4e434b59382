//! Generic per-type lazy singleton base.
//!
//! A kernel singleton is a shared service with exactly one instance per
//! process, constructed lazily on first access from any thread. The
//! contract separates two facts callers often conflate:
//!
//! - *existence* — guaranteed by [`KernelSingleton::instance`], which
//!   constructs exactly once even under concurrent first-call races;
//! - *readiness* — owned entirely by the implementing type, conventionally
//!   via a [`keel_core::sync::ReadyFlag`] field it sets when its own setup
//!   completes. The base machinery never touches it.
//!
//! There is deliberately no registry linking singleton slots, so nothing
//! can enumerate live singletons or order their destruction across types;
//! each owner drives `shutdown` itself.

use once_cell::sync::OnceCell;

/// Per-type storage for one kernel singleton.
///
/// Each implementing type gets exactly one static slot, emitted by the
/// [`kernel_singleton!`](crate::kernel_singleton) macro.
pub struct SingletonSlot<T> {
    /// The lazily-constructed instance
    cell: OnceCell<T>,
}

impl<T> SingletonSlot<T> {
    /// Create an empty slot.
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Get the instance, constructing it with `f` on the first call.
    ///
    /// Safe to race from multiple threads; exactly one caller constructs
    /// and every caller observes the same instance.
    pub fn get_or_init(&self, f: impl FnOnce() -> T) -> &T {
        self.cell.get_or_init(f)
    }

    /// Get the instance if it has been constructed.
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    /// Whether the instance has been constructed yet.
    pub fn is_constructed(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T> Default for SingletonSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Contract for kernel singletons.
///
/// Construction failures inside `create` propagate as panics; there is no
/// recoverable-error channel at this layer.
pub trait KernelSingleton: Sized + Send + Sync + 'static {
    /// The per-type static slot. Supplied by the
    /// [`kernel_singleton!`](crate::kernel_singleton) macro.
    fn slot() -> &'static SingletonSlot<Self>;

    /// Construct the instance. Called at most once per process.
    fn create() -> Self;

    /// Whether the instance has completed its own setup.
    ///
    /// Driven entirely by the implementing type; existence of the instance
    /// does not imply readiness. Callers whose correctness depends on
    /// readiness must check this, not merely obtain the instance.
    fn is_initialized(&self) -> bool;

    /// Tear down this singleton's resources.
    ///
    /// Nothing invokes this implicitly; the owner of the lifecycle
    /// decision (conventionally whoever drives the final system destroy)
    /// must call it.
    fn shutdown(&self);

    /// Get the process-wide instance, constructing it on first access.
    fn instance() -> &'static Self {
        Self::slot().get_or_init(Self::create)
    }
}

/// Hook for singletons holding thread-affine resources.
///
/// Registered explicitly with [`crate::thread::register_teardown`] once the
/// instance exists; the dispatch guarantees at most one call per
/// (hook, thread) pair, after the thread's useful work is done and before
/// its storage is reclaimed.
pub trait ThreadTeardown: Send + Sync {
    /// Called once on each kernel worker thread's exit.
    fn on_thread_destroy(&self);
}

/// Emit the per-type static slot for a [`KernelSingleton`] implementation.
///
/// # Examples
///
/// ```
/// use keel_core::sync::ReadyFlag;
/// use keel_runtime::{kernel_singleton, KernelSingleton};
///
/// struct Renderer {
///     ready: ReadyFlag,
/// }
///
/// impl KernelSingleton for Renderer {
///     kernel_singleton!(Renderer);
///
///     fn create() -> Self {
///         Self { ready: ReadyFlag::new() }
///     }
///
///     fn is_initialized(&self) -> bool {
///         self.ready.is_ready()
///     }
///
///     fn shutdown(&self) {
///         self.ready.clear();
///     }
/// }
///
/// let renderer = Renderer::instance();
/// assert!(!renderer.is_initialized());
/// ```
#[macro_export]
macro_rules! kernel_singleton {
    ($ty:ty) => {
        fn slot() -> &'static $crate::singleton::SingletonSlot<$ty> {
            static SLOT: $crate::singleton::SingletonSlot<$ty> =
                $crate::singleton::SingletonSlot::new();
            &SLOT
        }
    };
}
