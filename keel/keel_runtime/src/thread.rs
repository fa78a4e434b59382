//! Thread-teardown hook dispatch for kernel workers.
//!
//! The source of truth for "a worker thread is exiting" is the worker
//! wrapper in this module: threads spawned through [`spawn_worker`] run
//! every registered [`ThreadTeardown`] hook exactly once when they exit,
//! whether the closure returned or panicked. Singletons holding
//! thread-affine resources register their hook explicitly once the
//! instance exists.
//!
//! Registration is idempotent per hook, and dispatch is per-thread: a hook
//! is invoked at most once per (hook, thread) pair, after the thread's
//! useful work is done, before its storage is reclaimed.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::RwLock;
use tracing::{debug, error, trace};

use crate::singleton::ThreadTeardown;

/// Registered teardown hooks.
///
/// Hooks are `&'static` because kernel singletons live for the remainder of
/// the process once constructed.
static REGISTRY: RwLock<Vec<&'static dyn ThreadTeardown>> = RwLock::new(Vec::new());

/// Name prefix for auto-named workers, captured from the configuration at
/// the first balanced init.
static WORKER_NAME_PREFIX: RwLock<Option<String>> = RwLock::new(None);

/// Ordinal appended to auto-generated worker names.
static WORKER_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Set the name prefix used by [`spawn_default_worker`].
pub(crate) fn set_worker_name_prefix(prefix: &str) {
    *WORKER_NAME_PREFIX.write() = Some(prefix.to_string());
}

/// Register a teardown hook.
///
/// Idempotent: registering the same hook again is a no-op. Hooks cannot be
/// unregistered; a singleton that has shut down should make its hook a
/// no-op instead.
pub fn register_teardown(hook: &'static dyn ThreadTeardown) {
    let mut hooks = REGISTRY.write();

    let addr = hook as *const dyn ThreadTeardown as *const ();
    if hooks
        .iter()
        .any(|existing| std::ptr::eq(*existing as *const dyn ThreadTeardown as *const (), addr))
    {
        return;
    }

    hooks.push(hook);
    debug!(hooks = hooks.len(), "Registered thread teardown hook");
}

/// Number of registered teardown hooks.
pub fn registered_hooks() -> usize {
    REGISTRY.read().len()
}

/// Dispatch every registered hook once, for the current thread.
///
/// A panicking hook is contained and logged so the remaining hooks still
/// run.
fn dispatch_teardown(thread_name: &str) {
    // Snapshot so hooks may register further hooks without deadlocking
    let hooks: Vec<&'static dyn ThreadTeardown> = REGISTRY.read().clone();

    trace!(
        thread = thread_name,
        hooks = hooks.len(),
        "Dispatching thread teardown"
    );

    for hook in hooks {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            hook.on_thread_destroy();
        }));

        if let Err(panic) = result {
            error!(
                thread = thread_name,
                "Thread teardown hook panicked: {:?}",
                panic.downcast_ref::<&str>().unwrap_or(&"<unknown panic>")
            );
        }
    }
}

/// Guard whose drop runs teardown dispatch, so hooks fire even when the
/// worker closure panics.
struct TeardownGuard {
    thread_name: String,
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        dispatch_teardown(&self.thread_name);
    }
}

/// Spawn a named kernel worker thread.
///
/// The worker runs `f` and then dispatches every registered teardown hook
/// exactly once, including when `f` panics.
pub fn spawn_worker<F, T>(name: impl Into<String>, f: F) -> io::Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let name = name.into();

    let builder = thread::Builder::new().name(name.clone());

    builder.spawn(move || {
        let _guard = TeardownGuard { thread_name: name };
        f()
    })
}

/// Spawn a kernel worker named from the configured prefix and a
/// process-wide ordinal, e.g. `keel-worker-0`.
///
/// The prefix comes from `worker_name_prefix` in the configuration captured
/// at the first balanced init; before that it falls back to the default.
pub fn spawn_default_worker<F, T>(f: F) -> io::Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let prefix = WORKER_NAME_PREFIX
        .read()
        .clone()
        .unwrap_or_else(|| "keel-worker".to_string());

    let name = format!("{}-{}", prefix, WORKER_SEQ.fetch_add(1, Ordering::SeqCst));
    spawn_worker(name, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // The registry is process-global, so these tests serialize and assert
    // on deltas rather than absolute counts.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    struct CountingHook {
        calls: AtomicUsize,
    }

    impl CountingHook {
        const fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ThreadTeardown for CountingHook {
        fn on_thread_destroy(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_registration_is_idempotent() {
        let _lock = TEST_LOCK.lock();
        static HOOK: CountingHook = CountingHook::new();

        let before = registered_hooks();
        register_teardown(&HOOK);
        register_teardown(&HOOK);
        register_teardown(&HOOK);

        assert_eq!(registered_hooks(), before + 1);
    }

    #[test]
    fn test_hook_fires_once_per_worker() {
        let _lock = TEST_LOCK.lock();
        static HOOK: CountingHook = CountingHook::new();
        register_teardown(&HOOK);

        let before = HOOK.calls();

        let handle = spawn_worker("teardown-test", || 21 * 2).unwrap();
        assert_eq!(handle.join().unwrap(), 42);
        assert_eq!(HOOK.calls(), before + 1);

        let handle = spawn_worker("teardown-test-2", || ()).unwrap();
        handle.join().unwrap();
        assert_eq!(HOOK.calls(), before + 2);
    }

    #[test]
    fn test_hook_fires_on_worker_panic() {
        let _lock = TEST_LOCK.lock();
        static HOOK: CountingHook = CountingHook::new();
        register_teardown(&HOOK);

        let before = HOOK.calls();

        let handle = spawn_worker("panicking-worker", || {
            panic!("worker failed");
        })
        .unwrap();

        assert!(handle.join().is_err());
        assert_eq!(HOOK.calls(), before + 1);
    }

    struct PanickingHook;

    impl ThreadTeardown for PanickingHook {
        fn on_thread_destroy(&self) {
            panic!("hook failed");
        }
    }

    #[test]
    fn test_panicking_hook_does_not_starve_others() {
        let _lock = TEST_LOCK.lock();
        static BAD: PanickingHook = PanickingHook;
        static GOOD: CountingHook = CountingHook::new();

        register_teardown(&BAD);
        register_teardown(&GOOD);

        let before = GOOD.calls();

        let handle = spawn_worker("mixed-hooks", || ()).unwrap();
        handle.join().unwrap();

        assert_eq!(GOOD.calls(), before + 1);
    }

    #[test]
    fn test_worker_thread_is_named() {
        let _lock = TEST_LOCK.lock();

        let handle = spawn_worker("named-worker", || {
            thread::current().name().map(str::to_string)
        })
        .unwrap();

        assert_eq!(handle.join().unwrap().as_deref(), Some("named-worker"));
    }

    #[test]
    fn test_default_worker_name_uses_configured_prefix() {
        let _lock = TEST_LOCK.lock();
        set_worker_name_prefix("engine");

        let handle = spawn_default_worker(|| thread::current().name().map(str::to_string))
            .unwrap();

        let name = handle.join().unwrap().unwrap();
        assert!(name.starts_with("engine-"), "unexpected name: {}", name);

        // Restore the default so later workers in this process keep the
        // conventional prefix
        set_worker_name_prefix("keel-worker");
    }
}
