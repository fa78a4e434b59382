//! Example demonstrating the kernel lifecycle discipline
//!
//! This example shows:
//! - Opening the kernel window with a guard object
//! - Allocating through the installed kernel allocator
//! - Lazily constructing a kernel singleton and marking it ready
//! - Thread teardown dispatch on worker exit
//! - The leak report taken before the window closes

use std::alloc::Layout;
use std::sync::atomic::{AtomicUsize, Ordering};

use keel_alloc::global;
use keel_core::sync::ReadyFlag;
use keel_runtime::thread::{register_teardown, spawn_default_worker};
use keel_runtime::{
    kernel_singleton, system, KernelConfig, KernelSingleton, SystemGuard, ThreadTeardown,
};

struct InputService {
    ready: ReadyFlag,
    thread_exits: AtomicUsize,
}

impl KernelSingleton for InputService {
    kernel_singleton!(InputService);

    fn create() -> Self {
        Self {
            ready: ReadyFlag::new(),
            thread_exits: AtomicUsize::new(0),
        }
    }

    fn is_initialized(&self) -> bool {
        self.ready.is_ready()
    }

    fn shutdown(&self) {
        self.ready.clear();
    }
}

impl ThreadTeardown for InputService {
    fn on_thread_destroy(&self) {
        self.thread_exits.fetch_add(1, Ordering::SeqCst);
    }
}

fn main() -> anyhow::Result<()> {
    println!("Starting Keel lifecycle demo");

    // Construct the guarding object first; its destructor closes the window
    let config = KernelConfig {
        leak_report_limit: 8,
        worker_name_prefix: "demo-worker".to_string(),
        ..KernelConfig::default()
    };
    let _guard = SystemGuard::acquire_with(config)?;
    println!("Kernel window open: initialized = {}", system::is_initialized());

    // Allocate through the installed kernel allocator
    let allocator = global::current().expect("init installs the kernel allocator");
    let layout = Layout::from_size_align(256, 16).unwrap();
    let block = allocator.allocate(layout)?;
    println!("Allocated 256 bytes at {:#x}", block.as_ptr() as usize);

    // Lazily construct the singleton; readiness is its own business
    let input = InputService::instance();
    println!("InputService exists, ready = {}", input.is_initialized());
    input.ready.mark_ready();
    println!("InputService ready = {}", input.is_initialized());
    register_teardown(input);

    // Worker threads are named from the configured prefix and dispatch
    // teardown hooks when they exit
    let worker = spawn_default_worker(|| {
        let name = std::thread::current().name().map(str::to_string);
        let service = InputService::instance();
        println!(
            "Worker {:?} sees ready = {}",
            name,
            service.is_initialized()
        );
    })?;
    worker.join().expect("worker panicked");
    println!(
        "Teardown hook fired {} time(s)",
        input.thread_exits.load(Ordering::SeqCst)
    );

    // A deliberate leak shows up in the diagnostic report
    let report = system::check_for_allocator_leaks()?;
    println!("Outstanding allocations: {} ({} bytes)", report.count, report.bytes);

    // Return the block and shut the singleton down before the window closes
    unsafe { allocator.deallocate(block, layout) };
    input.shutdown();

    println!("Dropping the guard closes the kernel window");
    Ok(())
}
