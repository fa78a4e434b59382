//! Tracked allocation with outstanding-block diagnostics.
//!
//! [`TrackingAllocator`] delegates real allocation work to the platform
//! allocator and keeps a record of every block that has been handed out and
//! not yet returned. The records are what the system gate's leak check
//! reports at teardown.

use std::alloc::{GlobalAlloc, Layout, System};
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use log::warn;
use parking_lot::Mutex;

use keel_core::error::AllocatorError;
use keel_core::log_event;
use keel_core::logging::LogLevel;

/// The allocator interface every kernel facility allocates through.
///
/// Implementations must be internally synchronized; any thread may call any
/// method concurrently during the active window.
pub trait KernelAlloc: Send + Sync {
    /// Allocate a block for the given layout.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocatorError>;

    /// Return a block to the allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this allocator with
    /// the same `layout`, and must not have been deallocated already.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Get cumulative allocation statistics.
    fn stats(&self) -> AllocStats;

    /// Get the diagnostic listing of currently outstanding blocks.
    fn outstanding(&self) -> LeakReport;
}

/// Statistics about allocator usage
#[derive(Debug, Default, Clone)]
pub struct AllocStats {
    /// Number of blocks allocated over the allocator's lifetime
    pub total_allocations: u64,

    /// Number of blocks freed over the allocator's lifetime
    pub total_frees: u64,

    /// Number of blocks currently outstanding
    pub live_blocks: usize,

    /// Bytes currently outstanding
    pub live_bytes: usize,

    /// High-water mark of outstanding bytes
    pub peak_live_bytes: usize,
}

/// Identity of a single outstanding block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRecord {
    /// Address of the block
    pub addr: usize,

    /// Size of the block in bytes
    pub size: usize,

    /// Alignment of the block
    pub align: usize,

    /// Monotonically increasing allocation number
    pub seq: u64,
}

/// Diagnostic listing of allocations that were made but never freed.
///
/// A leak report never frees anything; it only describes what is still
/// outstanding at the moment it was taken.
#[derive(Debug, Clone, Default)]
pub struct LeakReport {
    /// The outstanding blocks, in allocation order
    pub blocks: Vec<AllocationRecord>,

    /// Number of outstanding blocks
    pub count: usize,

    /// Total outstanding bytes
    pub bytes: usize,
}

impl LeakReport {
    /// Whether nothing was outstanding when the report was taken.
    pub fn is_clean(&self) -> bool {
        self.count == 0
    }

    /// Emit the report to the log, listing at most `limit` blocks.
    pub fn log(&self, limit: usize) {
        if self.is_clean() {
            log_event!(LogLevel::Debug, "no outstanding kernel allocations");
            return;
        }

        log_event!(
            LogLevel::Warning,
            "outstanding kernel allocations",
            count => self.count,
            bytes => self.bytes,
        );

        for record in self.blocks.iter().take(limit) {
            log_event!(
                LogLevel::Warning,
                "leaked block",
                seq => record.seq,
                addr => format!("{:#x}", record.addr),
                size => record.size,
                align => record.align,
            );
        }

        if self.count > limit {
            log_event!(
                LogLevel::Warning,
                "leaked block listing truncated",
                suppressed => self.count - limit,
            );
        }
    }
}

/// Default kernel allocator.
///
/// Delegates to the platform allocator and keeps one record per live block.
/// The bookkeeping map is guarded by a mutex; the cumulative counters are
/// plain atomics so `stats` never contends with allocation traffic.
pub struct TrackingAllocator {
    /// Live blocks keyed by address
    live: Mutex<HashMap<usize, AllocationRecord>>,

    /// Next allocation sequence number
    next_seq: AtomicU64,

    /// Number of blocks allocated over this allocator's lifetime
    total_allocations: AtomicU64,

    /// Number of blocks freed over this allocator's lifetime
    total_frees: AtomicU64,

    /// Bytes currently outstanding
    live_bytes: AtomicUsize,

    /// High-water mark of outstanding bytes
    peak_live_bytes: AtomicUsize,
}

impl TrackingAllocator {
    /// Create a new tracking allocator with empty bookkeeping.
    pub fn new() -> Self {
        Self {
            live: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
            total_allocations: AtomicU64::new(0),
            total_frees: AtomicU64::new(0),
            live_bytes: AtomicUsize::new(0),
            peak_live_bytes: AtomicUsize::new(0),
        }
    }

    /// Update the peak-bytes high-water mark using compare-and-swap.
    fn update_peak(&self, candidate: usize) {
        let mut current_peak = self.peak_live_bytes.load(Ordering::Relaxed);

        while candidate > current_peak {
            match self.peak_live_bytes.compare_exchange(
                current_peak,
                candidate,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current_peak = actual,
            }
        }
    }
}

impl Default for TrackingAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelAlloc for TrackingAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocatorError> {
        if layout.size() == 0 {
            return Err(AllocatorError::InvalidLayout(
                "zero-sized allocation".to_string(),
            ));
        }

        // SAFETY: layout has non-zero size, checked above.
        let raw = unsafe { System.alloc(layout) };

        let ptr =
            NonNull::new(raw).ok_or_else(|| AllocatorError::ExhaustedMemory(layout.size()))?;

        let record = AllocationRecord {
            addr: ptr.as_ptr() as usize,
            size: layout.size(),
            align: layout.align(),
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
        };

        self.live.lock().insert(record.addr, record);

        self.total_allocations.fetch_add(1, Ordering::Relaxed);
        let live = self.live_bytes.fetch_add(layout.size(), Ordering::SeqCst) + layout.size();
        self.update_peak(live);

        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        let addr = ptr.as_ptr() as usize;

        if self.live.lock().remove(&addr).is_none() {
            // Untracked frees stay out of the counters; stats only describe
            // blocks this allocator handed out.
            warn!("freeing untracked block at {:#x} ({} bytes)", addr, layout.size());
        } else {
            self.live_bytes.fetch_sub(layout.size(), Ordering::SeqCst);
            self.total_frees.fetch_add(1, Ordering::Relaxed);
        }

        // SAFETY: caller guarantees ptr came from System.alloc with this layout.
        unsafe { System.dealloc(ptr.as_ptr(), layout) }
    }

    fn stats(&self) -> AllocStats {
        AllocStats {
            total_allocations: self.total_allocations.load(Ordering::Relaxed),
            total_frees: self.total_frees.load(Ordering::Relaxed),
            live_blocks: self.live.lock().len(),
            live_bytes: self.live_bytes.load(Ordering::SeqCst),
            peak_live_bytes: self.peak_live_bytes.load(Ordering::SeqCst),
        }
    }

    fn outstanding(&self) -> LeakReport {
        let mut blocks: Vec<AllocationRecord> = self.live.lock().values().copied().collect();
        blocks.sort_by_key(|record| record.seq);

        let count = blocks.len();
        let bytes = blocks.iter().map(|record| record.size).sum();

        LeakReport {
            blocks,
            count,
            bytes,
        }
    }
}
