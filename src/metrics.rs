// Run metrics module
//
// Lightweight counters describing what a run did, logged when it ends

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters for one run
///
/// Uses atomic operations so the orchestrator (on a blocking worker) and the
/// controller (on the async runtime) can share one instance without locks.
#[derive(Debug)]
pub struct RunMetrics {
    /// Files copied into a destination folder
    pub files_copied: AtomicUsize,

    /// Files that failed a filter
    pub files_rejected: AtomicUsize,

    /// Files skipped because a same-sized copy already existed
    pub duplicates: AtomicUsize,

    /// Files whose copy failed
    pub copy_failures: AtomicUsize,

    /// Bytes copied
    pub bytes_copied: AtomicU64,

    /// Folder iterations that reached a terminal status
    pub folders_finished: AtomicUsize,

    start_time: Instant,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            files_copied: AtomicUsize::new(0),
            files_rejected: AtomicUsize::new(0),
            duplicates: AtomicUsize::new(0),
            copy_failures: AtomicUsize::new(0),
            bytes_copied: AtomicU64::new(0),
            folders_finished: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_copy(&self, bytes: u64) {
        self.files_copied.fetch_add(1, Ordering::Relaxed);
        self.bytes_copied.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.files_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_copy_failure(&self) {
        self.copy_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_folder_finished(&self) {
        self.folders_finished.fetch_add(1, Ordering::Relaxed);
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Copies per second since the metrics were created
    pub fn copy_rate(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.files_copied.load(Ordering::Relaxed) as f64 / secs
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Run Metrics Summary ===");
        tracing::info!("Elapsed: {:.2}s", self.elapsed().as_secs_f64());
        tracing::info!(
            "Files: {} copied, {} rejected, {} duplicates, {} failed",
            self.files_copied.load(Ordering::Relaxed),
            self.files_rejected.load(Ordering::Relaxed),
            self.duplicates.load(Ordering::Relaxed),
            self.copy_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Bytes copied: {} ({:.2} files/s)",
            self.bytes_copied.load(Ordering::Relaxed),
            self.copy_rate()
        );
        tracing::info!(
            "Folders finished: {}",
            self.folders_finished.load(Ordering::Relaxed)
        );
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}
