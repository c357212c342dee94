use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::info;

// Count what one extraction wrote.
#[derive(Debug)]
pub struct ExtractionStats {
    entries_written: AtomicU64,
    bytes_written: AtomicU64,
    started_on: Instant,
}

impl ExtractionStats {
    pub fn new() -> Self {
        Self {
            entries_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            started_on: Instant::now(),
        }
    }

    pub fn record_entry(&self, bytes: u64) {
        self.entries_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn entries_written(&self) -> u64 {
        self.entries_written.load(Ordering::Relaxed)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    pub fn log(&self) {
        let elapsed_ms = self.started_on.elapsed().as_millis() as u64;
        info!(
            entries_written = self.entries_written(),
            bytes_written = self.bytes_written(),
            elapsed_ms,
            "extraction summary"
        );
    }
}
