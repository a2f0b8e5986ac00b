//! Progress reporting for batch refreshes.
//!
//! Parks may be processed on parallel rayon threads, so implementations must
//! be `Send + Sync`.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// Trait for receiving progress updates during a batch refresh.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any park is processed.
    fn on_start(&self, total: u32);
    /// Called after a park finished, successfully or not.
    fn on_park_done(&self, park_unit: &str, succeeded: bool);
}

/// Ignores all updates.
pub struct NoopProgress;

impl BatchProgressCallback for NoopProgress {
    fn on_start(&self, _total: u32) {}
    fn on_park_done(&self, _park_unit: &str, _succeeded: bool) {}
}

/// Simple atomic progress tracker that can be polled from another thread.
pub struct AtomicProgressTracker {
    pub last_park: Mutex<String>,
    pub completed: AtomicU32,
    pub failed: AtomicU32,
    pub total: AtomicU32,
}

impl Default for AtomicProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicProgressTracker {
    pub fn new() -> Self {
        Self {
            last_park: Mutex::new(String::new()),
            completed: AtomicU32::new(0),
            failed: AtomicU32::new(0),
            total: AtomicU32::new(0),
        }
    }

    /// Parks finished so far, failures included.
    pub fn finished(&self) -> u32 {
        self.completed.load(Ordering::SeqCst) + self.failed.load(Ordering::SeqCst)
    }
}

impl BatchProgressCallback for AtomicProgressTracker {
    fn on_start(&self, total: u32) {
        self.completed.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
    }

    fn on_park_done(&self, park_unit: &str, succeeded: bool) {
        if let Ok(mut last) = self.last_park.lock() {
            *last = park_unit.to_string();
        }
        if succeeded {
            self.completed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }
}
