//! Lightweight peak tracking for admitted slots.

use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct PeakTracker {
    peak: AtomicUsize,
}

impl PeakTracker {
    pub fn new() -> Self {
        Self {
            peak: AtomicUsize::new(0),
        }
    }

    /// Record a new in-flight value; updates peak if higher.
    pub fn record(&self, in_flight: usize) {
        let mut cur = self.peak.load(Ordering::Relaxed);
        while in_flight > cur {
            match self.peak.compare_exchange(
                cur,
                in_flight,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => cur = observed,
            }
        }
        tracing::trace!(in_flight, peak = self.peak.load(Ordering::Relaxed), "quota usage");
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }
}
