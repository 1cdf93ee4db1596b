//! Overlap detection for critical sections

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counts threads inside an instrumented region
///
/// Wrap the body of a critical section in [`OverlapProbe::enter`]. Any entry
/// that finds another thread already inside is an overlap; a correctly
/// guarded region reports zero.
#[derive(Debug, Default)]
pub struct OverlapProbe {
    inside: AtomicUsize,
    max_inside: AtomicUsize,
    entries: AtomicU64,
    overlaps: AtomicU64,
}

impl OverlapProbe {
    /// Create an idle probe
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the calling thread as inside until the guard drops
    #[must_use = "the region ends when the guard is dropped"]
    pub fn enter(&self) -> ProbeGuard<'_> {
        let already = self.inside.fetch_add(1, Ordering::SeqCst);
        self.entries.fetch_add(1, Ordering::Relaxed);
        if already > 0 {
            self.overlaps.fetch_add(1, Ordering::Relaxed);
        }
        self.max_inside.fetch_max(already + 1, Ordering::Relaxed);
        ProbeGuard { probe: self }
    }

    /// Entries that found the region occupied
    #[inline]
    #[must_use]
    pub fn overlaps(&self) -> u64 {
        self.overlaps.load(Ordering::Relaxed)
    }

    /// Largest number of threads seen inside at once
    #[inline]
    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.max_inside.load(Ordering::Relaxed)
    }

    /// Total entries
    #[inline]
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.entries.load(Ordering::Relaxed)
    }
}

/// RAII marker returned by [`OverlapProbe::enter`]
#[derive(Debug)]
pub struct ProbeGuard<'a> {
    probe: &'a OverlapProbe,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.probe.inside.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_entries_never_overlap() {
        let probe = OverlapProbe::new();
        for _ in 0..3 {
            let _inside = probe.enter();
        }
        assert_eq!(probe.entries(), 3);
        assert_eq!(probe.overlaps(), 0);
        assert_eq!(probe.max_concurrency(), 1);
    }

    #[test]
    fn nested_entry_counts_as_overlap() {
        let probe = OverlapProbe::new();
        let _outer = probe.enter();
        {
            let _inner = probe.enter();
            assert_eq!(probe.max_concurrency(), 2);
        }
        assert_eq!(probe.overlaps(), 1);
    }
}
