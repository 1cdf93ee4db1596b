//! Counters the simulator can drive

use crate::error::HarnessError;
use crate::probe::OverlapProbe;
use crate::racy::{pause, RacyCounter};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tally_core::GuardedCounter;

/// Result of a "feed them if nobody is left" step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "value")]
pub enum FeedOutcome {
    /// Value was zero when checked and still zero when acted on
    Fed,
    /// Value was non-zero, nothing done
    Skipped,
    /// Value was zero when checked but had changed by the time of the action
    FedStale(i64),
}

/// A shared integer the simulator can exercise
///
/// Every mutating step reads, waits `dwell`, then writes, and reports the
/// read-to-write window to the probe. A correct implementation keeps those
/// windows from overlapping.
pub trait SharedCounter: Sync {
    /// Read, wait `dwell`, write `read + 1`
    ///
    /// # Errors
    /// Whatever the underlying counter reports.
    fn increment(&self, probe: &OverlapProbe, dwell: Duration) -> Result<(), HarnessError>;

    /// Read, wait `dwell`, write `read - 1`
    ///
    /// # Errors
    /// Whatever the underlying counter reports.
    fn decrement(&self, probe: &OverlapProbe, dwell: Duration) -> Result<(), HarnessError>;

    /// Observe the current value
    fn read(&self) -> i64;

    /// Check for zero, wait `dwell`, then act
    fn feed_if_zero(&self, probe: &OverlapProbe, dwell: Duration) -> FeedOutcome;

    /// Short name for reports
    fn name(&self) -> &'static str;
}

impl SharedCounter for GuardedCounter {
    fn increment(&self, probe: &OverlapProbe, dwell: Duration) -> Result<(), HarnessError> {
        guarded_step(self, 1, probe, dwell)
    }

    fn decrement(&self, probe: &OverlapProbe, dwell: Duration) -> Result<(), HarnessError> {
        guarded_step(self, -1, probe, dwell)
    }

    fn read(&self) -> i64 {
        GuardedCounter::read(self)
    }

    fn feed_if_zero(&self, probe: &OverlapProbe, dwell: Duration) -> FeedOutcome {
        let acted = self.when_zero(|section| {
            let _inside = probe.enter();
            pause(dwell);
            section.value()
        });
        match acted {
            Some(0) => FeedOutcome::Fed,
            Some(value) => FeedOutcome::FedStale(value),
            None => FeedOutcome::Skipped,
        }
    }

    fn name(&self) -> &'static str {
        "guarded"
    }
}

fn guarded_step(
    counter: &GuardedCounter,
    delta: i64,
    probe: &OverlapProbe,
    dwell: Duration,
) -> Result<(), HarnessError> {
    counter.with_lock(|section| {
        let _inside = probe.enter();
        pause(dwell);
        section.add(delta).map(drop)
    })?;
    Ok(())
}

impl SharedCounter for RacyCounter {
    fn increment(&self, probe: &OverlapProbe, dwell: Duration) -> Result<(), HarnessError> {
        let _inside = probe.enter();
        self.step(1, dwell);
        Ok(())
    }

    fn decrement(&self, probe: &OverlapProbe, dwell: Duration) -> Result<(), HarnessError> {
        let _inside = probe.enter();
        self.step(-1, dwell);
        Ok(())
    }

    fn read(&self) -> i64 {
        RacyCounter::read(self)
    }

    fn feed_if_zero(&self, probe: &OverlapProbe, dwell: Duration) -> FeedOutcome {
        if RacyCounter::read(self) != 0 {
            return FeedOutcome::Skipped;
        }
        let _inside = probe.enter();
        pause(dwell);
        match RacyCounter::read(self) {
            0 => FeedOutcome::Fed,
            value => FeedOutcome::FedStale(value),
        }
    }

    fn name(&self) -> &'static str {
        "unguarded"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guarded_feed_only_at_zero() {
        let counter = GuardedCounter::new();
        let probe = OverlapProbe::new();
        assert_eq!(counter.feed_if_zero(&probe, Duration::ZERO), FeedOutcome::Fed);

        SharedCounter::increment(&counter, &probe, Duration::ZERO).unwrap();
        assert_eq!(counter.feed_if_zero(&probe, Duration::ZERO), FeedOutcome::Skipped);
        assert_eq!(SharedCounter::read(&counter), 1);
    }

    #[test]
    fn names() {
        assert_eq!(SharedCounter::name(&GuardedCounter::new()), "guarded");
        assert_eq!(SharedCounter::name(&RacyCounter::new()), "unguarded");
    }
}
