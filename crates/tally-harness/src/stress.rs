//! Stress and exclusion runs
//!
//! `run_stress` is the "no lost updates" property at scale: N threads,
//! M increments each, the final value must be N x M. `run_probe` is the
//! instrumented mutual-exclusion check: every thread performs one slow
//! increment and the probe reports whether any of them overlapped.

use crate::error::HarnessError;
use crate::probe::OverlapProbe;
use crate::racy::RacyCounter;
use crate::simulator::CounterMode;
use crate::target::SharedCounter;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use tally_core::{AsyncGuardedCounter, GuardedCounter};
use tokio::task::JoinSet;

/// Stress run results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressReport {
    pub workers: usize,
    pub iterations: usize,
    pub expected: i64,
    pub final_value: i64,
    pub contended: u64,
    pub elapsed_ms: u64,
    pub ops_per_sec: f64,
    pub success: bool,
}

impl StressReport {
    fn new(workers: usize, iterations: usize, final_value: i64, contended: u64, elapsed: Duration) -> Self {
        let total = workers.saturating_mul(iterations);
        let expected = i64::try_from(total).unwrap_or(i64::MAX);
        let secs = elapsed.as_secs_f64();
        Self {
            workers,
            iterations,
            expected,
            final_value,
            contended,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            ops_per_sec: if secs > 0.0 { total as f64 / secs } else { 0.0 },
            success: final_value == expected,
        }
    }
}

/// `threads` x `iterations` increments on one [`GuardedCounter`]
///
/// # Errors
/// - `HarnessError::InvalidConfig` for zero threads
/// - `HarnessError::Counter` if an increment is rejected
/// - `HarnessError::WorkerPanicked` if a worker panics
pub fn run_stress(threads: usize, iterations: usize) -> Result<StressReport, HarnessError> {
    if threads == 0 {
        return Err(HarnessError::invalid_config("threads must be at least 1"));
    }

    let counter = GuardedCounter::new();
    let barrier = Barrier::new(threads);
    let start = Instant::now();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let (counter, barrier) = (&counter, &barrier);
                scope.spawn(move || {
                    barrier.wait();
                    (0..iterations).try_for_each(|_| counter.increment())
                })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .try_for_each(|(idx, handle)| {
                handle.join().map_err(|_| HarnessError::WorkerPanicked(idx))??;
                Ok::<_, HarnessError>(())
            })
    })?;

    let report = StressReport::new(
        threads,
        iterations,
        counter.read(),
        counter.stats().contended,
        start.elapsed(),
    );
    tracing::info!(
        threads,
        iterations,
        final_value = report.final_value,
        elapsed_ms = report.elapsed_ms,
        "stress run finished"
    );
    Ok(report)
}

/// `tasks` x `iterations` increments on one [`AsyncGuardedCounter`]
///
/// Tasks are spawned on the current tokio runtime.
///
/// # Errors
/// As for [`run_stress`].
pub async fn run_async_stress(tasks: usize, iterations: usize) -> Result<StressReport, HarnessError> {
    if tasks == 0 {
        return Err(HarnessError::invalid_config("tasks must be at least 1"));
    }

    let counter = Arc::new(AsyncGuardedCounter::new());
    let start = Instant::now();

    let mut set = JoinSet::new();
    for idx in 0..tasks {
        let counter = Arc::clone(&counter);
        set.spawn(async move {
            for _ in 0..iterations {
                counter.increment().await?;
            }
            Ok::<_, HarnessError>(idx)
        });
    }
    while let Some(joined) = set.join_next().await {
        // JoinError carries no index; report the count still running.
        joined.map_err(|_| HarnessError::WorkerPanicked(set.len()))??;
    }

    let report = StressReport::new(
        tasks,
        iterations,
        counter.read().await,
        counter.stats().await.contended,
        start.elapsed(),
    );
    tracing::info!(
        tasks,
        iterations,
        final_value = report.final_value,
        elapsed_ms = report.elapsed_ms,
        "async stress run finished"
    );
    Ok(report)
}

/// Mutual-exclusion probe results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub mode: CounterMode,
    pub threads: usize,
    pub dwell_us: u64,
    pub overlaps: u64,
    pub max_concurrency: usize,
    pub expected: i64,
    pub final_value: i64,
}

impl ProbeReport {
    /// Increments that were overwritten by a concurrent step
    #[inline]
    #[must_use]
    pub fn lost_updates(&self) -> i64 {
        self.expected - self.final_value
    }

    /// No overlapping windows and nothing lost
    #[inline]
    #[must_use]
    pub fn passed(&self) -> bool {
        self.overlaps == 0 && self.lost_updates() == 0
    }
}

/// One slow increment per thread, all released together
///
/// Each increment reads, sleeps `dwell`, then writes. With the guard the
/// windows line up one after another; without it they pile on top of each
/// other and most increments are lost.
///
/// # Errors
/// As for [`run_stress`].
pub fn run_probe(
    mode: CounterMode,
    threads: usize,
    dwell: Duration,
) -> Result<ProbeReport, HarnessError> {
    if threads == 0 {
        return Err(HarnessError::invalid_config("threads must be at least 1"));
    }

    match mode {
        CounterMode::Guarded => probe_with(&GuardedCounter::new(), mode, threads, dwell),
        CounterMode::Unguarded => probe_with(&RacyCounter::new(), mode, threads, dwell),
    }
}

fn probe_with<C: SharedCounter>(
    counter: &C,
    mode: CounterMode,
    threads: usize,
    dwell: Duration,
) -> Result<ProbeReport, HarnessError> {
    let probe = OverlapProbe::new();
    let barrier = Barrier::new(threads);

    thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let (probe, barrier) = (&probe, &barrier);
                scope.spawn(move || {
                    barrier.wait();
                    counter.increment(probe, dwell)
                })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .try_for_each(|(idx, handle)| {
                handle.join().map_err(|_| HarnessError::WorkerPanicked(idx))?
            })
    })?;

    let report = ProbeReport {
        mode,
        threads,
        dwell_us: u64::try_from(dwell.as_micros()).unwrap_or(u64::MAX),
        overlaps: probe.overlaps(),
        max_concurrency: probe.max_concurrency(),
        expected: i64::try_from(threads).unwrap_or(i64::MAX),
        final_value: counter.read(),
    };
    tracing::info!(
        counter = counter.name(),
        overlaps = report.overlaps,
        lost = report.lost_updates(),
        "probe run finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stress_rejects_zero_threads() {
        assert!(matches!(
            run_stress(0, 10),
            Err(HarnessError::InvalidConfig(_))
        ));
    }

    #[test]
    fn small_stress_run() {
        let report = run_stress(4, 250).unwrap();
        assert!(report.success);
        assert_eq!(report.expected, 1000);
        assert_eq!(report.final_value, 1000);
    }

    #[test]
    fn zero_iterations_is_trivially_exact() {
        let report = run_stress(3, 0).unwrap();
        assert!(report.success);
        assert_eq!(report.final_value, 0);
    }

    #[test]
    fn probe_report_accounting() {
        let report = ProbeReport {
            mode: CounterMode::Unguarded,
            threads: 8,
            dwell_us: 100,
            overlaps: 3,
            max_concurrency: 4,
            expected: 8,
            final_value: 5,
        };
        assert_eq!(report.lost_updates(), 3);
        assert!(!report.passed());
    }
}
