//! Race Simulator
//!
//! Drives a shared counter from several threads with a seeded, reproducible
//! mix of operations, then checks what the counter promised:
//!
//! - no lost updates: the final value equals the sum of every worker's net delta
//! - no torn reads: every observed value is one the counter could have held
//! - mutual exclusion: no two read-to-write windows overlapped
//! - atomic check-and-act: nobody was fed after the count stopped being zero
//!
//! Running the same configuration in [`CounterMode::Unguarded`] shows the
//! failures the guard exists to prevent.

use crate::error::HarnessError;
use crate::probe::OverlapProbe;
use crate::racy::RacyCounter;
use crate::target::{FeedOutcome, SharedCounter};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::{Duration, Instant};
use tally_core::{CounterConfig, GuardedCounter};

/// Which counter the simulator drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterMode {
    /// [`GuardedCounter`]
    #[default]
    Guarded,
    /// [`RacyCounter`]
    Unguarded,
}

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Worker threads
    pub threads: usize,
    /// Operations drawn by each worker
    pub ops_per_thread: u64,
    /// Counter under test
    pub mode: CounterMode,
    /// Pause between read and write inside each step, in microseconds
    pub dwell_us: u64,
    /// Stop conditions
    pub stop_on_first_violation: bool,
    /// Configuration for the guarded counter
    pub counter: CounterConfig,
}

impl SimulatorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With seed
    #[inline]
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// With worker count
    #[inline]
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// With operations per worker
    #[inline]
    #[must_use]
    pub fn with_ops_per_thread(mut self, ops: u64) -> Self {
        self.ops_per_thread = ops;
        self
    }

    /// With counter mode
    #[inline]
    #[must_use]
    pub fn with_mode(mut self, mode: CounterMode) -> Self {
        self.mode = mode;
        self
    }

    /// With dwell in microseconds
    #[inline]
    #[must_use]
    pub fn with_dwell_us(mut self, dwell_us: u64) -> Self {
        self.dwell_us = dwell_us;
        self
    }

    /// Dwell as a duration
    #[inline]
    #[must_use]
    pub fn dwell(&self) -> Duration {
        Duration::from_micros(self.dwell_us)
    }

    fn validate(&self) -> Result<(), HarnessError> {
        if self.threads == 0 {
            return Err(HarnessError::invalid_config("threads must be at least 1"));
        }
        Ok(())
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            threads: 8,
            ops_per_thread: 1000,
            mode: CounterMode::Guarded,
            dwell_us: 0,
            stop_on_first_violation: false,
            counter: CounterConfig::default().with_label("cats_alive"),
        }
    }
}

/// Operations a worker can draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulatedOperation {
    /// Add one
    Increment,
    /// Subtract one
    Decrement,
    /// Observe the value
    Read,
    /// Check for zero and act on it
    FeedIfZero,
}

impl SimulatedOperation {
    fn draw(rng: &mut StdRng) -> Self {
        match rng.gen_range(0..10u8) {
            0..=3 => Self::Increment,
            4..=6 => Self::Decrement,
            7..=8 => Self::Read,
            _ => Self::FeedIfZero,
        }
    }
}

/// A broken promise detected during simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Violation {
    /// Final value differs from the sum of applied steps
    LostUpdate {
        /// Sum of every worker's net delta
        expected: i64,
        /// Value read after all workers finished
        actual: i64,
    },
    /// A read returned a value the counter could never have held
    TornRead {
        /// Value returned by the read
        observed: i64,
        /// Lowest reachable value
        low: i64,
        /// Highest reachable value
        high: i64,
    },
    /// Two read-to-write windows were open at the same time
    OverlappingCriticalSections {
        /// Entries that found the region occupied
        overlaps: u64,
        /// Most threads seen inside at once
        max_concurrency: usize,
    },
    /// A worker acted on a zero check that was no longer true
    StaleZeroCheck {
        /// Value at the time of the action
        observed: i64,
    },
}

/// Statistics for simulation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorStats {
    pub operations: u64,
    pub increments: u64,
    pub decrements: u64,
    pub reads: u64,
    pub feeds: u64,
    pub skipped_feeds: u64,
    pub max_concurrency: usize,
    pub overlaps: u64,
    /// Guarded mode only: acquisitions that had to wait
    pub contended: Option<u64>,
    pub elapsed_ms: u64,
}

/// Final report from simulator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorReport {
    pub config: SimulatorConfig,
    pub stats: SimulatorStats,
    pub violations: Vec<Violation>,
    pub expected_value: i64,
    pub final_value: i64,
}

impl SimulatorReport {
    /// Check if simulation passed all criteria
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Render the report as pretty JSON
    ///
    /// # Errors
    /// Serialization failure from `serde_json`.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Generate text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Tally Race Simulator Report ===\n\n");
        report.push_str(&format!("Mode: {:?}\n", self.config.mode));
        report.push_str(&format!("Seed: {}\n", self.config.seed));
        report.push_str(&format!("Threads: {}\n", self.config.threads));
        report.push_str(&format!("Ops per Thread: {}\n", self.config.ops_per_thread));
        report.push_str(&format!("Dwell: {}us\n", self.config.dwell_us));
        report.push_str(&format!("Operations: {}\n", self.stats.operations));
        report.push_str(&format!("Increments: {}\n", self.stats.increments));
        report.push_str(&format!("Decrements: {}\n", self.stats.decrements));
        report.push_str(&format!("Reads: {}\n", self.stats.reads));
        report.push_str(&format!(
            "Feeds: {} (skipped {})\n",
            self.stats.feeds, self.stats.skipped_feeds
        ));
        report.push_str(&format!("Expected Value: {}\n", self.expected_value));
        report.push_str(&format!("Final Value: {}\n", self.final_value));
        report.push_str(&format!(
            "Max Concurrency: {} (SHOULD BE 1)\n",
            self.stats.max_concurrency
        ));
        if let Some(contended) = self.stats.contended {
            report.push_str(&format!("Contended Acquisitions: {contended}\n"));
        }
        report.push_str(&format!("Elapsed: {}ms\n", self.stats.elapsed_ms));
        report.push_str(&format!("Violations: {}\n", self.violations.len()));

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                report.push_str(&format!("{}. {:?}\n", i + 1, v));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));

        report
    }
}

/// What one worker did
#[derive(Debug, Default)]
struct WorkerOutcome {
    increments: u64,
    decrements: u64,
    reads: Vec<i64>,
    feeds: u64,
    skipped_feeds: u64,
    stale_feeds: Vec<i64>,
}

/// Run the race simulator
///
/// # Errors
/// - `HarnessError::InvalidConfig` for zero threads
/// - `HarnessError::Counter` if the guarded counter rejects a step
/// - `HarnessError::WorkerPanicked` if a worker thread panics
pub fn run_simulator(config: &SimulatorConfig) -> Result<SimulatorReport, HarnessError> {
    config.validate()?;

    match config.mode {
        CounterMode::Guarded => {
            let counter = GuardedCounter::with_config(config.counter.clone());
            let mut report = simulate(&counter, config)?;
            report.stats.contended = Some(counter.stats().contended);
            Ok(report)
        }
        CounterMode::Unguarded => simulate(&RacyCounter::new(), config),
    }
}

fn simulate<C: SharedCounter>(
    counter: &C,
    config: &SimulatorConfig,
) -> Result<SimulatorReport, HarnessError> {
    let probe = OverlapProbe::new();
    let stop = AtomicBool::new(false);
    let barrier = Barrier::new(config.threads);
    let dwell = config.dwell();

    tracing::info!(
        counter = counter.name(),
        threads = config.threads,
        ops = config.ops_per_thread,
        seed = config.seed,
        "simulation started"
    );
    let start = Instant::now();

    let outcomes = thread::scope(|scope| {
        let handles: Vec<_> = (0..config.threads)
            .map(|idx| {
                let (probe, stop, barrier) = (&probe, &stop, &barrier);
                scope.spawn(move || {
                    barrier.wait();
                    run_worker(counter, config, idx, probe, stop, dwell)
                })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(idx, handle)| {
                handle
                    .join()
                    .map_err(|_| HarnessError::WorkerPanicked(idx))?
            })
            .collect::<Result<Vec<_>, _>>()
    })?;

    let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    let final_value = counter.read();

    let mut stats = SimulatorStats {
        max_concurrency: probe.max_concurrency(),
        overlaps: probe.overlaps(),
        elapsed_ms,
        ..SimulatorStats::default()
    };
    for outcome in &outcomes {
        stats.increments += outcome.increments;
        stats.decrements += outcome.decrements;
        stats.reads += outcome.reads.len() as u64;
        stats.feeds += outcome.feeds;
        stats.skipped_feeds += outcome.skipped_feeds;
    }
    stats.operations =
        stats.increments + stats.decrements + stats.reads + stats.feeds + stats.skipped_feeds;

    let high = i64::try_from(stats.increments).unwrap_or(i64::MAX);
    let low = -i64::try_from(stats.decrements).unwrap_or(i64::MAX);
    let expected_value = high + low;

    let mut violations = Vec::new();
    if final_value != expected_value {
        violations.push(Violation::LostUpdate {
            expected: expected_value,
            actual: final_value,
        });
    }
    violations.extend(
        outcomes
            .iter()
            .flat_map(|o| o.reads.iter())
            .filter(|v| !(low..=high).contains(*v))
            .map(|&observed| Violation::TornRead {
                observed,
                low,
                high,
            }),
    );
    if stats.overlaps > 0 {
        violations.push(Violation::OverlappingCriticalSections {
            overlaps: stats.overlaps,
            max_concurrency: stats.max_concurrency,
        });
    }
    violations.extend(
        outcomes
            .iter()
            .flat_map(|o| o.stale_feeds.iter())
            .map(|&observed| Violation::StaleZeroCheck { observed }),
    );
    if config.stop_on_first_violation {
        violations.truncate(1);
    }

    if violations.is_empty() {
        tracing::info!(counter = counter.name(), final_value, elapsed_ms, "simulation passed");
    } else {
        tracing::warn!(
            counter = counter.name(),
            final_value,
            expected_value,
            violations = violations.len(),
            "simulation found violations"
        );
    }

    Ok(SimulatorReport {
        config: config.clone(),
        stats,
        violations,
        expected_value,
        final_value,
    })
}

fn run_worker<C: SharedCounter>(
    counter: &C,
    config: &SimulatorConfig,
    idx: usize,
    probe: &OverlapProbe,
    stop: &AtomicBool,
    dwell: Duration,
) -> Result<WorkerOutcome, HarnessError> {
    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(idx as u64));
    let mut outcome = WorkerOutcome::default();

    for _ in 0..config.ops_per_thread {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        match SimulatedOperation::draw(&mut rng) {
            SimulatedOperation::Increment => {
                counter.increment(probe, dwell)?;
                outcome.increments += 1;
            }
            SimulatedOperation::Decrement => {
                counter.decrement(probe, dwell)?;
                outcome.decrements += 1;
            }
            SimulatedOperation::Read => outcome.reads.push(counter.read()),
            SimulatedOperation::FeedIfZero => match counter.feed_if_zero(probe, dwell) {
                FeedOutcome::Fed => outcome.feeds += 1,
                FeedOutcome::Skipped => outcome.skipped_feeds += 1,
                FeedOutcome::FedStale(observed) => {
                    outcome.feeds += 1;
                    outcome.stale_feeds.push(observed);
                    if config.stop_on_first_violation {
                        stop.store(true, Ordering::Relaxed);
                    }
                }
            },
        }
    }

    Ok(outcome)
}
