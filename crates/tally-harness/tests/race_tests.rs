//! Guarded vs unguarded under the race harness
//!
//! Run with: cargo test --package tally-harness --test race_tests

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::time::Duration;
use tally_harness::{
    run_async_stress, run_probe, run_simulator, run_stress, CounterMode, SimulatorConfig,
    Violation,
};
use tally_test_utils::init_tracing;

#[test]
fn guarded_simulation_has_no_violations() {
    init_tracing();
    let config = SimulatorConfig::new()
        .with_seed(7)
        .with_threads(8)
        .with_ops_per_thread(2000);

    let report = run_simulator(&config).unwrap();

    assert!(report.passed(), "{}", report.generate_text());
    assert_eq!(report.final_value, report.expected_value);
    assert_eq!(report.stats.operations, 8 * 2000);
    assert_eq!(report.stats.overlaps, 0);
    assert!(report.stats.contended.is_some());
}

#[test]
fn guarded_simulation_with_dwell_keeps_sections_apart() {
    let config = SimulatorConfig::new()
        .with_threads(6)
        .with_ops_per_thread(40)
        .with_dwell_us(100);

    let report = run_simulator(&config).unwrap();

    assert!(report.passed(), "{}", report.generate_text());
    assert_eq!(report.stats.max_concurrency, 1);
}

#[test]
fn unguarded_simulation_with_dwell_overlaps() {
    let config = SimulatorConfig::new()
        .with_mode(CounterMode::Unguarded)
        .with_threads(8)
        .with_ops_per_thread(100)
        .with_dwell_us(200);

    let report = run_simulator(&config).unwrap();

    assert!(!report.passed());
    assert!(report.stats.contended.is_none());
    assert!(report
        .violations
        .iter()
        .any(|v| matches!(v, Violation::OverlappingCriticalSections { .. })));
}

#[test]
fn stop_on_first_violation_keeps_one() {
    let mut config = SimulatorConfig::new()
        .with_mode(CounterMode::Unguarded)
        .with_threads(8)
        .with_ops_per_thread(100)
        .with_dwell_us(200);
    config.stop_on_first_violation = true;

    let report = run_simulator(&config).unwrap();

    assert_eq!(report.violations.len(), 1);
}

#[test]
fn guarded_probe_serializes_every_increment() {
    let report = run_probe(CounterMode::Guarded, 8, Duration::from_millis(2)).unwrap();

    assert!(report.passed());
    assert_eq!(report.final_value, 8);
    assert_eq!(report.max_concurrency, 1);
}

#[test]
fn unguarded_probe_loses_updates() {
    let report = run_probe(CounterMode::Unguarded, 8, Duration::from_millis(5)).unwrap();

    assert!(!report.passed());
    assert!(report.overlaps > 0);
    assert!(report.lost_updates() > 0);
    assert!(report.final_value < 8);
}

#[test]
fn stress_50_by_1000() {
    let report = run_stress(50, 1000).unwrap();

    assert!(report.success);
    assert_eq!(report.final_value, 50_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn async_stress_has_no_lost_updates() {
    let report = run_async_stress(32, 500).await.unwrap();

    assert!(report.success);
    assert_eq!(report.final_value, 16_000);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_guarded_simulation_always_passes(
        seed in any::<u64>(),
        threads in 1..6usize,
        ops in 0..300u64,
    ) {
        let config = SimulatorConfig::new()
            .with_seed(seed)
            .with_threads(threads)
            .with_ops_per_thread(ops);
        let report = run_simulator(&config).unwrap();
        prop_assert!(report.passed());
        prop_assert_eq!(report.final_value, report.expected_value);
    }
}
