//! Testing utilities for the Tally workspace
//!
//! Shared helpers for driving counters from many threads at once.

#![allow(missing_docs)]

use std::sync::Barrier;
use std::thread;
use tally_core::GuardedCounter;

/// Install a test subscriber once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Run `op(thread_index, iteration)` `per_thread` times on each of `threads`
/// threads, all released together by a barrier.
///
/// Panics in any worker propagate to the caller.
pub fn hammer<F>(threads: usize, per_thread: usize, op: F)
where
    F: Fn(usize, usize) + Sync,
{
    let barrier = Barrier::new(threads);
    thread::scope(|scope| {
        for t in 0..threads {
            let barrier = &barrier;
            let op = &op;
            scope.spawn(move || {
                barrier.wait();
                for i in 0..per_thread {
                    op(t, i);
                }
            });
        }
    });
}

/// `threads` x `per_thread` increments
pub fn increment_concurrently(counter: &GuardedCounter, threads: usize, per_thread: usize) {
    hammer(threads, per_thread, |_, _| counter.increment().unwrap());
}

/// `pairs` incrementing threads racing `pairs` decrementing threads
pub fn cancel_concurrently(counter: &GuardedCounter, pairs: usize, per_thread: usize) {
    hammer(pairs * 2, per_thread, |t, _| {
        if t % 2 == 0 {
            counter.increment().unwrap();
        } else {
            counter.decrement().unwrap();
        }
    });
}

/// Counter with `value` already applied
pub fn counter_at(value: i64) -> GuardedCounter {
    let counter = GuardedCounter::new();
    counter.add(value).unwrap();
    counter
}
