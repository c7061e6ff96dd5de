//! Tests for `produce` and the Fibonacci source.

use std::thread;
use std::time::Duration;

use crossbeam_utils::thread::scope;
use handoff::{bounded, produce, unbounded, Fibonacci, Report, StopReason, Termination};
use proptest::prelude::*;

fn fib_prefix(n: usize) -> Vec<u64> {
    let mut terms = Vec::with_capacity(n);
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..n {
        terms.push(a);
        let next = a + b;
        a = b;
        b = next;
    }
    terms
}

fn drain_bounded(count: usize) -> (Vec<u64>, Report) {
    let (s, r) = bounded(0);

    scope(|scope| {
        let producer = scope.spawn(move |_| produce(Fibonacci::new(), s, Termination::After(count)));
        let values: Vec<u64> = r.iter().collect();
        (values, producer.join().unwrap())
    })
    .unwrap()
}

#[test]
fn ten_terms() {
    let (values, report) = drain_bounded(10);
    assert_eq!(values, [0, 1, 1, 2, 3, 5, 8, 13, 21, 34]);
    assert_eq!(
        report,
        Report {
            produced: 10,
            reason: StopReason::Completed,
        }
    );
}

#[test]
fn zero_terms_closes_immediately() {
    let (values, report) = drain_bounded(0);
    assert!(values.is_empty());
    assert_eq!(report.produced, 0);
    assert_eq!(report.reason, StopReason::Completed);
}

#[test]
fn one_term_still_closes() {
    let (values, report) = drain_bounded(1);
    assert_eq!(values, [0]);
    assert_eq!(report.reason, StopReason::Completed);
}

#[test]
fn short_source_is_exhausted() {
    let (s, r) = unbounded();
    let report = produce(vec![1, 2, 3], s, Termination::After(5));

    assert_eq!(report.produced, 3);
    assert_eq!(report.reason, StopReason::Exhausted);
    assert_eq!(r.iter().collect::<Vec<_>>(), [1, 2, 3]);
}

#[test]
fn bounded_producer_notices_missing_receiver() {
    let (s, r) = bounded(0);
    drop(r);

    let report = produce(Fibonacci::new(), s, Termination::After(10));
    assert_eq!(report.produced, 0);
    assert_eq!(report.reason, StopReason::Disconnected);
}

#[test]
fn producer_buffers_into_array_channel() {
    let (s, r) = bounded(4);
    let report = produce(Fibonacci::new(), s, Termination::After(4));

    assert_eq!(report.reason, StopReason::Completed);
    assert_eq!(r.iter().collect::<Vec<_>>(), [0, 1, 1, 2]);
}

#[test]
fn cancellation_stops_after_consumed_prefix() {
    for take in [0, 1, 2, 10, 25] {
        let (s, r) = bounded(0);
        let (quit_s, quit_r) = bounded::<()>(0);

        let (values, trailing, report) = scope(|scope| {
            let producer =
                scope.spawn(move |_| produce(Fibonacci::new(), s, Termination::Signal(quit_r)));

            let values: Vec<u64> = r.iter().take(take).collect();
            quit_s.send(()).unwrap();
            let trailing = r.iter().count();

            (values, trailing, producer.join().unwrap())
        })
        .unwrap();

        assert_eq!(values, fib_prefix(take));
        assert_eq!(trailing, 0);
        assert_eq!(
            report,
            Report {
                produced: take,
                reason: StopReason::Cancelled,
            }
        );
    }
}

#[test]
fn closing_the_signal_cancels() {
    let (s, r) = bounded::<u64>(0);
    let (quit_s, quit_r) = bounded::<()>(0);

    scope(|scope| {
        scope.spawn(move |_| {
            assert_eq!(r.recv(), Ok(0));
            thread::sleep(Duration::from_millis(100));
            drop(quit_s);
            // Keep the output channel open until the producer has noticed.
            thread::sleep(Duration::from_millis(100));
        });

        let report = produce(Fibonacci::new(), s, Termination::Signal(quit_r));
        assert_eq!(report.produced, 1);
        assert_eq!(report.reason, StopReason::Cancelled);
    })
    .unwrap();
}

#[test]
fn signal_producer_notices_missing_receiver() {
    let (s, r) = bounded::<u64>(0);
    let (_quit_s, quit_r) = bounded::<()>(0);
    drop(r);

    let report = produce(Fibonacci::new(), s, Termination::Signal(quit_r));
    assert_eq!(report.produced, 0);
    assert_eq!(report.reason, StopReason::Disconnected);
}

#[test]
fn signal_producer_runs_out_of_values() {
    let (s, r) = unbounded();
    let (_quit_s, quit_r) = bounded::<()>(0);

    let report = produce(0..3, s, Termination::Signal(quit_r));
    assert_eq!(report.produced, 3);
    assert_eq!(report.reason, StopReason::Exhausted);
    assert_eq!(r.iter().collect::<Vec<_>>(), [0, 1, 2]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn bounded_producer_emits_fibonacci_prefix(count in 0usize..60) {
        let (values, report) = drain_bounded(count);
        prop_assert_eq!(values, fib_prefix(count));
        prop_assert_eq!(report.produced, count);
        prop_assert_eq!(report.reason, StopReason::Completed);
    }

    #[test]
    fn every_term_is_the_sum_of_the_two_before(n in 2usize..94) {
        let terms: Vec<u64> = Fibonacci::new().take(n + 1).collect();
        prop_assert_eq!(terms[n], terms[n - 1] + terms[n - 2]);
    }
}
