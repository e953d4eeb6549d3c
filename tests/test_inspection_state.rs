mod common;

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use common::*;
use shapesort::state::Counters;

fn state_with_cooldown(cooldown: Duration) -> InspectionState {
    InspectionState::new(cooldown, ExpectedSpec::default())
}

#[test]
fn test_judging_against_default_spec() {
    let spec = ExpectedSpec::default();
    assert_eq!(spec.shape, Shape::Rectangle);
    assert_eq!(spec.area, 1000.0);
    assert_eq!(spec.tolerance, 300.0);

    assert_eq!(spec.judge(Shape::Rectangle, 1200.0), Verdict::Good);
    assert_eq!(spec.judge(Shape::Rectangle, 1500.0), Verdict::Bad);
    assert_eq!(spec.judge(Shape::Circle, 1000.0), Verdict::Bad);
}

#[test]
fn test_tolerance_boundary_is_inclusive() {
    let spec = ExpectedSpec::sanitized(Shape::Square, 1000.0, 300.0);
    assert_eq!(spec.judge(Shape::Square, 1300.0), Verdict::Good);
    assert_eq!(spec.judge(Shape::Square, 700.0), Verdict::Good);
    assert_eq!(spec.judge(Shape::Square, 1300.5), Verdict::Bad);
}

#[test]
fn test_zero_tolerance_needs_exact_area() {
    let spec = ExpectedSpec::sanitized(Shape::Circle, 500.0, 0.0);
    assert_eq!(spec.judge(Shape::Circle, 500.0), Verdict::Good);
    assert_eq!(spec.judge(Shape::Circle, 501.0), Verdict::Bad);
}

#[test]
fn test_evaluate_counts_and_snapshots() {
    let state = state_with_cooldown(Duration::from_secs(2));
    let start = Instant::now();

    let decision = state.evaluate(Shape::Rectangle, 1200.0, start).unwrap();
    assert_eq!(decision.verdict, Verdict::Good);

    let snapshot = state.get_snapshot();
    assert_eq!(snapshot.counters, Counters { total: 1, good: 1, bad: 0 });
    assert_eq!(snapshot.last.shape, Some(Shape::Rectangle));
    assert_eq!(snapshot.last.area, 1200.0);
    assert_eq!(snapshot.last.result, Some(Verdict::Good));
    assert_eq!(snapshot.last.timestamp, Some(start));
    assert_eq!(snapshot.last.id, Some(decision.id));
    assert!(snapshot.last.detected_at.is_some());

    let later = start + Duration::from_secs(3);
    let decision = state.evaluate(Shape::Circle, 1000.0, later).unwrap();
    assert_eq!(decision.verdict, Verdict::Bad);
    let counters = state.get_snapshot().counters;
    assert_eq!(counters, Counters { total: 2, good: 1, bad: 1 });
}

#[test]
fn test_cooldown_suppresses_repeat_detections() {
    let state = state_with_cooldown(Duration::from_secs(2));
    let start = Instant::now();

    assert!(state.evaluate(Shape::Rectangle, 1000.0, start).is_some());
    assert!(state.evaluate(Shape::Rectangle, 1500.0, start + Duration::from_millis(500)).is_none());
    assert!(state.evaluate(Shape::Circle, 900.0, start + Duration::from_millis(1999)).is_none());

    let snapshot = state.get_snapshot();
    assert_eq!(snapshot.counters.total, 1);
    assert_eq!(snapshot.last.area, 1000.0);

    // the window is measured from the last counted detection
    assert!(state.evaluate(Shape::Rectangle, 1100.0, start + Duration::from_secs(2)).is_some());
    assert_eq!(state.get_snapshot().counters.total, 2);
}

#[test]
fn test_record_detection_respects_cooldown() {
    let state = state_with_cooldown(Duration::from_secs(2));
    let start = Instant::now();

    assert!(state.record_detection(Shape::Square, 800.0, Verdict::Bad, start));
    assert!(!state.record_detection(Shape::Square, 800.0, Verdict::Good, start + Duration::from_secs(1)));

    let snapshot = state.get_snapshot();
    assert_eq!(snapshot.counters, Counters { total: 1, good: 0, bad: 1 });
    assert_eq!(snapshot.last.result, Some(Verdict::Bad));
}

#[test]
fn test_racing_evaluations_count_once() {
    let state = Arc::new(state_with_cooldown(Duration::from_secs(2)));
    let now = Instant::now();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let state = state.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                state.evaluate(Shape::Rectangle, 1000.0 + i as f64, now)
            })
        })
        .collect();

    let winners: Vec<_> = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap())
        .collect();
    assert_eq!(winners.len(), 1);

    let snapshot = state.get_snapshot();
    assert_eq!(snapshot.counters.total, 1);
    assert_eq!(snapshot.last.area, winners[0].area);
}

#[test]
fn test_total_is_sum_of_good_and_bad() {
    let state = state_with_cooldown(Duration::ZERO);
    let start = Instant::now();
    let inputs = [
        (Shape::Rectangle, 1000.0),
        (Shape::Rectangle, 2000.0),
        (Shape::Triangle, 1000.0),
        (Shape::Rectangle, 800.0),
        (Shape::Unknown, 0.0),
    ];

    for (i, (shape, area)) in inputs.iter().enumerate() {
        state.evaluate(*shape, *area, start + Duration::from_millis(i as u64));
        let c = state.get_snapshot().counters;
        assert_eq!(c.total, c.good + c.bad);
        if i == 2 {
            state.reset_counters();
        }
    }

    let c = state.get_snapshot().counters;
    assert_eq!(c, Counters { total: 2, good: 1, bad: 1 });
}

#[test]
fn test_reset_is_idempotent_and_keeps_last_detection() {
    let state = state_with_cooldown(Duration::from_secs(2));
    state.evaluate(Shape::Rectangle, 1200.0, Instant::now());

    state.reset_counters();
    assert_eq!(state.get_snapshot().counters, Counters::default());
    state.reset_counters();
    let snapshot = state.get_snapshot();
    assert_eq!(snapshot.counters, Counters::default());
    assert_eq!(snapshot.last.shape, Some(Shape::Rectangle));
}

#[test]
fn test_set_expected_clamps_negative_tolerance() {
    let state = InspectionState::default();
    let stored = state.set_expected(Shape::Circle, 750.0, -50.0);
    assert_eq!(stored, ExpectedSpec::sanitized(Shape::Circle, 750.0, 0.0));
    assert_eq!(state.expected().tolerance, 0.0);
}

#[test]
fn test_new_spec_applies_to_next_decision() {
    let state = state_with_cooldown(Duration::ZERO);
    let start = Instant::now();
    state.set_expected(Shape::Circle, 2000.0, 100.0);

    let decision = state.evaluate(Shape::Circle, 2050.0, start).unwrap();
    assert_eq!(decision.verdict, Verdict::Good);
    let decision = state.evaluate(Shape::Rectangle, 2050.0, start + Duration::from_millis(1)).unwrap();
    assert_eq!(decision.verdict, Verdict::Bad);
}

#[test]
fn test_lenient_input_falls_back_to_defaults() {
    let state = InspectionState::default();

    let stored = state.set_expected_from_input("Cercle", "abc", "");
    assert_eq!(stored.shape, Shape::Circle);
    assert_eq!(stored.area, 1000.0);
    assert_eq!(stored.tolerance, 300.0);

    let stored = state.set_expected_from_input("Square", " 640.5 ", "-3");
    assert_eq!(stored, ExpectedSpec::sanitized(Shape::Square, 640.5, 0.0));

    let (spec, errors) = ExpectedSpec::parse_lenient("hexagon", "NaN", "12");
    assert_eq!(spec.shape, Shape::Rectangle);
    assert_eq!(spec.area, 1000.0);
    assert_eq!(spec.tolerance, 12.0);
    assert_eq!(errors.len(), 2);
}

#[test]
fn test_unknown_is_never_stored_as_expected_shape() {
    let state = state_with_cooldown(Duration::ZERO);

    let stored = state.set_expected_from_input("Cercle", "800", "50");
    assert_eq!(stored.shape, Shape::Circle);

    let (spec, errors) = ExpectedSpec::parse_lenient("Unknown", "800", "50");
    assert_eq!(spec.shape, Shape::Rectangle);
    assert_eq!(errors.len(), 1);

    let stored = state.set_expected_from_input("inconnu", "800", "50");
    assert_eq!(stored.shape, Shape::Rectangle);

    let stored = state.set_expected(Shape::Unknown, 800.0, 50.0);
    assert_eq!(stored.shape, Shape::Rectangle);
    assert_eq!(state.get_snapshot().expected.shape, Shape::Rectangle);
}
