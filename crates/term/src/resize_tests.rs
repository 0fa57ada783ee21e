// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn size(cols: u16, rows: u16) -> TerminalSize {
    TerminalSize { cols, rows }
}

#[test]
fn first_observation_always_applies() {
    let mut throttle = ResizeThrottle::new(Duration::from_millis(33), Duration::from_millis(75));
    let now = Instant::now();
    assert_eq!(throttle.observe(size(80, 24), now), ResizeDecision::Apply(size(80, 24)));
}

#[test]
fn rapid_resizes_within_window_coalesce() {
    let mut throttle = ResizeThrottle::new(Duration::from_millis(33), Duration::from_millis(75));
    let t0 = Instant::now();
    assert_eq!(throttle.observe(size(120, 40), t0), ResizeDecision::Apply(size(120, 40)));
    assert_eq!(throttle.observe(size(119, 40), t0 + Duration::from_millis(5)), ResizeDecision::Coalesced);
    assert_eq!(throttle.observe(size(118, 40), t0 + Duration::from_millis(10)), ResizeDecision::Coalesced);
    // Pending holds the most recent coalesced size.
    let drained = throttle.drain_pending(t0 + Duration::from_millis(40));
    assert_eq!(drained, Some(size(118, 40)));
}

#[test]
fn settle_fires_only_after_delay_since_last_layout_change() {
    let mut throttle = ResizeThrottle::new(Duration::from_millis(33), Duration::from_millis(75));
    let t0 = Instant::now();
    throttle.observe(size(100, 30), t0);
    assert_eq!(throttle.take_settled(t0 + Duration::from_millis(10)), None);
    assert_eq!(throttle.take_settled(t0 + Duration::from_millis(80)), Some(size(100, 30)));
    // Once taken, it doesn't fire again until another layout change.
    assert_eq!(throttle.take_settled(t0 + Duration::from_millis(200)), None);
}

#[test]
fn identical_size_does_not_reschedule_settle() {
    let mut throttle = ResizeThrottle::new(Duration::from_millis(10), Duration::from_millis(75));
    let t0 = Instant::now();
    throttle.observe(size(100, 30), t0);
    throttle.observe(size(100, 30), t0 + Duration::from_millis(20));
    // The settle deadline was set from the first observation, not pushed
    // out by the second identical one.
    assert_eq!(throttle.take_settled(t0 + Duration::from_millis(80)), Some(size(100, 30)));
}

#[test]
fn flush_bypasses_settle_delay() {
    let mut throttle = ResizeThrottle::new(Duration::from_millis(33), Duration::from_millis(75));
    let t0 = Instant::now();
    throttle.observe(size(90, 20), t0);
    assert_eq!(throttle.flush(), Some(size(90, 20)));
    assert_eq!(throttle.take_settled(t0 + Duration::from_millis(80)), None);
}

#[test]
fn drive_six_resizes_in_sixty_millis_yields_final_settled_size() {
    let mut throttle = ResizeThrottle::new(Duration::from_millis(33), Duration::from_millis(75));
    let t0 = Instant::now();
    let sizes = [(120, 40), (119, 40), (118, 40), (117, 39), (117, 38), (117, 37)];
    let mut applies = 0;
    for (i, (cols, rows)) in sizes.iter().enumerate() {
        let now = t0 + Duration::from_millis(i as u64 * 12);
        if matches!(throttle.observe(size(*cols, *rows), now), ResizeDecision::Apply(_)) {
            applies += 1;
        }
    }
    if let Some(pending) = throttle.drain_pending(t0 + Duration::from_millis(70)) {
        assert_eq!(pending, size(117, 37));
        applies += 1;
    }
    assert!(applies <= 2, "expected at most two applies, got {applies}");
    let settled = throttle.take_settled(t0 + Duration::from_millis(200));
    assert_eq!(settled, Some(size(117, 37)));
}
