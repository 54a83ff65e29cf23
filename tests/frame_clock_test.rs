use std::time::Duration;

use deferred_ngin::FrameClock;
use instant::Instant;

#[test]
fn first_tick_is_zero() {
    let mut clock = FrameClock::new();
    assert_eq!(clock.tick(Instant::now()), 0.0);
}

#[test]
fn delta_is_the_time_between_ticks() {
    let mut clock = FrameClock::new();
    let start = Instant::now();
    clock.tick(start);
    let delta = clock.tick(start + Duration::from_millis(250));
    assert!((delta - 0.25).abs() < 1e-4);
}

#[test]
fn delta_is_capped_after_a_stall() {
    let mut clock = FrameClock::new();
    let start = Instant::now();
    clock.tick(start);
    assert_eq!(clock.tick(start + Duration::from_secs(30)), FrameClock::MAX_DELTA);
}

#[test]
fn time_going_backwards_yields_zero() {
    let mut clock = FrameClock::new();
    let start = Instant::now();
    clock.tick(start + Duration::from_millis(100));
    assert_eq!(clock.tick(start), 0.0);
}

#[test]
fn reset_drops_the_backlog() {
    let mut clock = FrameClock::new();
    let start = Instant::now();
    clock.tick(start);
    clock.reset();
    assert_eq!(clock.tick(start + Duration::from_secs(5)), 0.0);
    let delta = clock.tick(start + Duration::from_secs(5) + Duration::from_millis(16));
    assert!((delta - 0.016).abs() < 1e-4);
}
