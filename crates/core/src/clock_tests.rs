use super::*;

#[test]
fn fake_clock_advances_only_when_told() {
    let clock = FakeClock::new();
    let t0 = clock.now();
    assert_eq!(clock.now(), t0);
    clock.advance(Duration::from_secs(5));
    assert_eq!(clock.now(), t0 + Duration::from_secs(5));
}

#[test]
fn system_clock_is_monotonic() {
    let clock = SystemClock;
    let t0 = clock.now();
    let t1 = clock.now();
    assert!(t1 >= t0);
}
