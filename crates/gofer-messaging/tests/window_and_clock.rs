use chrono::{Duration, TimeZone, Utc};
use gofer_messaging::{Clock, ManualClock, Window};

#[test]
fn window_classification_follows_the_clock() {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    let window = Window::new(Some(start + Duration::seconds(10)), Some(start + Duration::seconds(20))).unwrap();

    assert!(window.future_at(clock.now()));
    clock.advance(Duration::seconds(10));
    assert!(window.current_at(clock.now()));
    clock.advance(Duration::seconds(10));
    assert!(window.current_at(clock.now()));
    clock.advance(Duration::seconds(1));
    assert!(window.past_at(clock.now()));
}

#[test]
fn open_ended_windows() {
    let now = Utc::now();
    let from = Window::new(Some(now), None).unwrap();
    assert!(!from.past_at(now + Duration::days(365)));
    let until = Window::new(None, Some(now)).unwrap();
    assert!(!until.future_at(now - Duration::days(365)));
}
