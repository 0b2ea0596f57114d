//! Tests for clocks and due-time arithmetic

use std::time::Duration;

use chrono::{TimeDelta, TimeZone, Utc};

use hook_agent::util::{delay_until, remaining, truncate_to_minute, Clock, ManualClock};

#[test]
fn test_manual_clock_advance_and_set() {
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    assert_eq!(clock.now(), start);

    clock.advance(TimeDelta::minutes(3));
    assert_eq!(clock.now(), start + TimeDelta::minutes(3));

    clock.advance(TimeDelta::seconds(-30));
    assert_eq!(clock.now(), start + TimeDelta::seconds(150));

    let later = Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap();
    clock.set(later);
    assert_eq!(clock.now(), later);
}

#[test]
fn test_remaining_is_signed() {
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
    assert_eq!(remaining(now + TimeDelta::seconds(30), now), TimeDelta::seconds(30));
    assert_eq!(remaining(now - TimeDelta::seconds(121), now), TimeDelta::seconds(-121));
}

#[test]
fn test_delay_until_clamps_overdue() {
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
    assert_eq!(delay_until(now - TimeDelta::hours(1), now), Duration::ZERO);
    assert_eq!(delay_until(now, now), Duration::ZERO);
    assert_eq!(
        delay_until(now + TimeDelta::milliseconds(1500), now),
        Duration::from_millis(1500)
    );
}

#[test]
fn test_truncate_before_epoch() {
    let at = Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 30).unwrap();
    assert_eq!(
        truncate_to_minute(at),
        Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 0).unwrap()
    );
}
