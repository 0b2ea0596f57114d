//! Tests for hook occurrences and dedup keys

use std::collections::HashSet;

use chrono::{TimeDelta, TimeZone, Utc};

use hook_agent::core::{HookKey, HookOccurrence, Site};
use hook_agent::infra::StaticSite;

#[test]
fn test_key_ignores_sub_minute_precision() {
    let due = Utc.with_ymd_and_hms(2026, 5, 4, 9, 30, 0).unwrap();
    let a = HookKey::new("blog", &HookOccurrence::new("publish_future", due));
    let b = HookKey::new(
        "blog",
        &HookOccurrence::new("publish_future", due + TimeDelta::seconds(59)),
    );
    assert_eq!(a, b);
}

#[test]
fn test_key_distinguishes_site_hook_and_minute() {
    let due = Utc.with_ymd_and_hms(2026, 5, 4, 9, 30, 0).unwrap();
    let keys: HashSet<HookKey> = [
        HookKey::new("blog", &HookOccurrence::new("publish_future", due)),
        HookKey::new("shop", &HookOccurrence::new("publish_future", due)),
        HookKey::new("blog", &HookOccurrence::new("daily_digest", due)),
        HookKey::new(
            "blog",
            &HookOccurrence::new("publish_future", due + TimeDelta::minutes(1)),
        ),
    ]
    .into_iter()
    .collect();
    assert_eq!(keys.len(), 4);
}

#[test]
fn test_key_display() {
    let due = Utc.with_ymd_and_hms(2026, 5, 4, 9, 30, 17).unwrap();
    let key = HookKey::new("blog", &HookOccurrence::new("publish_future", due));
    assert_eq!(key.to_string(), "blog/publish_future@2026-05-04T09:30Z");
    assert_eq!(key.site(), "blog");
    assert_eq!(key.hook(), "publish_future");
}

#[test]
fn test_waiting_hooks_keep_site_order() {
    let now = Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap();
    let site = StaticSite::new("blog")
        .with_hook("c", now - TimeDelta::minutes(5))
        .with_hook("future", now + TimeDelta::seconds(1))
        .with_hook("a", now)
        .with_hook("b", now - TimeDelta::hours(2));

    let names: Vec<String> = site
        .waiting_hooks(now)
        .unwrap()
        .into_iter()
        .map(|hook| hook.name)
        .collect();
    assert_eq!(names, ["c", "a", "b"]);
}

#[test]
fn test_is_waiting_boundary() {
    let now = Utc::now();
    assert!(HookOccurrence::new("due", now).is_waiting(now));
    assert!(!HookOccurrence::new("soon", now + TimeDelta::milliseconds(1)).is_waiting(now));
}
