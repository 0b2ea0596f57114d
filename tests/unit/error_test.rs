//! Tests for error types

use std::error::Error as _;
use std::io;

use hook_agent::core::AgentError;
use hook_agent::process::{DrainFault, DrainStatus};

#[test]
fn test_launch_error() {
    let err = AgentError::Launch {
        program: "/usr/bin/wp".to_string(),
        source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
    };
    assert_eq!(
        format!("{}", err),
        "failed to launch `/usr/bin/wp`: No such file or directory"
    );
    assert!(err.source().is_some());
    assert!(!err.is_interrupted());
}

#[test]
fn test_interrupted_error() {
    let err = AgentError::Interrupted("shutdown requested".to_string());
    assert_eq!(format!("{}", err), "wait interrupted: shutdown requested");
    assert!(err.is_interrupted());
}

#[test]
fn test_dispatch_error() {
    let err = AgentError::Dispatch {
        site: "blog".to_string(),
        hook: "publish_future".to_string(),
        reason: "no handler".to_string(),
    };
    assert_eq!(
        format!("{}", err),
        "dispatch failed for hook `publish_future` on site `blog`: no handler"
    );
}

#[test]
fn test_queue_full_error() {
    let err = AgentError::QueueFull("hook-workers".to_string());
    assert_eq!(format!("{}", err), "queue full: hook-workers");
}

#[test]
fn test_invalid_config_error() {
    let err = AgentError::InvalidConfig("scan_period_secs must be greater than 0".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: scan_period_secs must be greater than 0"
    );
}

#[test]
fn test_drain_status_reports_fault() {
    let status = DrainStatus::Faulted(DrainFault {
        bytes_read: 42,
        source: io::Error::other("broken pipe"),
    });
    assert!(!status.is_complete());
    assert_eq!(status.bytes_read(), 42);

    let done = DrainStatus::Complete { bytes_read: 7 };
    assert!(done.is_complete());
    assert_eq!(done.bytes_read(), 7);
}
