//! Unit tests for individual components

mod builders_test;
mod clock_test;
mod config_test;
mod drain_test;
mod error_test;
mod hook_test;
