//! Fixtures for the integration tests.
//!
//! The processors and observers are the ones the unit tests use, so both
//! suites speak the same vocabulary.

#[allow(dead_code, unused_imports)]
#[path = "../../src/testing.rs"]
mod fixtures;

#[allow(unused_imports)]
pub use fixtures::*;
