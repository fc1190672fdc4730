//! Test support for the db-sandbox crate
//!
//! Shared by unit and integration tests: one place that knows how test
//! output is captured and filtered.

pub mod logging;
