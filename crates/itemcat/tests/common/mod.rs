//! Shared test utilities for itemcat integration tests.
//!
//! - `TestHarness`: temp database, upload directory, services and worker
//! - Builders for CSV and XLSX upload payloads

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
