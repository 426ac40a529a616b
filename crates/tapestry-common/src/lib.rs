//! Shared ambient helpers for the tapestry crates.
//!
//! - `telemetry`: tracing subscriber setup for binaries and tests
//! - `perf`: elapsed-time helpers that report through `tracing`

pub mod perf;
pub mod telemetry;

pub use perf::{TimingGuard, measure};
pub use telemetry::TelemetryConfig;
