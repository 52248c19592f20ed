//! # eventscope-observability
//!
//! Structured logging for eventscope binaries and embedders.
//! Plain text for terminals, JSON lines for log shippers (ELK, Loki, CloudWatch).
//! Levels are configurable globally and per component.
//!
//! Operator-facing event output is written by the sinks in `eventscope-stream`;
//! this crate only configures diagnostics.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, LogConfig};
