//! Structured logging: tracing subscriber setup and the run summary line.

mod format;

pub use format::{StructuredLogger, SummaryLine};
