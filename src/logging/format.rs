//! JSON log lines: one JSON object per line (ndjson) for ingestion and audit.

use crate::pipeline::RunSummary;
use serde::Serialize;
use std::io::Write;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Completion record of a run, emitted once to stdout
#[derive(Serialize)]
pub struct SummaryLine<'a> {
    pub ts: String,
    pub level: &'a str,
    pub target: &'a str,
    pub message: &'a str,
    pub events_seen: usize,
    pub rows_emitted: usize,
    pub skipped_empty_window: usize,
    pub skipped_unavailable_lot: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_lots: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

impl<'a> SummaryLine<'a> {
    pub fn from_summary(summary: &RunSummary, output: Option<&'a str>, error: Option<&'a str>) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339(),
            level: if error.is_some() { "ERROR" } else { "INFO" },
            target: "lot_features::summary",
            message: if error.is_some() { "run aborted" } else { "run complete" },
            events_seen: summary.events_seen,
            rows_emitted: summary.rows_emitted,
            skipped_empty_window: summary.skipped_empty_window,
            skipped_unavailable_lot: summary.skipped_unavailable_lot,
            failed_lots: summary
                .failed_lots
                .iter()
                .map(|(lot, reason)| format!("{lot}: {reason}"))
                .collect(),
            last_timestamp: summary.last_timestamp.map(|t| t.to_rfc3339()),
            output,
            error,
        }
    }
}

/// Initialize tracing with JSON format (one JSON object per line)
pub struct StructuredLogger;

impl StructuredLogger {
    /// Install global subscriber: JSON lines to stderr, level from RUST_LOG or default.
    /// Does nothing if a subscriber is already installed.
    pub fn init(json: bool, default_level: &str) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        let installed = if json {
            let fmt = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(fmt).try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()
        };
        if installed.is_err() {
            tracing::debug!("tracing subscriber already installed");
        }
    }

    /// Emit a single structured log line (e.g. the run summary) without going through tracing
    pub fn emit_json(event: &impl Serialize, w: &mut impl Write) {
        if let Ok(line) = serde_json::to_string(event) {
            let _ = writeln!(w, "{}", line);
        }
    }
}
