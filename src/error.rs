//! Error taxonomy for ingestion, density fitting, and feature extraction.

use crate::records::LotId;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Lot has no coordinates to fit a density model on. The lot is skipped.
    #[error("lot {lot_id}: no historical coordinates")]
    InsufficientData { lot_id: LotId },

    /// Event has no causal history. The event is skipped.
    #[error("lot {lot_id}: empty causal window at {timestamp}")]
    EmptyWindow {
        lot_id: LotId,
        timestamp: DateTime<Utc>,
    },

    /// Input record missing or carrying an unparsable required field. Fatal.
    #[error("{source_name} line {line}: {reason}")]
    MalformedRecord {
        source_name: String,
        line: u64,
        reason: String,
    },

    /// Hunting mode is on but an arrival carries no dwell time. Fatal.
    #[error("lot {lot_id}: arrival at {timestamp} has no dwell time")]
    MissingDwell {
        lot_id: LotId,
        timestamp: DateTime<Utc>,
    },

    /// Numeric failure while fitting or measuring. Aborts the lot.
    #[error("lot {lot_id}{}: {reason}", .timestamp.map(|t| format!(" at {t}")).unwrap_or_default())]
    Computation {
        lot_id: LotId,
        timestamp: Option<DateTime<Utc>>,
        reason: String,
    },

    /// Whole run aborted; carries progress for resumption.
    #[error("run aborted after {rows_emitted} rows (last timestamp {}): {source}",
        .last_timestamp.map(|t| t.to_rfc3339()).unwrap_or_else(|| "none".to_string()))]
    Aborted {
        rows_emitted: usize,
        last_timestamp: Option<DateTime<Utc>>,
        #[source]
        source: Box<Error>,
    },

    /// Configuration file present but unreadable or invalid. Fatal.
    #[error("config {}: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn computation(lot_id: LotId, reason: impl Into<String>) -> Self {
        Error::Computation {
            lot_id,
            timestamp: None,
            reason: reason.into(),
        }
    }

    /// Attach the timestamp of the event being processed to a computation error.
    pub(crate) fn at(self, ts: DateTime<Utc>) -> Self {
        match self {
            Error::Computation {
                lot_id,
                timestamp: None,
                reason,
            } => Error::Computation {
                lot_id,
                timestamp: Some(ts),
                reason,
            },
            other => other,
        }
    }

    pub fn is_per_lot(&self) -> bool {
        matches!(self, Error::InsufficientData { .. } | Error::Computation { .. })
    }
}
