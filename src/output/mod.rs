//! Feature table: one row per scored arrival, written once at the end of a run.

mod csv_writer;
mod sqlite;

pub use csv_writer::write_csv;
pub use sqlite::SqliteSink;

use crate::config::{OutputConfig, OutputFormat};
use crate::error::Result;
use crate::features::HorizonFeatures;
use crate::records::LotId;
use crate::window::Horizon;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub lot_id: LotId,
    pub timestamp: DateTime<Utc>,
    /// Short, medium, long
    pub horizons: [HorizonFeatures; 3],
}

impl FeatureRow {
    /// Feature values in [`columns`] order (without `lot_id` and `timestamp`)
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.horizons.iter().flat_map(|h| h.values())
    }
}

/// Feature column names, then `lot_id`, `timestamp`.
pub fn columns(hunting_mode: bool) -> Vec<String> {
    let mut cols = Vec::new();
    for h in Horizon::ALL {
        let name = h.name();
        cols.push(format!("{name}_hotspot"));
        cols.push(format!("{name}_wasserstein"));
        cols.push(format!("{name}_log_prob"));
        if hunting_mode {
            cols.push(format!("{name}_hunting_time"));
        }
        cols.push(format!("{name}_in_out_ratio"));
    }
    cols.push("lot_id".to_string());
    cols.push("timestamp".to_string());
    cols
}

/// Append-only row buffer, sized up front and flushed once.
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    hunting_mode: bool,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn with_capacity(hunting_mode: bool, capacity: usize) -> Self {
        Self {
            hunting_mode,
            rows: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, row: FeatureRow) {
        self.rows.push(row);
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = FeatureRow>) {
        self.rows.extend(rows);
    }

    /// Ascending timestamp, then lot id.
    pub fn sort(&mut self) {
        self.rows.sort_by_key(|r| (r.timestamp, r.lot_id));
    }

    pub fn hunting_mode(&self) -> bool {
        self.hunting_mode
    }

    pub fn columns(&self) -> Vec<String> {
        columns(self.hunting_mode)
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<FeatureRow> {
        self.rows
    }

    /// Write to the configured sink.
    pub fn flush(&self, output: &OutputConfig) -> Result<()> {
        if let Some(dir) = output.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        match output.format {
            OutputFormat::Csv => {
                let file = std::fs::File::create(&output.path)?;
                write_csv(self, file)
            }
            OutputFormat::Sqlite => SqliteSink::open(&output.path)?.write_table(self),
        }
    }
}
