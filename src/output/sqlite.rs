//! SQLite-backed feature table. One `feature_rows` table, columns as in the CSV output.

use super::FeatureTable;
use crate::error::Result;
use chrono::SecondsFormat;
use rusqlite::{params_from_iter, types::Value, Connection};
use std::path::Path;

pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    /// Open or create DB at path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("CREATE TABLE IF NOT EXISTS meta (k TEXT PRIMARY KEY, v TEXT);")?;
        Ok(Self { conn })
    }

    /// Replace `feature_rows` with the table's contents in one transaction.
    pub fn write_table(&mut self, table: &FeatureTable) -> Result<()> {
        let cols = table.columns();
        let defs: Vec<String> = cols
            .iter()
            .map(|c| match c.as_str() {
                "lot_id" => "lot_id INTEGER NOT NULL".to_string(),
                "timestamp" => "timestamp TEXT NOT NULL".to_string(),
                other => format!("{other} REAL NOT NULL"),
            })
            .collect();
        let placeholders = vec!["?"; cols.len()].join(", ");

        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS feature_rows;
             CREATE TABLE feature_rows ({});
             CREATE INDEX idx_feature_rows_ts ON feature_rows(timestamp, lot_id);",
            defs.join(", ")
        ))?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO feature_rows ({}) VALUES ({placeholders})",
                cols.join(", ")
            ))?;
            for row in table.rows() {
                let mut values: Vec<Value> = row.values().map(Value::Real).collect();
                values.push(Value::Integer(row.lot_id));
                values.push(Value::Text(row.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)));
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.execute(
            "INSERT OR REPLACE INTO meta (k, v) VALUES ('row_count', ?1)",
            [table.len().to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Number of stored rows
    pub fn row_count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM feature_rows", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    /// Read one feature column, ordered by timestamp then lot
    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {name} FROM feature_rows ORDER BY timestamp, lot_id"
        ))?;
        let rows = stmt.query_map([], |r| r.get::<_, f64>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::HorizonFeatures;
    use crate::output::FeatureRow;
    use crate::window::Horizon;
    use chrono::{TimeZone, Utc};

    #[test]
    fn table_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SqliteSink::open(&dir.path().join("features.db")).unwrap();
        let mut table = FeatureTable::with_capacity(true, 2);
        for (i, lot) in [(0u32, 2i64), (1, 1)] {
            let h = |horizon| HorizonFeatures {
                horizon,
                hotspot: i as f64,
                wasserstein: 0.1,
                log_prob: -3.0,
                hunting_time: Some(45.0),
                in_out_ratio: 1.0,
            };
            table.push(FeatureRow {
                lot_id: lot,
                timestamp: Utc.with_ymd_and_hms(2023, 1, 17, 8, i, 0).unwrap(),
                horizons: [h(Horizon::Short), h(Horizon::Medium), h(Horizon::Long)],
            });
        }
        sink.write_table(&table).unwrap();
        // rewriting replaces rather than appends
        sink.write_table(&table).unwrap();
        assert_eq!(sink.row_count().unwrap(), 2);
        assert_eq!(sink.column("long_hotspot").unwrap(), vec![0.0, 1.0]);
        assert_eq!(sink.column("short_hunting_time").unwrap(), vec![45.0, 45.0]);
    }
}
