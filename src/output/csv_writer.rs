use super::FeatureTable;
use crate::error::Result;
use chrono::SecondsFormat;
use std::io::Write;

/// Header plus one record per row; timestamps in RFC 3339 UTC.
pub fn write_csv<W: Write>(table: &FeatureTable, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(table.columns())?;
    for row in table.rows() {
        let mut record: Vec<String> = row.values().map(|v| v.to_string()).collect();
        record.push(row.lot_id.to_string());
        record.push(row.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}
