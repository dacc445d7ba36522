//! CSV ingestion of joined (or joinable) destination and origin records.

use super::time::{parse_instant, seconds_between};
use super::{Coord, Dataset, Event, LotId};
use chrono::SubsecRound;
use crate::config::{InputConfig, RecordSchema};
use crate::error::{Error, Result};
use crate::spatial::{PolygonJoiner, SpatialJoiner};
use csv::StringRecord;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Destination,
    Origin,
}

/// Column positions resolved from the header row
struct Columns {
    time: usize,
    lon: usize,
    lat: usize,
    lot: Option<usize>,
    dwell: Option<usize>,
    entry: Option<usize>,
}

impl Columns {
    fn resolve(headers: &StringRecord, schema: &RecordSchema, name: &str) -> Result<Self> {
        let find = |col: &str| headers.iter().position(|h| h.trim() == col);
        let require = |col: &str| {
            find(col).ok_or_else(|| Error::MalformedRecord {
                source_name: name.to_string(),
                line: 1,
                reason: format!("missing column `{col}`"),
            })
        };
        Ok(Self {
            time: require(&schema.time)?,
            lon: require(&schema.lon)?,
            lat: require(&schema.lat)?,
            lot: find(&schema.lot),
            dwell: schema.dwell_seconds.as_deref().and_then(|c| find(c)),
            entry: schema.entry_time.as_deref().and_then(|c| find(c)),
        })
    }
}

#[derive(Clone, Copy)]
enum DwellSource<'a> {
    /// Dwell seconds stored directly
    Seconds(usize, &'a str),
    /// Entry time; dwell is `time - entry`
    Entry(usize, &'a str),
}

/// Read one record set. Records without a lot column are assigned lots by `joiner`;
/// a record inside no lot is dropped, a record inside several lots is kept once per lot.
pub fn read_events<R: Read>(
    reader: R,
    name: &str,
    schema: &RecordSchema,
    kind: RecordKind,
    hunting_mode: bool,
    joiner: Option<&dyn SpatialJoiner>,
) -> Result<Vec<Event>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let cols = Columns::resolve(rdr.headers()?, schema, name)?;
    if cols.lot.is_none() && joiner.is_none() {
        return Err(Error::MalformedRecord {
            source_name: name.to_string(),
            line: 1,
            reason: format!("missing column `{}` and no lot polygons to join with", schema.lot),
        });
    }
    let dwell_source = if hunting_mode && kind == RecordKind::Destination {
        let source = match (cols.dwell, cols.entry) {
            (Some(idx), _) => schema.dwell_seconds.as_deref().map(|c| DwellSource::Seconds(idx, c)),
            (None, Some(idx)) => schema.entry_time.as_deref().map(|c| DwellSource::Entry(idx, c)),
            (None, None) => None,
        };
        if source.is_none() {
            return Err(Error::MalformedRecord {
                source_name: name.to_string(),
                line: 1,
                reason: "hunting mode needs a dwell or entry time column".to_string(),
            });
        }
        source
    } else {
        None
    };

    let mut out = Vec::new();
    let mut unjoined = 0usize;
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        // header is line 1
        let line = i as u64 + 2;
        let malformed = |reason: String| Error::MalformedRecord {
            source_name: name.to_string(),
            line,
            reason,
        };
        let field = |idx: usize, col: &str| {
            record
                .get(idx)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| malformed(format!("empty `{col}`")))
        };
        let number = |idx: usize, col: &str| -> Result<f64> {
            field(idx, col)?
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| malformed(format!("`{col}` is not a number")))
        };

        let instant = parse_instant(field(cols.time, &schema.time)?)
            .ok_or_else(|| malformed(format!("`{}` is not a timestamp", schema.time)))?;
        let ts = instant.trunc_subsecs(0);
        let location = Coord::new(number(cols.lon, &schema.lon)?, number(cols.lat, &schema.lat)?);

        let dwell_seconds = match dwell_source {
            Some(DwellSource::Seconds(idx, col)) => Some(number(idx, col)?),
            Some(DwellSource::Entry(idx, col)) => {
                let entry = parse_instant(field(idx, col)?)
                    .ok_or_else(|| malformed(format!("`{col}` is not a timestamp")))?;
                Some(seconds_between(entry, instant))
            }
            None => None,
        };
        if let Some(seconds) = dwell_seconds.filter(|s| *s < 0.0) {
            return Err(malformed(format!("negative dwell time {seconds}")));
        }

        let lots: Vec<LotId> = match (cols.lot, joiner) {
            (Some(idx), _) => {
                let raw = field(idx, &schema.lot)?;
                vec![parse_lot_id(raw).ok_or_else(|| malformed(format!("`{}` is not a lot id", schema.lot)))?]
            }
            (None, Some(j)) => j.lots_containing(location),
            (None, None) => Vec::new(),
        };
        if lots.is_empty() {
            unjoined += 1;
        }
        out.extend(lots.into_iter().map(|lot_id| Event {
            lot_id,
            ts,
            location,
            dwell_seconds,
        }));
    }
    if unjoined > 0 {
        tracing::debug!(source = name, unjoined, "records outside every lot dropped");
    }
    Ok(out)
}

/// Lot ids may come through as floats (`93059.0`) after a dataframe round trip.
fn parse_lot_id(raw: &str) -> Option<LotId> {
    raw.parse::<LotId>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.fract() == 0.0 && v.is_finite())
            .map(|v| v as LotId)
    })
}

fn open(path: &Path) -> Result<std::fs::File> {
    std::fs::File::open(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {e}", path.display()),
        ))
    })
}

/// Load both record sets named by the config, joining against lot polygons when given,
/// then apply the lot filter.
pub fn load_dataset(input: &InputConfig, lot_ids: &[LotId], hunting_mode: bool) -> Result<Dataset> {
    let joiner = match &input.lots {
        Some(path) => Some(PolygonJoiner::from_reader(open(path)?, &path.display().to_string())?),
        None => None,
    };
    let joiner = joiner.as_ref().map(|j| j as &dyn SpatialJoiner);

    let destinations = read_events(
        open(&input.destinations)?,
        &input.destinations.display().to_string(),
        &input.destination_schema,
        RecordKind::Destination,
        hunting_mode,
        joiner,
    )?;
    let origins = read_events(
        open(&input.origins)?,
        &input.origins.display().to_string(),
        &input.origin_schema,
        RecordKind::Origin,
        hunting_mode,
        joiner,
    )?;
    let mut ds = Dataset::new(destinations, origins);
    ds.retain_lots(lot_ids);
    tracing::info!(
        destinations = ds.destinations.len(),
        origins = ds.origins.len(),
        lots = ds.lot_ids().len(),
        "records loaded"
    );
    Ok(ds)
}
