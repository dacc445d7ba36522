//! Arrival records: destination and origin events tied to lots.
//! CSV ingestion with header-driven column lookup; timestamps normalized to UTC.

mod source;
mod time;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use source::{load_dataset, read_events, RecordKind};
pub use time::parse_timestamp;

pub type LotId = i64;

/// Longitude/latitude in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lon: f64,
    pub lat: f64,
}

impl Coord {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Planar distance in degree units (no haversine correction)
    pub fn distance(&self, other: &Coord) -> f64 {
        (self.lon - other.lon).hypot(self.lat - other.lat)
    }
}

/// One observed arrival (destination) or departure (origin)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub lot_id: LotId,
    pub ts: DateTime<Utc>,
    pub location: Coord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dwell_seconds: Option<f64>,
}

impl Event {
    pub fn new(lot_id: LotId, ts: DateTime<Utc>, location: Coord) -> Self {
        Self {
            lot_id,
            ts,
            location,
            dwell_seconds: None,
        }
    }

    pub fn with_dwell(mut self, seconds: f64) -> Self {
        self.dwell_seconds = Some(seconds);
        self
    }
}

/// Both record sets, fully materialized before the extraction loop.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub destinations: Vec<Event>,
    pub origins: Vec<Event>,
}

impl Dataset {
    pub fn new(destinations: Vec<Event>, origins: Vec<Event>) -> Self {
        Self {
            destinations,
            origins,
        }
    }

    /// Keep only events of the listed lots; an empty list keeps everything.
    pub fn retain_lots(&mut self, lot_ids: &[LotId]) {
        if lot_ids.is_empty() {
            return;
        }
        self.destinations.retain(|e| lot_ids.contains(&e.lot_id));
        self.origins.retain(|e| lot_ids.contains(&e.lot_id));
    }

    /// Distinct lots present in the destinations, ascending
    pub fn lot_ids(&self) -> Vec<LotId> {
        let mut ids: Vec<LotId> = self.destinations.iter().map(|e| e.lot_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
