//! Causal window selection over a lot's arrival history.
//!
//! Two independent views exist over the same history:
//! - term windows: the `max_records` most recent arrivals at or before the
//!   reference time (no duration limit), feeding hotspot / distance / log-prob;
//! - flow counts: arrivals and departures in `(t - duration, t]`, feeding the
//!   in/out ratio.

use crate::records::{Coord, Event, LotId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    Short,
    Medium,
    Long,
}

impl Horizon {
    pub const ALL: [Horizon; 3] = [Horizon::Short, Horizon::Medium, Horizon::Long];

    pub fn name(&self) -> &'static str {
        match self {
            Horizon::Short => "short",
            Horizon::Medium => "medium",
            Horizon::Long => "long",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HorizonSpec {
    pub horizon: Horizon,
    /// Most-recent-first truncation of the term window
    pub max_records: usize,
    /// Trailing interval of the in/out counts
    pub duration: Duration,
}

/// A lot's arrivals and departure times, ascending by time.
#[derive(Debug, Clone)]
pub struct LotHistory {
    pub lot_id: LotId,
    arrivals: Vec<Event>,
    /// `arrivals[i].location`
    coords: Vec<Coord>,
    departures: Vec<DateTime<Utc>>,
}

/// Most-recent-first view of causal history for one horizon.
#[derive(Debug, Clone)]
pub struct Window<'a> {
    pub horizon: Horizon,
    pub events: Vec<&'a Event>,
}

impl Window<'_> {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn coords(&self) -> Vec<Coord> {
        self.events.iter().map(|e| e.location).collect()
    }
}

impl LotHistory {
    /// Arrivals and departures not of `lot_id` are ignored.
    pub fn new(lot_id: LotId, arrivals: &[Event], departures: &[Event]) -> Self {
        let mut arrivals: Vec<Event> = arrivals.iter().filter(|e| e.lot_id == lot_id).cloned().collect();
        arrivals.sort_by_key(|e| e.ts);
        let mut departures: Vec<DateTime<Utc>> = departures
            .iter()
            .filter(|e| e.lot_id == lot_id)
            .map(|e| e.ts)
            .collect();
        departures.sort_unstable();
        let coords = arrivals.iter().map(|e| e.location).collect();
        Self {
            lot_id,
            arrivals,
            coords,
            departures,
        }
    }

    pub fn arrivals(&self) -> &[Event] {
        &self.arrivals
    }

    pub fn coords(&self) -> &[Coord] {
        &self.coords
    }

    fn causal_len(&self, t: DateTime<Utc>) -> usize {
        self.arrivals.partition_point(|e| e.ts <= t)
    }

    /// Arrivals at or before `t`, oldest first.
    pub fn causal(&self, t: DateTime<Utc>) -> &[Event] {
        &self.arrivals[..self.causal_len(t)]
    }

    /// Locations of [`causal`](Self::causal)
    pub fn causal_coords(&self, t: DateTime<Utc>) -> &[Coord] {
        &self.coords[..self.causal_len(t)]
    }

    /// The `spec.max_records` most recent arrivals at or before `t`, newest first.
    pub fn term_window(&self, t: DateTime<Utc>, spec: &HorizonSpec) -> Window<'_> {
        let causal = self.causal(t);
        Window {
            horizon: spec.horizon,
            events: causal.iter().rev().take(spec.max_records).collect(),
        }
    }

    /// Arrivals in `(t - duration, t]`
    pub fn arrivals_in(&self, t: DateTime<Utc>, duration: Duration) -> usize {
        let lo = t - duration;
        let end = self.causal_len(t);
        let start = self.arrivals.partition_point(|e| e.ts <= lo);
        end.saturating_sub(start)
    }

    /// Departures in `(t - duration, t]`
    pub fn departures_in(&self, t: DateTime<Utc>, duration: Duration) -> usize {
        let lo = t - duration;
        let end = self.departures.partition_point(|ts| *ts <= t);
        let start = self.departures.partition_point(|ts| *ts <= lo);
        end.saturating_sub(start)
    }
}
