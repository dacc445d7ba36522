//! Lot membership for records that arrive without a lot id. A point on a lot's
//! boundary belongs to the lot (intersects, not strict containment).

use crate::error::{Error, Result};
use crate::records::{Coord, LotId};
use geo::{BoundingRect, Geometry, Intersects, MultiPolygon, Point, Rect};
use std::io::Read;
use wkt::TryFromWkt;

/// Associates a coordinate with every lot whose boundary contains it.
pub trait SpatialJoiner: Send + Sync {
    fn lots_containing(&self, c: Coord) -> Vec<LotId>;
}

/// A lot's catchment: one or more polygons in lon/lat.
#[derive(Debug, Clone)]
pub struct LotBoundary {
    pub lot_id: LotId,
    pub shape: MultiPolygon<f64>,
    bbox: Option<Rect<f64>>,
}

impl LotBoundary {
    pub fn new(lot_id: LotId, shape: MultiPolygon<f64>) -> Self {
        let bbox = shape.bounding_rect();
        Self { lot_id, shape, bbox }
    }

    /// Parse a WKT `POLYGON` or `MULTIPOLYGON`.
    pub fn from_wkt(lot_id: LotId, raw: &str) -> std::result::Result<Self, String> {
        let shape = match Geometry::<f64>::try_from_wkt_str(raw.trim()).map_err(|e| e.to_string())? {
            Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
            Geometry::MultiPolygon(mp) => mp,
            other => return Err(format!("expected a polygon, got {other:?}")),
        };
        Ok(Self::new(lot_id, shape))
    }

    pub fn contains(&self, c: Coord) -> bool {
        let p = Point::new(c.lon, c.lat);
        self.bbox.is_some_and(|b| b.intersects(&p)) && self.shape.intersects(&p)
    }
}

pub struct PolygonJoiner {
    lots: Vec<LotBoundary>,
}

impl PolygonJoiner {
    pub fn new(mut lots: Vec<LotBoundary>) -> Self {
        lots.sort_by_key(|l| l.lot_id);
        Self { lots }
    }

    /// Read a lots table with `pk_lot` and WKT `geometry` columns.
    pub fn from_reader<R: Read>(reader: R, name: &str) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.clone();
        let col = |c: &str| {
            headers.iter().position(|h| h.trim() == c).ok_or_else(|| Error::MalformedRecord {
                source_name: name.to_string(),
                line: 1,
                reason: format!("missing column `{c}`"),
            })
        };
        let (id_col, geom_col) = (col("pk_lot")?, col("geometry")?);
        let mut lots = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record?;
            let line = i as u64 + 2;
            let malformed = |reason: &str| Error::MalformedRecord {
                source_name: name.to_string(),
                line,
                reason: reason.to_string(),
            };
            let lot_id = record
                .get(id_col)
                .and_then(|v| v.trim().parse::<LotId>().ok())
                .ok_or_else(|| malformed("bad `pk_lot`"))?;
            let lot = LotBoundary::from_wkt(lot_id, record.get(geom_col).unwrap_or_default())
                .map_err(|e| malformed(&format!("bad `geometry`: {e}")))?;
            lots.push(lot);
        }
        tracing::debug!(lots = lots.len(), "lot polygons loaded");
        Ok(Self::new(lots))
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }
}

impl SpatialJoiner for PolygonJoiner {
    fn lots_containing(&self, c: Coord) -> Vec<LotId> {
        self.lots
            .iter()
            .filter(|l| l.contains(c))
            .map(|l| l.lot_id)
            .collect()
    }
}
