//! Nearest-hotspot distance and density log-likelihood over a window.

use crate::density::DensityModel;
use crate::error::Result;
use crate::records::Coord;

/// Mean over `coords` of the planar distance to the nearest hotspot.
pub fn hotspot_distance(hotspots: &[Coord], coords: &[Coord]) -> Option<f64> {
    if hotspots.is_empty() || coords.is_empty() {
        return None;
    }
    let total: f64 = coords
        .iter()
        .map(|c| {
            hotspots
                .iter()
                .map(|h| c.distance(h))
                .fold(f64::INFINITY, f64::min)
        })
        .sum();
    Some(total / coords.len() as f64)
}

/// Mean log-likelihood of `coords` under the lot's density.
pub fn mean_log_likelihood(model: &DensityModel, coords: &[Coord]) -> Result<f64> {
    let mut total = 0.0;
    for c in coords {
        total += model.log_likelihood(*c)?;
    }
    Ok(total / coords.len() as f64)
}
