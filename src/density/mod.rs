//! Per-lot spatial density models: Gaussian KDE plus a hotspot grid.
//!
//! [`DensityModelBuilder`] fits one model per lot. [`LotDensity`] hands the
//! extractor the model to use for an event, either the static all-history fit
//! or an as-of fit over history up to the event.

mod grid;
mod kde;

pub use grid::DensityGrid;
pub use kde::GaussianKde;

use crate::config::{DensityMode, FeaturesConfig};
use crate::error::{Error, Result};
use crate::records::{Coord, LotId};
use std::sync::Arc;

/// Fitted density for one lot. Read-only once built.
#[derive(Debug, Clone)]
pub struct DensityModel {
    pub lot_id: LotId,
    pub kde: GaussianKde,
    pub grid: DensityGrid,
    /// Densest grid cells, densest first
    pub hotspots: Vec<Coord>,
}

impl DensityModel {
    pub fn log_likelihood(&self, x: Coord) -> Result<f64> {
        let v = self.kde.log_density(x);
        if v.is_finite() {
            Ok(v)
        } else {
            Err(Error::computation(
                self.lot_id,
                format!("non-finite log likelihood at ({}, {})", x.lon, x.lat),
            ))
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DensityModelBuilder {
    pub bandwidth: f64,
    pub grid_resolution: usize,
    pub num_hotspots: usize,
}

impl Default for DensityModelBuilder {
    fn default() -> Self {
        Self::from_config(&FeaturesConfig::default())
    }
}

impl DensityModelBuilder {
    pub fn from_config(c: &FeaturesConfig) -> Self {
        Self {
            bandwidth: c.density_bandwidth,
            grid_resolution: c.grid_resolution,
            num_hotspots: c.num_hotspots,
        }
    }

    pub fn build(&self, lot_id: LotId, coords: &[Coord]) -> Result<DensityModel> {
        if coords.is_empty() {
            return Err(Error::InsufficientData { lot_id });
        }
        if !(self.bandwidth.is_finite() && self.bandwidth > 0.0) {
            return Err(Error::computation(
                lot_id,
                format!("bandwidth must be positive, got {}", self.bandwidth),
            ));
        }
        if self.grid_resolution == 0 {
            return Err(Error::computation(lot_id, "grid resolution must be positive"));
        }
        let kde = GaussianKde::fit(coords.to_vec(), self.bandwidth);
        let grid = DensityGrid::evaluate(&kde, coords, self.grid_resolution);
        let hotspots = grid.hotspots(self.num_hotspots);
        Ok(DensityModel {
            lot_id,
            kde,
            grid,
            hotspots,
        })
    }
}

/// The density model an event at a lot is scored against.
#[derive(Debug, Clone)]
pub enum LotDensity {
    /// Built once from every arrival at the lot; shared read-only across shards
    Static(Arc<DensityModel>),
    /// Refit from the causal prefix of the lot's arrivals
    AsOf {
        builder: DensityModelBuilder,
        refit_every: usize,
        fitted_on: usize,
        model: Option<DensityModel>,
    },
}

impl LotDensity {
    pub fn new(
        mode: DensityMode,
        builder: DensityModelBuilder,
        lot_id: LotId,
        all_coords: &[Coord],
    ) -> Result<Self> {
        match mode {
            DensityMode::Static => Ok(LotDensity::Static(Arc::new(builder.build(lot_id, all_coords)?))),
            DensityMode::AsOf { refit_every } => {
                if all_coords.is_empty() {
                    return Err(Error::InsufficientData { lot_id });
                }
                Ok(LotDensity::AsOf {
                    builder,
                    refit_every: refit_every.max(1),
                    fitted_on: 0,
                    model: None,
                })
            }
        }
    }

    /// Model for an event whose causal history is `prefix` (oldest first).
    pub fn model_for(&mut self, lot_id: LotId, prefix: &[Coord]) -> Result<&DensityModel> {
        match self {
            LotDensity::Static(m) => Ok(&**m),
            LotDensity::AsOf {
                builder,
                refit_every,
                fitted_on,
                model,
            } => {
                let stale = prefix.len() >= *fitted_on + *refit_every;
                if model.is_none() || stale {
                    *model = Some(builder.build(lot_id, prefix)?);
                    *fitted_on = prefix.len();
                    tracing::trace!(lot_id, points = prefix.len(), "as-of density refit");
                }
                model.as_ref().ok_or(Error::InsufficientData { lot_id })
            }
        }
    }
}
