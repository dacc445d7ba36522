//! Statistical features of a lot's causal windows.

mod emd;
mod extractor;
mod hotspot;
mod reference;

pub use emd::earth_movers_distance;
pub use extractor::{in_out_ratio, mean_dwell, FeatureExtractor};
pub use hotspot::{hotspot_distance, mean_log_likelihood};
pub use reference::ReferencePopulation;

use crate::window::Horizon;
use serde::{Deserialize, Serialize};

/// Features of one horizon for one event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonFeatures {
    pub horizon: Horizon,
    pub hotspot: f64,
    pub wasserstein: f64,
    pub log_prob: f64,
    /// Present only in hunting mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hunting_time: Option<f64>,
    pub in_out_ratio: f64,
}

impl HorizonFeatures {
    /// Values in output column order; the hunting time is skipped when absent.
    pub fn values(&self) -> impl Iterator<Item = f64> {
        [
            Some(self.hotspot),
            Some(self.wasserstein),
            Some(self.log_prob),
            self.hunting_time,
            Some(self.in_out_ratio),
        ]
        .into_iter()
        .flatten()
    }
}
