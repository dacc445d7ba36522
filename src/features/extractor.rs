//! Per-horizon extraction: window → hotspot / distance / log-prob / dwell, plus flow counts.

use super::{earth_movers_distance, hotspot_distance, mean_log_likelihood, HorizonFeatures, ReferencePopulation};
use crate::config::FeaturesConfig;
use crate::density::DensityModel;
use crate::error::{Error, Result};
use crate::window::Window;
use rand::Rng;

/// Arrivals over departures; an interval without departures divides by one.
pub fn in_out_ratio(arrivals: usize, departures: usize) -> f64 {
    arrivals as f64 / departures.max(1) as f64
}

/// Mean dwell seconds of the window, `None` if any arrival lacks one.
pub fn mean_dwell(window: &Window<'_>) -> Option<f64> {
    let mut total = 0.0;
    for e in &window.events {
        total += e.dwell_seconds?;
    }
    Some(total / window.len() as f64)
}

#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeaturesConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeaturesConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeaturesConfig {
        &self.config
    }

    /// Features of one non-empty window. `flow` is (arrivals, departures) over the
    /// horizon's trailing interval.
    pub fn extract<R: Rng + ?Sized>(
        &self,
        window: &Window<'_>,
        model: &DensityModel,
        reference: &ReferencePopulation,
        flow: (usize, usize),
        rng: &mut R,
    ) -> Result<HorizonFeatures> {
        let lot_id = reference.lot_id;
        let coords = window.coords();
        if coords.is_empty() {
            return Err(Error::computation(lot_id, "empty window reached extraction"));
        }

        let hotspot = hotspot_distance(&model.hotspots, &coords)
            .ok_or_else(|| Error::computation(lot_id, "density grid has no hotspots"))?;

        let normed: Vec<_> = coords.iter().map(|c| reference.normalize(*c)).collect();
        let sample = reference.sample(self.config.wasserstein_sample_size, rng);
        let wasserstein = earth_movers_distance(&normed, &sample)
            .ok_or_else(|| Error::computation(lot_id, "earth-mover distance undefined"))?;

        let log_prob = mean_log_likelihood(model, &coords)?;

        let hunting_time = if self.config.hunting_mode {
            Some(mean_dwell(window).ok_or_else(|| Error::computation(lot_id, "arrival without dwell time"))?)
        } else {
            None
        };

        Ok(HorizonFeatures {
            horizon: window.horizon,
            hotspot,
            wasserstein,
            log_prob,
            hunting_time,
            in_out_ratio: in_out_ratio(flow.0, flow.1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::density::DensityModelBuilder;
    use crate::records::{Coord, Event};
    use crate::window::{Horizon, HorizonSpec, LotHistory};
    use chrono::{Duration, TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn history() -> LotHistory {
        let arrivals: Vec<Event> = (0..20)
            .map(|i| {
                let ts = Utc.with_ymd_and_hms(2023, 1, 17, 8, i, 0).unwrap();
                let c = Coord::new(-83.743 + (i % 5) as f64 * 0.0001, 42.280 + (i % 4) as f64 * 0.0001);
                Event::new(1, ts, c).with_dwell(60.0 * i as f64)
            })
            .collect();
        LotHistory::new(1, &arrivals, &[])
    }

    fn spec(max_records: usize) -> HorizonSpec {
        HorizonSpec {
            horizon: Horizon::Medium,
            max_records,
            duration: Duration::hours(4),
        }
    }

    #[test]
    fn zero_departures_floor_to_one() {
        assert_eq!(in_out_ratio(0, 0), 0.0);
        assert_eq!(in_out_ratio(7, 0), 7.0);
        assert_eq!(in_out_ratio(6, 4), 1.5);
    }

    #[test]
    fn extracts_all_features_reproducibly() {
        let h = history();
        let coords = h.coords();
        let model = DensityModelBuilder::default().build(1, &coords).unwrap();
        let reference = ReferencePopulation::new(1, &coords).unwrap();
        let cfg = FeaturesConfig {
            wasserstein_sample_size: 10,
            ..FeaturesConfig::default()
        };
        let x = FeatureExtractor::new(cfg);
        let t = Utc.with_ymd_and_hms(2023, 1, 17, 8, 9, 0).unwrap();
        let w = h.term_window(t, &spec(8));
        assert_eq!(w.len(), 8);

        let a = x.extract(&w, &model, &reference, (3, 0), &mut StdRng::seed_from_u64(7)).unwrap();
        let b = x.extract(&w, &model, &reference, (3, 0), &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.in_out_ratio, 3.0);
        // minutes 2..=9 -> mean 5.5 minutes
        assert_eq!(a.hunting_time, Some(330.0));
        assert!(a.hotspot >= 0.0 && a.wasserstein >= 0.0 && a.log_prob.is_finite());
    }

    #[test]
    fn hunting_time_omitted_when_disabled() {
        let h = history();
        let coords = h.coords();
        let model = DensityModelBuilder::default().build(1, &coords).unwrap();
        let reference = ReferencePopulation::new(1, &coords).unwrap();
        let x = FeatureExtractor::new(FeaturesConfig {
            hunting_mode: false,
            ..FeaturesConfig::default()
        });
        let t = Utc.with_ymd_and_hms(2023, 1, 17, 8, 0, 0).unwrap();
        let w = h.term_window(t, &spec(1));
        let f = x.extract(&w, &model, &reference, (1, 1), &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(f.hunting_time, None);
        assert_eq!(f.values().count(), 4);
    }
}
