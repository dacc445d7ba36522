//! Long-term reference population of a lot, z-score normalized once.

use crate::error::{Error, Result};
use crate::records::{Coord, LotId};
use rand::Rng;

#[derive(Debug, Clone)]
pub struct ReferencePopulation {
    pub lot_id: LotId,
    pub mean: Coord,
    /// Population standard deviation (ddof 0) per axis
    pub std: Coord,
    normalized: Vec<Coord>,
}

impl ReferencePopulation {
    pub fn new(lot_id: LotId, coords: &[Coord]) -> Result<Self> {
        if coords.is_empty() {
            return Err(Error::InsufficientData { lot_id });
        }
        let n = coords.len() as f64;
        let mean = Coord::new(
            coords.iter().map(|c| c.lon).sum::<f64>() / n,
            coords.iter().map(|c| c.lat).sum::<f64>() / n,
        );
        let var = |f: fn(&Coord) -> f64, mu: f64| coords.iter().map(|c| (f(c) - mu).powi(2)).sum::<f64>() / n;
        let std = Coord::new(var(|c: &Coord| c.lon, mean.lon).sqrt(), var(|c: &Coord| c.lat, mean.lat).sqrt());
        if !(std.lon > 0.0 && std.lat > 0.0) {
            return Err(Error::computation(
                lot_id,
                format!("degenerate arrival spread (std {}, {})", std.lon, std.lat),
            ));
        }
        let mut pop = Self {
            lot_id,
            mean,
            std,
            normalized: Vec::new(),
        };
        pop.normalized = coords.iter().map(|c| pop.normalize(*c)).collect();
        Ok(pop)
    }

    pub fn normalize(&self, c: Coord) -> Coord {
        Coord::new((c.lon - self.mean.lon) / self.std.lon, (c.lat - self.mean.lat) / self.std.lat)
    }

    pub fn len(&self) -> usize {
        self.normalized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    /// Up to `n` normalized points drawn uniformly without replacement.
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<Coord> {
        if n >= self.normalized.len() {
            return self.normalized.clone();
        }
        rand::seq::index::sample(rng, self.normalized.len(), n)
            .iter()
            .map(|i| self.normalized[i])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn population() -> ReferencePopulation {
        let coords: Vec<Coord> = (0..10).map(|i| Coord::new(i as f64, (i % 3) as f64)).collect();
        ReferencePopulation::new(1, &coords).unwrap()
    }

    #[test]
    fn normalized_population_is_standard() {
        let p = population();
        let all = p.sample(usize::MAX, &mut StdRng::seed_from_u64(0));
        let n = all.len() as f64;
        let mean_lon: f64 = all.iter().map(|c| c.lon).sum::<f64>() / n;
        let var_lon: f64 = all.iter().map(|c| c.lon * c.lon).sum::<f64>() / n;
        assert!(mean_lon.abs() < 1e-12);
        assert!((var_lon - 1.0).abs() < 1e-12);
    }

    #[test]
    fn sampling_is_reproducible_with_seed() {
        let p = population();
        let a = p.sample(4, &mut StdRng::seed_from_u64(42));
        let b = p.sample(4, &mut StdRng::seed_from_u64(42));
        assert_eq!(a.len(), 4);
        assert_eq!(a, b);
    }

    #[test]
    fn zero_spread_is_a_computation_error() {
        let coords = vec![Coord::new(1.0, 2.0); 3];
        assert!(matches!(
            ReferencePopulation::new(9, &coords),
            Err(Error::Computation { lot_id: 9, .. })
        ));
    }
}
