//! Gaussian kernel density estimate over 2-D coordinates.

use crate::records::Coord;
use std::f64::consts::PI;

#[derive(Debug, Clone)]
pub struct GaussianKde {
    points: Vec<Coord>,
    bandwidth: f64,
    /// log of (n * 2 pi h^2), the per-point normalizer
    log_norm: f64,
}

impl GaussianKde {
    /// Caller guarantees a non-empty point set and a positive bandwidth.
    pub(crate) fn fit(points: Vec<Coord>, bandwidth: f64) -> Self {
        let n = points.len() as f64;
        let log_norm = n.ln() + (2.0 * PI * bandwidth * bandwidth).ln();
        Self {
            points,
            bandwidth,
            log_norm,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// log density at `x`; log-sum-exp over the kernels keeps far points finite.
    pub fn log_density(&self, x: Coord) -> f64 {
        let inv = 1.0 / (2.0 * self.bandwidth * self.bandwidth);
        let mut max = f64::NEG_INFINITY;
        for p in &self.points {
            let e = -sq_dist(x, *p) * inv;
            if e > max {
                max = e;
            }
        }
        if max == f64::NEG_INFINITY {
            return max;
        }
        let sum: f64 = self.points.iter().map(|p| (-sq_dist(x, *p) * inv - max).exp()).sum();
        max + sum.ln() - self.log_norm
    }
}

fn sq_dist(a: Coord, b: Coord) -> f64 {
    let dx = a.lon - b.lon;
    let dy = a.lat - b.lat;
    dx * dx + dy * dy
}
