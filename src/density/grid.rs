//! Regular evaluation grid over a lot's arrival extent, and top-K hotspot selection.

use super::kde::GaussianKde;
use crate::records::Coord;
use ndarray::Array2;

#[derive(Debug, Clone)]
pub struct DensityGrid {
    /// Longitudes, one per row of `log_density`
    pub grid_x: Vec<f64>,
    /// Latitudes, one per column of `log_density`
    pub grid_y: Vec<f64>,
    /// `log_density[[i, j]]` is the log density at `(grid_x[i], grid_y[j])`
    pub log_density: Array2<f64>,
}

/// `n` evenly spaced values from `lo` to `hi`, both ends included.
fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lo],
        _ => {
            let step = (hi - lo) / (n - 1) as f64;
            (0..n).map(|i| if i == n - 1 { hi } else { lo + step * i as f64 }).collect()
        }
    }
}

impl DensityGrid {
    pub(crate) fn evaluate(kde: &GaussianKde, points: &[Coord], resolution: usize) -> Self {
        let (mut min, mut max) = (points[0], points[0]);
        for p in points {
            min = Coord::new(min.lon.min(p.lon), min.lat.min(p.lat));
            max = Coord::new(max.lon.max(p.lon), max.lat.max(p.lat));
        }
        let grid_x = linspace(min.lon, max.lon, resolution);
        let grid_y = linspace(min.lat, max.lat, resolution);
        let log_density = Array2::from_shape_fn((grid_x.len(), grid_y.len()), |(i, j)| {
            kde.log_density(Coord::new(grid_x[i], grid_y[j]))
        });
        Self {
            grid_x,
            grid_y,
            log_density,
        }
    }

    /// The `k` densest cells, densest first. Ties go to the cell met first in row-major scan.
    pub fn hotspots(&self, k: usize) -> Vec<Coord> {
        let mut cells: Vec<((usize, usize), f64)> =
            self.log_density.indexed_iter().map(|(ij, v)| (ij, *v)).collect();
        // stable sort keeps scan order among equals
        cells.sort_by(|a, b| b.1.total_cmp(&a.1));
        cells
            .into_iter()
            .take(k)
            .map(|((i, j), _)| Coord::new(self.grid_x[i], self.grid_y[j]))
            .collect()
    }
}
