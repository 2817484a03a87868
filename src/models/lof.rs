//! Local outlier factor detector

use crate::error::{Result, ScoringError};
use crate::models::{label_by_contamination, squared_distance, OutlierDetector};
use ndarray::{Array1, Array2};
use tracing::debug;

/// Keeps the reachability density finite when neighbors coincide
const DENSITY_EPSILON: f64 = 1e-10;

/// Density-based detector: compares each row's local reachability density
/// with that of its nearest neighbors.
#[derive(Debug, Clone)]
pub struct LocalOutlierFactor {
    n_neighbors: usize,
    contamination: f64,
}

impl LocalOutlierFactor {
    pub fn new(n_neighbors: usize, contamination: f64) -> Self {
        Self {
            n_neighbors,
            contamination,
        }
    }

    /// Neighborhood size actually used for a batch of `n` rows.
    ///
    /// Batches no larger than the configured neighborhood use every other
    /// row as a neighbor.
    pub fn effective_neighbors(&self, n: usize) -> usize {
        self.n_neighbors.min(n.saturating_sub(1))
    }

    /// Negated local outlier factors; lower means more anomalous.
    pub fn negative_outlier_factor(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.n_neighbors == 0 {
            return Err(ScoringError::Detector {
                detector: self.name(),
                reason: "n_neighbors must be positive".to_string(),
            });
        }

        let n = x.nrows();
        let k = self.effective_neighbors(n);
        if k == 0 {
            return Ok(Array1::from_elem(n, -1.0));
        }
        if k < self.n_neighbors {
            debug!(
                configured = self.n_neighbors,
                used = k,
                "LOF neighborhood clamped to batch size"
            );
        }

        // k nearest neighbors of each row, excluding the row itself
        let neighbors: Vec<Vec<(usize, f64)>> = (0..n)
            .map(|i| {
                let mut dists: Vec<(usize, f64)> = (0..n)
                    .filter(|&j| j != i)
                    .map(|j| (j, squared_distance(x, i, j).sqrt()))
                    .collect();
                dists.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
                dists.truncate(k);
                dists
            })
            .collect();

        let k_distance: Vec<f64> = neighbors.iter().map(|nb| nb[k - 1].1).collect();

        let density: Vec<f64> = neighbors
            .iter()
            .map(|nb| {
                let reach = nb
                    .iter()
                    .map(|&(j, d)| d.max(k_distance[j]))
                    .sum::<f64>()
                    / k as f64;
                1.0 / (reach + DENSITY_EPSILON)
            })
            .collect();

        Ok(Array1::from_iter(neighbors.iter().enumerate().map(|(i, nb)| {
            let neighbor_density = nb.iter().map(|&(j, _)| density[j]).sum::<f64>() / k as f64;
            -(neighbor_density / density[i])
        })))
    }
}

impl Default for LocalOutlierFactor {
    fn default() -> Self {
        Self::new(crate::config::LOF_NEIGHBORS, crate::config::CONTAMINATION)
    }
}

impl OutlierDetector for LocalOutlierFactor {
    fn name(&self) -> &'static str {
        "local_outlier_factor"
    }

    fn column(&self) -> &'static str {
        "LOF_outlier"
    }

    fn fit_predict(&self, x: &Array2<f64>) -> Result<Array1<i32>> {
        let factors = self.negative_outlier_factor(x)?;
        Ok(label_by_contamination(&factors, self.contamination))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ANOMALY, NORMAL};

    fn amounts(values: &[f64]) -> Array2<f64> {
        Array2::from_shape_vec((values.len(), 1), values.to_vec()).unwrap()
    }

    #[test]
    fn test_neighborhood_clamps_to_batch() {
        let lof = LocalOutlierFactor::default();
        assert_eq!(lof.effective_neighbors(100), 20);
        assert_eq!(lof.effective_neighbors(10), 9);
        assert_eq!(lof.effective_neighbors(1), 0);
    }

    #[test]
    fn test_flags_isolated_point() {
        let mut values: Vec<f64> = (0..30).map(|i| 100.0 + 10.0 * f64::from(i)).collect();
        values.push(100_000.0);
        let x = amounts(&values);

        let factors = LocalOutlierFactor::default().negative_outlier_factor(&x).unwrap();
        let labels = LocalOutlierFactor::default().fit_predict(&x).unwrap();

        assert!(factors[30] < -10.0);
        assert_eq!(labels[30], ANOMALY);
        // 5% of 31 rows leaves room for at most one more
        assert!(labels.iter().filter(|&&l| l == ANOMALY).count() <= 2);
    }

    #[test]
    fn test_far_point_masked_when_neighborhood_spans_batch() {
        // k = n - 1 puts the far point in every neighborhood
        let x = amounts(&[
            120.0, 250.0, 310.0, 180.0, 420.0, 275.0, 390.0, 150.0, 205.0, 100_000.0,
        ]);

        let factors = LocalOutlierFactor::default().negative_outlier_factor(&x).unwrap();

        assert!(factors[9] > -1.1);
    }

    #[test]
    fn test_uniform_grid_has_unit_factors() {
        let x = amounts(&(0..30).map(f64::from).collect::<Vec<_>>());
        let factors = LocalOutlierFactor::new(2, 0.05)
            .negative_outlier_factor(&x)
            .unwrap();

        // interior points of an evenly spaced line sit at LOF ~ 1
        assert!((factors[15] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_identical_rows_are_normal() {
        let labels = LocalOutlierFactor::default()
            .fit_predict(&amounts(&[7.5; 25]))
            .unwrap();

        assert!(labels.iter().all(|&l| l == NORMAL));
    }
}
