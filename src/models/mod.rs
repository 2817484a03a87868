//! Unsupervised outlier detectors and score aggregation

pub mod aggregator;
pub mod ensemble;
pub mod isolation_forest;
pub mod lof;
pub mod one_class_svm;

pub use aggregator::ScoreAggregator;
pub use ensemble::AnomalyEnsemble;
pub use isolation_forest::IsolationForest;
pub use lof::LocalOutlierFactor;
pub use one_class_svm::OneClassSvm;

use crate::error::Result;
use ndarray::{Array1, Array2};

/// Native label for an anomalous sample
pub const ANOMALY: i32 = -1;
/// Native label for a normal sample
pub const NORMAL: i32 = 1;

/// An unsupervised detector that fits and scores one batch.
///
/// Implementations keep no fitted state between calls: every `fit_predict`
/// fits from scratch on `x` and labels the same rows.
pub trait OutlierDetector: Send + Sync {
    /// Detector name used in logs
    fn name(&self) -> &'static str;

    /// Output column for this detector's flag
    fn column(&self) -> &'static str;

    /// Fit on `x` and label every row (`ANOMALY` or `NORMAL`)
    fn fit_predict(&self, x: &Array2<f64>) -> Result<Array1<i32>>;
}

/// Label rows whose score falls strictly below the contamination percentile.
///
/// Scores follow the "higher = more normal" convention. Ties at the threshold
/// are normal, so a batch of identical scores has no anomalies.
pub(crate) fn label_by_contamination(scores: &Array1<f64>, contamination: f64) -> Array1<i32> {
    let values = scores.to_vec();
    let offset = crate::stats::percentile(&values, 100.0 * contamination);
    scores.mapv(|s| if s < offset { ANOMALY } else { NORMAL })
}

/// Squared Euclidean distance between two rows
pub(crate) fn squared_distance(x: &Array2<f64>, a: usize, b: usize) -> f64 {
    x.row(a)
        .iter()
        .zip(x.row(b).iter())
        .map(|(p, q)| (p - q).powi(2))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_label_by_contamination() {
        let scores = array![-0.9, -0.4, -0.41, -0.39, -0.42, -0.40, -0.38, -0.43, -0.41, -0.40];
        let labels = label_by_contamination(&scores, 0.05);

        assert_eq!(labels[0], ANOMALY);
        assert_eq!(labels.iter().filter(|&&l| l == ANOMALY).count(), 1);
    }

    #[test]
    fn test_tied_scores_are_normal() {
        let scores = Array1::from_elem(8, -0.5);
        let labels = label_by_contamination(&scores, 0.05);

        assert!(labels.iter().all(|&l| l == NORMAL));
    }

    #[test]
    fn test_squared_distance() {
        let x = array![[0.0, 0.0], [3.0, 4.0]];
        assert_eq!(squared_distance(&x, 0, 1), 25.0);
    }
}
