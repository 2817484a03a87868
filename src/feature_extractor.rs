//! Feature extraction for the anomaly detectors.
//!
//! The detectors see a `[n_records, n_features]` matrix built from the whole
//! batch. Only the invoice amount is used today; new numeric columns go at the
//! end of `FEATURE_NAMES` and `extract`.

use crate::stats;
use crate::types::InvoiceRecord;
use ndarray::Array2;

const FEATURE_NAMES: [&str; 1] = ["amount"];

/// Builds the detector feature matrix for a batch.
pub struct FeatureExtractor {
    standardize: bool,
}

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new(standardize: bool) -> Self {
        Self { standardize }
    }

    /// Extract the feature matrix for a batch, one row per record.
    ///
    /// With standardization on, every column is z-scored with the batch's
    /// sample mean and standard deviation; a constant column becomes all zeros.
    pub fn extract(&self, records: &[InvoiceRecord]) -> Array2<f64> {
        let mut features = Array2::zeros((records.len(), self.feature_count()));
        for (i, record) in records.iter().enumerate() {
            features[[i, 0]] = record.amount;
        }

        if self.standardize {
            for mut column in features.columns_mut() {
                let values = column.to_vec();
                let mean = stats::mean(&values);
                let std = stats::sample_std(&values);
                if std > f64::EPSILON * mean.abs().max(1.0) {
                    // Divide before subtracting; `x - mean` can overflow near f64::MAX
                    column.mapv_inplace(|x| x / std - mean / std);
                } else {
                    column.fill(0.0);
                }
            }
        }

        features
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_NAMES.len()
    }

    /// Get feature names, in column order.
    pub fn feature_names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(true)
    }
}
