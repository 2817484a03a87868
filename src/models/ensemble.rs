//! Anomaly ensemble: runs every detector over the same batch

use crate::config::DetectorsConfig;
use crate::error::{Result, ScoringError};
use crate::feature_extractor::FeatureExtractor;
use crate::models::{
    IsolationForest, LocalOutlierFactor, OneClassSvm, OutlierDetector, ANOMALY,
};
use crate::types::{DetectorFlag, InvoiceRecord};
use ndarray::{Array1, Array2};
use std::thread;
use tracing::{debug, info, warn};

/// Smallest batch the detectors can compare rows within
pub const MIN_DETECTOR_BATCH: usize = 2;

/// Ordered set of outlier detectors sharing one feature matrix.
pub struct AnomalyEnsemble {
    extractor: FeatureExtractor,
    detectors: Vec<Box<dyn OutlierDetector>>,
    parallel: bool,
}

impl AnomalyEnsemble {
    /// Create an ensemble from explicit members
    pub fn new(extractor: FeatureExtractor, detectors: Vec<Box<dyn OutlierDetector>>) -> Self {
        Self {
            extractor,
            detectors,
            parallel: false,
        }
    }

    /// Isolation forest, LOF and one-class SVM, in that order
    pub fn from_config(config: &DetectorsConfig) -> Self {
        let forest = IsolationForest::new()
            .with_n_estimators(config.isolation_forest.n_estimators)
            .with_max_samples(config.isolation_forest.max_samples)
            .with_contamination(config.contamination)
            .with_random_state(config.isolation_forest.random_state);
        let lof = LocalOutlierFactor::new(config.lof.n_neighbors, config.contamination);
        let svm = OneClassSvm::new(
            config.one_class_svm.nu,
            config.one_class_svm.gamma,
            config.one_class_svm.tolerance,
        );

        Self::new(
            FeatureExtractor::new(config.standardize),
            vec![Box::new(forest), Box::new(lof), Box::new(svm)],
        )
    }

    /// Fit each detector on its own scoped thread
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Output columns, in member order
    pub fn columns(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.column()).collect()
    }

    /// Flag every record with every detector's verdict.
    ///
    /// Batches smaller than `MIN_DETECTOR_BATCH` get no detector flags.
    pub fn detect(&self, records: &[InvoiceRecord]) -> Result<Vec<Vec<DetectorFlag>>> {
        let n = records.len();
        if n < MIN_DETECTOR_BATCH {
            warn!(
                records = n,
                minimum = MIN_DETECTOR_BATCH,
                "Batch too small for anomaly detection, detector flags set to 0"
            );
            return Ok(vec![self.flags(|_| false); n]);
        }

        let features = self.extractor.extract(records);
        let labels = if self.parallel {
            self.fit_parallel(&features)?
        } else {
            self.detectors
                .iter()
                .map(|d| d.fit_predict(&features))
                .collect::<Result<Vec<_>>>()?
        };

        for (detector, detector_labels) in self.detectors.iter().zip(&labels) {
            if detector_labels.len() != n {
                return Err(ScoringError::Detector {
                    detector: detector.name(),
                    reason: format!("returned {} labels for {} rows", detector_labels.len(), n),
                });
            }
            debug!(
                detector = detector.name(),
                anomalies = detector_labels.iter().filter(|&&l| l == ANOMALY).count(),
                "Detector finished"
            );
        }

        info!(
            records = n,
            detectors = self.detectors.len(),
            "Anomaly ensemble complete"
        );

        Ok((0..n)
            .map(|row| self.flags(|member| labels[member][row] == ANOMALY))
            .collect())
    }

    fn fit_parallel(&self, features: &Array2<f64>) -> Result<Vec<Array1<i32>>> {
        thread::scope(|scope| {
            let handles: Vec<_> = self
                .detectors
                .iter()
                .map(|detector| {
                    let handle = scope.spawn(move || detector.fit_predict(features));
                    (detector.name(), handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(name, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(ScoringError::Detector {
                            detector: name,
                            reason: "detector thread panicked".to_string(),
                        })
                    })
                })
                .collect()
        })
    }

    fn flags(&self, is_outlier: impl Fn(usize) -> bool) -> Vec<DetectorFlag> {
        self.detectors
            .iter()
            .enumerate()
            .map(|(member, detector)| DetectorFlag {
                column: detector.column(),
                is_outlier: is_outlier(member),
            })
            .collect()
    }
}

impl Default for AnomalyEnsemble {
    fn default() -> Self {
        Self::from_config(&DetectorsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NORMAL;

    fn batch(amounts: &[f64]) -> Vec<InvoiceRecord> {
        amounts
            .iter()
            .enumerate()
            .map(|(i, &a)| InvoiceRecord::new(&format!("INV-{i}"), a))
            .collect()
    }

    /// Flags every row; exercises membership changes
    struct FlagEverything;

    impl OutlierDetector for FlagEverything {
        fn name(&self) -> &'static str {
            "flag_everything"
        }

        fn column(&self) -> &'static str {
            "ALL_outlier"
        }

        fn fit_predict(&self, x: &Array2<f64>) -> Result<Array1<i32>> {
            Ok(Array1::from_elem(x.nrows(), ANOMALY))
        }
    }

    /// Returns the wrong number of labels
    struct Truncating;

    impl OutlierDetector for Truncating {
        fn name(&self) -> &'static str {
            "truncating"
        }

        fn column(&self) -> &'static str {
            "BAD_outlier"
        }

        fn fit_predict(&self, _x: &Array2<f64>) -> Result<Array1<i32>> {
            Ok(Array1::from_elem(1, NORMAL))
        }
    }

    #[test]
    fn test_default_members() {
        let ensemble = AnomalyEnsemble::default();
        assert_eq!(ensemble.columns(), vec!["IF_outlier", "LOF_outlier", "SVM_outlier"]);
    }

    #[test]
    fn test_single_record_gets_no_flags() {
        let flags = AnomalyEnsemble::default().detect(&batch(&[1_000_000.0])).unwrap();

        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].len(), 3);
        assert!(flags[0].iter().all(|f| !f.is_outlier));
    }

    #[test]
    fn test_constant_amounts_get_no_flags() {
        let flags = AnomalyEnsemble::default().detect(&batch(&[250.0; 30])).unwrap();

        assert!(flags.iter().flatten().all(|f| !f.is_outlier));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut amounts: Vec<f64> = (0..40).map(|i| 100.0 + 7.0 * f64::from(i)).collect();
        amounts.push(75_000.0);
        let records = batch(&amounts);

        let sequential = AnomalyEnsemble::default().detect(&records).unwrap();
        let parallel = AnomalyEnsemble::default()
            .with_parallel(true)
            .detect(&records)
            .unwrap();

        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_custom_membership() {
        let ensemble =
            AnomalyEnsemble::new(FeatureExtractor::default(), vec![Box::new(FlagEverything)]);

        let flags = ensemble.detect(&batch(&[1.0, 2.0, 3.0])).unwrap();

        assert_eq!(ensemble.columns(), vec!["ALL_outlier"]);
        assert!(flags.iter().all(|row| row.len() == 1 && row[0].is_outlier));
    }

    #[test]
    fn test_label_count_mismatch_is_an_error() {
        let ensemble =
            AnomalyEnsemble::new(FeatureExtractor::default(), vec![Box::new(Truncating)]);

        let err = ensemble.detect(&batch(&[1.0, 2.0, 3.0])).unwrap_err();
        assert!(matches!(err, ScoringError::Detector { detector: "truncating", .. }));
    }
}
