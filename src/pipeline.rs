//! Batch scoring pipeline: normalize, flag, aggregate.

use crate::config::AppConfig;
use crate::error::Result;
use crate::models::{AnomalyEnsemble, ScoreAggregator};
use crate::normalizer::RecordNormalizer;
use crate::rules::RuleEvaluator;
use crate::types::scored::{AMOUNT_OUTLIER_COLUMN, DUPLICATE_INVOICE_COLUMN, WEIRD_TIME_COLUMN};
use crate::types::{RawBatch, ScoredBatch};
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

/// Wall-clock time spent in each stage of one run
#[derive(Debug, Clone, Copy, Default)]
pub struct StageTimings {
    pub normalize: Duration,
    pub rules: Duration,
    pub detectors: Duration,
    pub aggregate: Duration,
}

impl StageTimings {
    pub fn total(&self) -> Duration {
        self.normalize + self.rules + self.detectors + self.aggregate
    }
}

/// Stateless scorer for one batch at a time.
pub struct ScoringPipeline {
    normalizer: RecordNormalizer,
    rules: RuleEvaluator,
    ensemble: AnomalyEnsemble,
    aggregator: ScoreAggregator,
    parallel: bool,
}

impl ScoringPipeline {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            normalizer: RecordNormalizer::new(config.columns.clone()),
            rules: RuleEvaluator::new(&config.scoring),
            ensemble: AnomalyEnsemble::from_config(&config.detectors)
                .with_parallel(config.pipeline.parallel),
            aggregator: ScoreAggregator::new(config.scoring.fraud_label_threshold),
            parallel: config.pipeline.parallel,
        }
    }

    /// Replace the default detector set
    pub fn with_ensemble(mut self, ensemble: AnomalyEnsemble) -> Self {
        self.ensemble = ensemble;
        self
    }

    pub fn normalizer(&self) -> &RecordNormalizer {
        &self.normalizer
    }

    /// Score a batch
    pub fn run(&self, batch: &RawBatch) -> Result<ScoredBatch> {
        self.run_timed(batch).map(|(scored, _)| scored)
    }

    /// Score a batch and report how long each stage took
    pub fn run_timed(&self, batch: &RawBatch) -> Result<(ScoredBatch, StageTimings)> {
        let mut timings = StageTimings::default();

        let started = Instant::now();
        let (records, report) = self.normalizer.normalize(batch)?;
        timings.normalize = started.elapsed();

        // Rules and detectors read the same records and are independent
        let (rule_flags, detector_flags) = if self.parallel {
            thread::scope(|scope| {
                let rules = scope.spawn(|| {
                    let started = Instant::now();
                    (self.rules.evaluate(&records), started.elapsed())
                });
                let started = Instant::now();
                let detected = self.ensemble.detect(&records);
                timings.detectors = started.elapsed();

                let (flags, elapsed) = rules
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
                timings.rules = elapsed;
                detected.map(|detected| (flags, detected))
            })?
        } else {
            let started = Instant::now();
            let rule_flags = self.rules.evaluate(&records);
            timings.rules = started.elapsed();

            let started = Instant::now();
            let detector_flags = self.ensemble.detect(&records)?;
            timings.detectors = started.elapsed();
            (rule_flags, detector_flags)
        };

        let started = Instant::now();
        let scored = self
            .aggregator
            .score_batch(records, rule_flags, detector_flags);
        timings.aggregate = started.elapsed();

        let batch = ScoredBatch {
            headers: batch.headers.clone(),
            flag_columns: [
                DUPLICATE_INVOICE_COLUMN,
                AMOUNT_OUTLIER_COLUMN,
                WEIRD_TIME_COLUMN,
            ]
            .into_iter()
            .chain(self.ensemble.columns())
            .collect(),
            records: scored,
            report,
        };

        info!(
            records = batch.len(),
            fraud = batch.fraud_count(),
            elapsed_ms = timings.total().as_millis() as u64,
            "Batch scored"
        );

        Ok((batch, timings))
    }
}

impl Default for ScoringPipeline {
    fn default() -> Self {
        Self::new(&AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScoringError;

    const HEADERS: [&str; 6] = ["Invoice Number", "Vendor Name", "Department", "Date", "Time", "Amount"];

    #[test]
    fn test_output_columns() {
        let batch = RawBatch::from_strs(
            &HEADERS,
            &[
                &["INV-1", "Acme", "IT", "2024-01-01", "10:00:00", "100"],
                &["INV-2", "Beta", "HR", "2024-01-02", "11:00:00", "200"],
            ],
        );

        let scored = ScoringPipeline::default().run(&batch).unwrap();

        assert_eq!(
            scored.output_headers(),
            vec![
                "Invoice Number",
                "Vendor Name",
                "Department",
                "Date",
                "Time",
                "Amount",
                "is_duplicate_invoice",
                "is_amount_outlier",
                "is_weird_time",
                "IF_outlier",
                "LOF_outlier",
                "SVM_outlier",
                "fraud_risk_score",
                "fraud_label",
            ]
        );
    }

    #[test]
    fn test_fatal_errors_abort() {
        let batch = RawBatch::from_strs(&HEADERS[..5], &[&["INV-1", "Acme", "IT", "2024-01-01", "10:00:00"]]);

        let err = ScoringPipeline::default().run(&batch).unwrap_err();
        assert!(matches!(err, ScoringError::MissingColumn(_)));
    }

    #[test]
    fn test_parallel_run_matches_sequential() {
        let rows: Vec<Vec<String>> = (0..30)
            .map(|i| {
                vec![
                    format!("INV-{}", i % 27),
                    "Acme".to_string(),
                    "IT".to_string(),
                    "2024-01-01".to_string(),
                    format!("{:02}:15:00", i % 24),
                    format!("{}", 100 + i * 13),
                ]
            })
            .collect();
        let batch = RawBatch::new(HEADERS.iter().map(|h| h.to_string()).collect(), rows);

        let mut config = AppConfig::default();
        let sequential = ScoringPipeline::new(&config).run(&batch).unwrap();
        config.pipeline.parallel = true;
        let parallel = ScoringPipeline::new(&config).run(&batch).unwrap();

        assert_eq!(sequential.records, parallel.records);
    }
}
