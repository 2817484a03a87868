//! Run statistics and summary reporting for a scored batch.

use crate::pipeline::StageTimings;
use crate::types::{NormalizationReport, ScoredBatch};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

/// Counters and timings for one scoring run
#[derive(Debug, Clone)]
pub struct ScoringMetrics {
    pub normalization: NormalizationReport,
    pub records_scored: usize,
    pub fraud_count: usize,
    /// Records per risk score, index = score
    pub score_distribution: Vec<u64>,
    /// Records with each flag set, keyed by column
    pub flag_counts: BTreeMap<&'static str, u64>,
    pub timings: StageTimings,
}

impl ScoringMetrics {
    /// Collect metrics from a scored batch
    pub fn from_batch(batch: &ScoredBatch, timings: StageTimings) -> Self {
        let max_score = batch.flag_columns.len();
        let mut score_distribution = vec![0u64; max_score + 1];
        let mut flag_counts: BTreeMap<&'static str, u64> =
            batch.flag_columns.iter().map(|&c| (c, 0)).collect();

        for scored in &batch.records {
            let bucket = usize::from(scored.fraud_risk_score).min(max_score);
            score_distribution[bucket] += 1;

            for (column, value) in scored.flags.columns() {
                if value == 1 {
                    *flag_counts.entry(column).or_insert(0) += 1;
                }
            }
        }

        Self {
            normalization: batch.report,
            records_scored: batch.len(),
            fraud_count: batch.fraud_count(),
            score_distribution,
            flag_counts,
            timings,
        }
    }

    /// Share of scored records labeled fraud, in percent
    pub fn fraud_rate(&self) -> f64 {
        if self.records_scored > 0 {
            (self.fraud_count as f64 / self.records_scored as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Records scored per second over the whole run
    pub fn throughput(&self) -> f64 {
        let elapsed = self.timings.total().as_secs_f64();
        if elapsed > 0.0 {
            self.records_scored as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let n = &self.normalization;

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            INVOICE FRAUD SCORING - RUN SUMMARY               ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Rows Read:        {:>8}  │  Duplicates Removed: {:>8} ║",
            n.rows_read, n.duplicates_removed
        );
        info!(
            "║ Records Scored:   {:>8}  │  Fraud Labeled: {:>5} ({:>5.1}%) ║",
            self.records_scored,
            self.fraud_count,
            self.fraud_rate()
        );
        info!(
            "║ Bad Dates:        {:>8}  │  Bad Times:          {:>8} ║",
            n.unparseable_dates, n.unparseable_times
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Stage Time (μs): normalize={:>6} rules={:>6} detectors={:>8} ║",
            self.timings.normalize.as_micros(),
            self.timings.rules.as_micros(),
            self.timings.detectors.as_micros()
        );
        info!(
            "║ Throughput:      {:>10.1} records/s                       ║",
            self.throughput()
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Flags Raised:                                                ║");
        for (column, count) in &self.flag_counts {
            info!("║   {:<22}: {:>8}                          ║", column, count);
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Risk Score Distribution:                                     ║");
        let total: u64 = self.score_distribution.iter().sum();
        for (score, &count) in self.score_distribution.iter().enumerate() {
            let pct = if total > 0 {
                (count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!("║   {}: {:>8} ({:>5.1}%) {}", score, count, pct, bar);
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

/// Serializable record of a run, written next to the scored output
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub input: String,
    pub normalization: NormalizationReport,
    pub records_scored: usize,
    pub fraud_count: usize,
    pub score_distribution: Vec<u64>,
    pub flag_counts: BTreeMap<&'static str, u64>,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn new(input: &str, metrics: &ScoringMetrics) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            input: input.to_string(),
            normalization: metrics.normalization,
            records_scored: metrics.records_scored,
            fraud_count: metrics.fraud_count,
            score_distribution: metrics.score_distribution.clone(),
            flag_counts: metrics.flag_counts.clone(),
            elapsed_ms: duration_ms(metrics.timings.total()),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DetectorFlag, FlagSet, InvoiceRecord, RuleFlags, ScoredRecord};

    fn scored(score: u8, duplicate: bool, if_outlier: bool) -> ScoredRecord {
        ScoredRecord {
            record: InvoiceRecord::new("INV-1", 10.0),
            flags: FlagSet::new(
                RuleFlags {
                    is_duplicate_invoice: duplicate,
                    ..Default::default()
                },
                vec![DetectorFlag {
                    column: "IF_outlier",
                    is_outlier: if_outlier,
                }],
            ),
            fraud_risk_score: score,
            fraud_label: u8::from(score >= 3),
        }
    }

    fn batch() -> ScoredBatch {
        ScoredBatch {
            headers: vec!["Invoice Number".to_string()],
            flag_columns: vec![
                "is_duplicate_invoice",
                "is_amount_outlier",
                "is_weird_time",
                "IF_outlier",
            ],
            records: vec![scored(0, false, false), scored(2, true, true), scored(2, true, true)],
            report: NormalizationReport {
                rows_read: 4,
                duplicates_removed: 1,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_metrics_from_batch() {
        let metrics = ScoringMetrics::from_batch(&batch(), StageTimings::default());

        assert_eq!(metrics.records_scored, 3);
        assert_eq!(metrics.fraud_count, 0);
        assert_eq!(metrics.score_distribution, vec![1, 0, 2, 0, 0]);
        assert_eq!(metrics.flag_counts["is_duplicate_invoice"], 2);
        assert_eq!(metrics.flag_counts["is_weird_time"], 0);
        assert_eq!(metrics.flag_counts["IF_outlier"], 2);
        assert_eq!(metrics.throughput(), 0.0);
    }

    #[test]
    fn test_throughput_over_total_time() {
        let timings = StageTimings {
            normalize: Duration::from_millis(500),
            detectors: Duration::from_millis(1000),
            ..Default::default()
        };
        let metrics = ScoringMetrics::from_batch(&batch(), timings);

        assert!((metrics.throughput() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_run_report_serialization() {
        let metrics = ScoringMetrics::from_batch(&batch(), StageTimings::default());
        let report = RunReport::new("invoices.csv", &metrics);

        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["input"], "invoices.csv");
        assert_eq!(json["normalization"]["duplicates_removed"], 1);
        assert_eq!(json["flag_counts"]["IF_outlier"], 2);
        assert_eq!(json["run_id"].as_str().map(str::len), Some(36));
    }
}
