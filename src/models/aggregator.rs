//! Score aggregation: flag count and fraud label

use crate::config::FRAUD_LABEL_THRESHOLD;
use crate::types::{DetectorFlag, FlagSet, InvoiceRecord, RuleFlags, ScoredRecord};

/// Sums the flags of a record into a risk score and labels it.
#[derive(Debug, Clone)]
pub struct ScoreAggregator {
    /// Score at which a record is labeled fraud
    threshold: u8,
}

impl ScoreAggregator {
    /// Create a new score aggregator with a labeling threshold.
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    /// Risk score (number of set flags) and fraud label (0/1).
    pub fn aggregate(&self, flags: &FlagSet) -> (u8, u8) {
        let score = u8::try_from(flags.triggered()).unwrap_or(u8::MAX);
        (score, self.label(score))
    }

    /// Label for a given score.
    pub fn label(&self, score: u8) -> u8 {
        u8::from(score >= self.threshold)
    }

    /// Combine records with their rule and detector flags.
    ///
    /// The three inputs are parallel, one entry per record.
    pub fn score_batch(
        &self,
        records: Vec<InvoiceRecord>,
        rule_flags: Vec<RuleFlags>,
        detector_flags: Vec<Vec<DetectorFlag>>,
    ) -> Vec<ScoredRecord> {
        records
            .into_iter()
            .zip(rule_flags)
            .zip(detector_flags)
            .map(|((record, rules), detectors)| {
                let flags = FlagSet::new(rules, detectors);
                let (fraud_risk_score, fraud_label) = self.aggregate(&flags);
                ScoredRecord {
                    record,
                    flags,
                    fraud_risk_score,
                    fraud_label,
                }
            })
            .collect()
    }
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        Self::new(FRAUD_LABEL_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag_set(rules: [bool; 3], detectors: [bool; 3]) -> FlagSet {
        FlagSet::new(
            RuleFlags {
                is_duplicate_invoice: rules[0],
                is_amount_outlier: rules[1],
                is_weird_time: rules[2],
            },
            ["IF_outlier", "LOF_outlier", "SVM_outlier"]
                .into_iter()
                .zip(detectors)
                .map(|(column, is_outlier)| DetectorFlag { column, is_outlier })
                .collect(),
        )
    }

    #[test]
    fn test_score_is_flag_count() {
        let aggregator = ScoreAggregator::default();

        assert_eq!(aggregator.aggregate(&flag_set([false; 3], [false; 3])), (0, 0));
        assert_eq!(aggregator.aggregate(&flag_set([true, false, true], [false; 3])), (2, 0));
        assert_eq!(aggregator.aggregate(&flag_set([true, false, true], [true, false, false])), (3, 1));
        assert_eq!(aggregator.aggregate(&flag_set([true; 3], [true; 3])), (6, 1));
    }

    #[test]
    fn test_label_threshold() {
        let aggregator = ScoreAggregator::default();

        for score in 0..=6u8 {
            assert_eq!(aggregator.label(score) == 1, score >= 3);
        }
    }

    #[test]
    fn test_score_batch_keeps_order() {
        let aggregator = ScoreAggregator::default();
        let records = vec![InvoiceRecord::new("INV-1", 10.0), InvoiceRecord::new("INV-2", 20.0)];
        let rules = vec![
            RuleFlags::default(),
            RuleFlags {
                is_duplicate_invoice: true,
                is_amount_outlier: true,
                is_weird_time: true,
            },
        ];
        let detectors = vec![
            flag_set([false; 3], [false; 3]).detectors,
            flag_set([false; 3], [true, false, false]).detectors,
        ];

        let scored = aggregator.score_batch(records, rules, detectors);

        assert_eq!(scored[0].record.invoice_number, "INV-1");
        assert_eq!((scored[0].fraud_risk_score, scored[0].fraud_label), (0, 0));
        assert_eq!((scored[1].fraud_risk_score, scored[1].fraud_label), (4, 1));
    }
}
