//! Business-rule checks over a normalized batch.
//!
//! All three rules are batch-relative: duplicate numbers and the amount band
//! depend on every record in the batch, not only the one being flagged.

use crate::config::ScoringPolicy;
use crate::stats;
use crate::types::{InvoiceRecord, RuleFlags};
use chrono::NaiveTime;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Evaluates the duplicate-invoice, amount-outlier and off-hours rules.
#[derive(Debug, Clone)]
pub struct RuleEvaluator {
    amount_sigma: f64,
    day_start: NaiveTime,
    day_end: NaiveTime,
}

impl RuleEvaluator {
    pub fn new(policy: &ScoringPolicy) -> Self {
        Self {
            amount_sigma: policy.amount_sigma,
            day_start: policy.business_day_start,
            day_end: policy.business_day_end,
        }
    }

    /// Compute the rule flags for every record, in input order.
    pub fn evaluate(&self, records: &[InvoiceRecord]) -> Vec<RuleFlags> {
        let mut occurrences: HashMap<&str, usize> = HashMap::with_capacity(records.len());
        for record in records {
            *occurrences.entry(record.invoice_number.as_str()).or_insert(0) += 1;
        }

        let band = self.amount_band(records);

        records
            .iter()
            .map(|record| RuleFlags {
                is_duplicate_invoice: occurrences
                    .get(record.invoice_number.as_str())
                    .is_some_and(|&count| count > 1),
                is_amount_outlier: band.is_some_and(|band| band.excludes(record.amount)),
                is_weird_time: self.is_weird_time(record.time),
            })
            .collect()
    }

    /// Off-hours check. A missing time is never weird.
    pub fn is_weird_time(&self, time: Option<NaiveTime>) -> bool {
        time.is_some_and(|t| t < self.day_start || t > self.day_end)
    }

    /// Amount band of the batch, or `None` when the batch has no spread.
    fn amount_band(&self, records: &[InvoiceRecord]) -> Option<AmountBand> {
        let amounts: Vec<f64> = records.iter().map(|r| r.amount).collect();
        let mean = stats::mean(&amounts);
        let std = stats::sample_std(&amounts);

        // Rounding noise on a constant column must not open a band
        if std <= f64::EPSILON * mean.abs().max(1.0) {
            debug!(records = records.len(), "Amount column has no spread, no amount outliers");
            return None;
        }
        if !std.is_finite() {
            warn!(records = records.len(), "Amount spread overflows, no amount outliers");
            return None;
        }

        debug!(mean = mean, std = std, "Amount band computed");
        Some(AmountBand {
            mean,
            std,
            sigma: self.amount_sigma,
        })
    }
}

/// `mean ± sigma * std`, tested in standard-deviation units so that
/// amounts near `f64::MAX` cannot overflow the bounds.
#[derive(Debug, Clone, Copy)]
struct AmountBand {
    mean: f64,
    std: f64,
    sigma: f64,
}

impl AmountBand {
    fn excludes(&self, amount: f64) -> bool {
        (amount / self.std - self.mean / self.std).abs() > self.sigma
    }
}

impl Default for RuleEvaluator {
    fn default() -> Self {
        Self::new(&ScoringPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_duplicate_invoice_numbers() {
        let records = vec![
            InvoiceRecord::new("INV-100", 120.0),
            InvoiceRecord::new("INV-200", 130.0),
            InvoiceRecord::new("INV-100", 480.0),
        ];

        let flags = RuleEvaluator::default().evaluate(&records);

        assert!(flags[0].is_duplicate_invoice);
        assert!(!flags[1].is_duplicate_invoice);
        assert!(flags[2].is_duplicate_invoice);
    }

    #[test]
    fn test_amount_outlier_band() {
        let mut records: Vec<InvoiceRecord> = [120.0, 250.0, 310.0, 180.0, 420.0, 275.0, 390.0, 150.0, 205.0]
            .iter()
            .enumerate()
            .map(|(i, &a)| InvoiceRecord::new(&format!("INV-{i}"), a))
            .collect();
        records.push(InvoiceRecord::new("INV-BIG", 100_000.0));

        let flags = RuleEvaluator::default().evaluate(&records);

        assert!(flags[9].is_amount_outlier);
        assert!(flags[..9].iter().all(|f| !f.is_amount_outlier));
    }

    #[test]
    fn test_huge_amount_is_still_an_outlier() {
        let mut records: Vec<InvoiceRecord> = (0..20)
            .map(|i| InvoiceRecord::new(&format!("INV-{i}"), 100.0 + 17.0 * f64::from(i)))
            .collect();
        records.push(InvoiceRecord::new("INV-HUGE", 1e200));

        let flags = RuleEvaluator::default().evaluate(&records);

        assert!(flags[20].is_amount_outlier);
        assert!(flags[..20].iter().all(|f| !f.is_amount_outlier));
    }

    #[test]
    fn test_constant_amounts_never_outliers() {
        let records: Vec<InvoiceRecord> = (0..10)
            .map(|i| InvoiceRecord::new(&format!("INV-{i}"), 0.1))
            .collect();

        let flags = RuleEvaluator::default().evaluate(&records);

        assert!(flags.iter().all(|f| !f.is_amount_outlier));
    }

    #[test]
    fn test_single_record_batch() {
        let records = vec![InvoiceRecord::new("INV-1", 999_999.0)];

        let flags = RuleEvaluator::default().evaluate(&records);

        assert_eq!(flags, vec![RuleFlags::default()]);
    }

    #[test]
    fn test_weird_time_window() {
        let rules = RuleEvaluator::default();

        assert!(rules.is_weird_time(Some(at(3, 0, 0))));
        assert!(rules.is_weird_time(Some(at(5, 59, 59))));
        assert!(!rules.is_weird_time(Some(at(6, 0, 0))));
        assert!(!rules.is_weird_time(Some(at(14, 0, 0))));
        assert!(!rules.is_weird_time(Some(at(22, 0, 0))));
        assert!(rules.is_weird_time(Some(at(22, 0, 1))));
        assert!(!rules.is_weird_time(None));
    }
}
