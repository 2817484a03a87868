//! Derived flag and score structures

use crate::types::invoice::InvoiceRecord;
use serde::Serialize;

pub const DUPLICATE_INVOICE_COLUMN: &str = "is_duplicate_invoice";
pub const AMOUNT_OUTLIER_COLUMN: &str = "is_amount_outlier";
pub const WEIRD_TIME_COLUMN: &str = "is_weird_time";
pub const RISK_SCORE_COLUMN: &str = "fraud_risk_score";
pub const FRAUD_LABEL_COLUMN: &str = "fraud_label";

/// Flags produced by the rule evaluator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleFlags {
    pub is_duplicate_invoice: bool,
    pub is_amount_outlier: bool,
    pub is_weird_time: bool,
}

/// One detector's normalized verdict for a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorFlag {
    /// Output column, e.g. `IF_outlier`
    pub column: &'static str,
    /// `true` when the detector considers the record anomalous
    pub is_outlier: bool,
}

/// Complete set of flags for one record.
///
/// Detector flags keep the ensemble's member order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSet {
    pub rules: RuleFlags,
    pub detectors: Vec<DetectorFlag>,
}

impl FlagSet {
    pub fn new(rules: RuleFlags, detectors: Vec<DetectorFlag>) -> Self {
        Self { rules, detectors }
    }

    /// All flags as `(column, 0/1)` pairs in output order
    pub fn columns(&self) -> impl Iterator<Item = (&'static str, u8)> + '_ {
        [
            (DUPLICATE_INVOICE_COLUMN, self.rules.is_duplicate_invoice),
            (AMOUNT_OUTLIER_COLUMN, self.rules.is_amount_outlier),
            (WEIRD_TIME_COLUMN, self.rules.is_weird_time),
        ]
        .into_iter()
        .chain(self.detectors.iter().map(|d| (d.column, d.is_outlier)))
        .map(|(column, set)| (column, u8::from(set)))
    }

    /// Number of flags that fired
    pub fn triggered(&self) -> usize {
        self.columns().filter(|&(_, v)| v == 1).count()
    }

    /// Value of a flag by column name
    pub fn get(&self, column: &str) -> Option<u8> {
        self.columns().find(|&(c, _)| c == column).map(|(_, v)| v)
    }
}

/// An invoice with its flags, risk score and label.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: InvoiceRecord,
    pub flags: FlagSet,
    /// Number of triggered flags (0-6 with the default ensemble)
    pub fraud_risk_score: u8,
    /// 1 when the score reaches the labeling threshold
    pub fraud_label: u8,
}

impl ScoredRecord {
    pub fn is_fraud(&self) -> bool {
        self.fraud_label == 1
    }
}

/// Counters collected while normalizing a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationReport {
    pub rows_read: usize,
    pub duplicates_removed: usize,
    pub unparseable_dates: usize,
    pub unparseable_times: usize,
}

/// Output of a full scoring run
#[derive(Debug, Clone)]
pub struct ScoredBatch {
    /// Input headers, in input order
    pub headers: Vec<String>,
    /// Flag columns appended after the input columns
    pub flag_columns: Vec<&'static str>,
    pub records: Vec<ScoredRecord>,
    pub report: NormalizationReport,
}

impl ScoredBatch {
    /// Full output header: input columns, flags, score and label
    pub fn output_headers(&self) -> Vec<String> {
        self.headers
            .iter()
            .cloned()
            .chain(self.flag_columns.iter().map(|c| c.to_string()))
            .chain([RISK_SCORE_COLUMN.to_string(), FRAUD_LABEL_COLUMN.to_string()])
            .collect()
    }

    pub fn fraud_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_fraud()).count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
