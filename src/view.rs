//! Read-only filtered views over a scored batch.
//!
//! Filters select records; they never touch scores or labels.

use crate::types::ScoredRecord;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt;
use std::ops::RangeInclusive;

/// Selection criteria. `None` means "do not filter on this field".
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    pub vendors: Option<HashSet<String>>,
    pub departments: Option<HashSet<String>>,
    pub score_range: Option<RangeInclusive<u8>>,
    /// Inclusive; records without a date never match an active date range
    pub date_range: Option<RangeInclusive<NaiveDate>>,
}

impl FilterCriteria {
    pub fn with_vendors<I, S>(mut self, vendors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vendors = Some(vendors.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_departments<I, S>(mut self, departments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.departments = Some(departments.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_score_range(mut self, range: RangeInclusive<u8>) -> Self {
        self.score_range = Some(range);
        self
    }

    pub fn with_date_range(mut self, range: RangeInclusive<NaiveDate>) -> Self {
        self.date_range = Some(range);
        self
    }

    /// True when no criterion is set
    pub fn is_empty(&self) -> bool {
        self.vendors.is_none()
            && self.departments.is_none()
            && self.score_range.is_none()
            && self.date_range.is_none()
    }

    pub fn matches(&self, scored: &ScoredRecord) -> bool {
        let record = &scored.record;
        self.vendors
            .as_ref()
            .map_or(true, |v| v.contains(&record.vendor_name))
            && self
                .departments
                .as_ref()
                .map_or(true, |d| d.contains(&record.department))
            && self
                .score_range
                .as_ref()
                .map_or(true, |r| r.contains(&scored.fraud_risk_score))
            && self
                .date_range
                .as_ref()
                .map_or(true, |r| record.date.is_some_and(|d| r.contains(&d)))
    }

    /// Select matching records, preserving order
    pub fn apply<'a>(&self, records: &'a [ScoredRecord]) -> Vec<&'a ScoredRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

/// Fraud count over a filtered view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterSummary {
    pub fraud_count: usize,
    pub total: usize,
}

impl FilterSummary {
    pub fn from_view(view: &[&ScoredRecord]) -> Self {
        Self {
            fraud_count: view.iter().filter(|r| r.is_fraud()).count(),
            total: view.len(),
        }
    }
}

impl fmt::Display for FilterSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fraud invoices detected out of {} filtered invoices.",
            self.fraud_count, self.total
        )
    }
}
