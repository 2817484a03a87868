//! Record normalization: column validation, field parsing and exact-duplicate removal.

use crate::config::ColumnMapping;
use crate::error::{Result, ScoringError};
use crate::types::{InvoiceRecord, NormalizationReport, RawBatch};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashSet;
use tracing::{debug, info, warn};

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const TIME_FORMAT: &str = "%H:%M:%S";

/// Parse a calendar date, accepting the common invoice export formats.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Parse a 24-hour `HH:MM:SS` time of day.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), TIME_FORMAT).ok()
}

/// Column positions resolved against a batch header
struct ColumnIndices {
    invoice_number: usize,
    vendor_name: usize,
    department: usize,
    date: usize,
    time: usize,
    amount: usize,
}

impl ColumnIndices {
    fn resolve(batch: &RawBatch, columns: &ColumnMapping) -> Result<Self> {
        let find = |name: &str| {
            batch
                .column_index(name)
                .ok_or_else(|| ScoringError::MissingColumn(name.to_string()))
        };

        Ok(Self {
            invoice_number: find(&columns.invoice_number)?,
            vendor_name: find(&columns.vendor_name)?,
            department: find(&columns.department)?,
            date: find(&columns.date)?,
            time: find(&columns.time)?,
            amount: find(&columns.amount)?,
        })
    }
}

/// Turns a raw batch into typed invoice records.
pub struct RecordNormalizer {
    columns: ColumnMapping,
}

impl RecordNormalizer {
    pub fn new(columns: ColumnMapping) -> Self {
        Self { columns }
    }

    /// Normalize a batch.
    ///
    /// Missing columns, an empty batch, ragged rows and non-numeric amounts
    /// are fatal. Unparseable dates and times become `None` and are counted.
    pub fn normalize(&self, batch: &RawBatch) -> Result<(Vec<InvoiceRecord>, NormalizationReport)> {
        let indices = ColumnIndices::resolve(batch, &self.columns)?;
        if batch.is_empty() {
            return Err(ScoringError::EmptyBatch);
        }

        let mut report = NormalizationReport {
            rows_read: batch.len(),
            ..Default::default()
        };

        let mut seen: HashSet<&[String]> = HashSet::with_capacity(batch.len());
        let mut records = Vec::with_capacity(batch.len());

        for (row_idx, row) in batch.rows.iter().enumerate() {
            if row.len() != batch.headers.len() {
                return Err(ScoringError::RaggedRow {
                    row: row_idx,
                    expected: batch.headers.len(),
                    found: row.len(),
                });
            }

            // First occurrence wins
            if !seen.insert(row.as_slice()) {
                report.duplicates_removed += 1;
                continue;
            }

            let amount_raw = &row[indices.amount];
            let amount = amount_raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|a| a.is_finite())
                .ok_or_else(|| ScoringError::NonNumericAmount {
                    row: row_idx,
                    value: amount_raw.clone(),
                })?;

            let date = parse_date(&row[indices.date]);
            if date.is_none() {
                report.unparseable_dates += 1;
                debug!(row = row_idx, value = %row[indices.date], "Unparseable date");
            }

            let time = parse_time(&row[indices.time]);
            if time.is_none() {
                report.unparseable_times += 1;
                debug!(row = row_idx, value = %row[indices.time], "Unparseable time");
            }

            records.push(InvoiceRecord {
                invoice_number: row[indices.invoice_number].clone(),
                vendor_name: row[indices.vendor_name].clone(),
                department: row[indices.department].clone(),
                date,
                time,
                amount,
                fields: row.clone(),
            });
        }

        info!(
            rows = report.rows_read,
            kept = records.len(),
            "Removed {} duplicate rows",
            report.duplicates_removed
        );
        if report.unparseable_dates > 0 || report.unparseable_times > 0 {
            warn!(
                dates = report.unparseable_dates,
                times = report.unparseable_times,
                "Unparseable date/time fields treated as missing"
            );
        }

        Ok((records, report))
    }

    /// Render a record's date/time cells from their parsed values
    pub fn render_row(&self, headers: &[String], record: &InvoiceRecord) -> Vec<String> {
        headers
            .iter()
            .zip(&record.fields)
            .map(|(header, cell)| {
                if *header == self.columns.date {
                    record
                        .date
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_default()
                } else if *header == self.columns.time {
                    record
                        .time
                        .map(|t| t.format(TIME_FORMAT).to_string())
                        .unwrap_or_default()
                } else {
                    cell.clone()
                }
            })
            .collect()
    }
}

impl Default for RecordNormalizer {
    fn default() -> Self {
        Self::new(ColumnMapping::default())
    }
}
