//! Invoice batch data structures

use chrono::{NaiveDate, NaiveTime};

/// A raw tabular batch: header plus string cells, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBatch {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawBatch {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Build a batch from string slices (handy for fixtures)
    pub fn from_strs(headers: &[&str], rows: &[&[&str]]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    /// Position of a column by exact header name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One normalized invoice row.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceRecord {
    /// Invoice number (may repeat within a batch)
    pub invoice_number: String,

    /// Vendor name
    pub vendor_name: String,

    /// Department
    pub department: String,

    /// Invoice date; `None` when the cell could not be parsed
    pub date: Option<NaiveDate>,

    /// Time of day; `None` when the cell could not be parsed
    pub time: Option<NaiveTime>,

    /// Invoice amount
    pub amount: f64,

    /// Every raw cell of the row, in header order
    pub fields: Vec<String>,
}

impl InvoiceRecord {
    /// Create a record with only the scoring-relevant fields set
    pub fn new(invoice_number: &str, amount: f64) -> Self {
        Self {
            invoice_number: invoice_number.to_string(),
            vendor_name: String::new(),
            department: String::new(),
            date: None,
            time: None,
            amount,
            fields: Vec::new(),
        }
    }

    pub fn with_time(mut self, time: NaiveTime) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_vendor(mut self, vendor_name: &str, department: &str) -> Self {
        self.vendor_name = vendor_name.to_string();
        self.department = department.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_batch_column_lookup() {
        let batch = RawBatch::from_strs(&["Invoice Number", "Amount"], &[&["INV-1", "10.0"]]);

        assert_eq!(batch.column_index("Amount"), Some(1));
        assert_eq!(batch.column_index("amount"), None);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_record_builder() {
        let record = InvoiceRecord::new("INV-7", 250.0)
            .with_vendor("Acme", "IT")
            .with_time(NaiveTime::from_hms_opt(14, 0, 0).unwrap());

        assert_eq!(record.vendor_name, "Acme");
        assert_eq!(record.department, "IT");
        assert!(record.date.is_none());
        assert!(record.time.is_some());
    }
}
