//! Error taxonomy for the scoring pipeline

/// Fatal errors that abort a scoring run.
///
/// Field-level parse problems (dates, times) are not errors: they are
/// recovered as `None` and counted in the normalization report.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("Required column '{0}' not found in input")]
    MissingColumn(String),

    #[error("Non-numeric amount '{value}' at row {row}")]
    NonNumericAmount { row: usize, value: String },

    #[error("Input batch contains no rows")]
    EmptyBatch,

    #[error("Row {row} has {found} fields, header has {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Detector '{detector}' failed: {reason}")]
    Detector {
        detector: &'static str,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, ScoringError>;
