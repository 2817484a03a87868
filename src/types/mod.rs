//! Type definitions for the scoring pipeline

pub mod invoice;
pub mod scored;

pub use invoice::{InvoiceRecord, RawBatch};
pub use scored::{
    DetectorFlag, FlagSet, NormalizationReport, RuleFlags, ScoredBatch, ScoredRecord,
};
