//! Invoice Fraud Scoring Library
//!
//! Batch fraud-risk scoring for vendor invoices. Each record gets three
//! business-rule flags and three unsupervised anomaly flags; the flag count is
//! its risk score, and scores at or above a fixed threshold are labeled fraud.

pub mod config;
pub mod error;
pub mod feature_extractor;
pub mod io;
pub mod metrics;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod rules;
pub mod stats;
pub mod types;
pub mod view;

pub use config::AppConfig;
pub use error::ScoringError;
pub use feature_extractor::FeatureExtractor;
pub use models::{AnomalyEnsemble, OutlierDetector, ScoreAggregator};
pub use normalizer::RecordNormalizer;
pub use pipeline::ScoringPipeline;
pub use rules::RuleEvaluator;
pub use types::{FlagSet, InvoiceRecord, RawBatch, ScoredBatch, ScoredRecord};
