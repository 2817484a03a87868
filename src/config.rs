//! Configuration management for the invoice scoring pipeline
//!
//! The defaults are the scoring policy. A config file may override them for
//! experiments, but nothing here is fitted from data.

use anyhow::{Context, Result};
use chrono::NaiveTime;
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Flags at or above this score label a record as fraud
pub const FRAUD_LABEL_THRESHOLD: u8 = 3;
/// Width of the amount band in standard deviations
pub const AMOUNT_SIGMA: f64 = 2.0;
/// Expected outlier share for the isolation forest and LOF
pub const CONTAMINATION: f64 = 0.05;
/// LOF neighborhood size
pub const LOF_NEIGHBORS: usize = 20;
/// One-class SVM outlier fraction bound
pub const SVM_NU: f64 = 0.05;
/// One-class SVM RBF kernel coefficient
pub const SVM_GAMMA: f64 = 0.1;
pub const SVM_TOLERANCE: f64 = 1e-3;
pub const IF_ESTIMATORS: usize = 100;
pub const IF_MAX_SAMPLES: usize = 256;
pub const RANDOM_STATE: u64 = 42;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scoring: ScoringPolicy,
    pub detectors: DetectorsConfig,
    pub columns: ColumnMapping,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// Rule and labeling policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    /// Score at which a record is labeled fraud
    pub fraud_label_threshold: u8,
    /// Amount band width in (sample) standard deviations
    pub amount_sigma: f64,
    /// Times strictly before this are off-hours
    pub business_day_start: NaiveTime,
    /// Times strictly after this are off-hours
    pub business_day_end: NaiveTime,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            fraud_label_threshold: FRAUD_LABEL_THRESHOLD,
            amount_sigma: AMOUNT_SIGMA,
            business_day_start: NaiveTime::from_hms_opt(6, 0, 0).unwrap_or_default(),
            business_day_end: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default(),
        }
    }
}

/// Anomaly detector hyperparameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorsConfig {
    /// Contamination shared by the isolation forest and LOF
    pub contamination: f64,
    /// Standardize features before detection.
    /// `false` fits the one-class SVM on raw amounts with the fixed gamma.
    pub standardize: bool,
    pub isolation_forest: IsolationForestConfig,
    pub lof: LofConfig,
    pub one_class_svm: OneClassSvmConfig,
}

impl Default for DetectorsConfig {
    fn default() -> Self {
        Self {
            contamination: CONTAMINATION,
            standardize: true,
            isolation_forest: IsolationForestConfig::default(),
            lof: LofConfig::default(),
            one_class_svm: OneClassSvmConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IsolationForestConfig {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub random_state: u64,
}

impl Default for IsolationForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: IF_ESTIMATORS,
            max_samples: IF_MAX_SAMPLES,
            random_state: RANDOM_STATE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LofConfig {
    pub n_neighbors: usize,
}

impl Default for LofConfig {
    fn default() -> Self {
        Self {
            n_neighbors: LOF_NEIGHBORS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OneClassSvmConfig {
    pub nu: f64,
    pub gamma: f64,
    /// Solver stopping tolerance; also the boundary margin for labeling
    pub tolerance: f64,
}

impl Default for OneClassSvmConfig {
    fn default() -> Self {
        Self {
            nu: SVM_NU,
            gamma: SVM_GAMMA,
            tolerance: SVM_TOLERANCE,
        }
    }
}

/// Input column names
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub invoice_number: String,
    pub vendor_name: String,
    pub department: String,
    pub date: String,
    pub time: String,
    pub amount: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            invoice_number: "Invoice Number".to_string(),
            vendor_name: "Vendor Name".to_string(),
            department: "Department".to_string(),
            date: "Date".to_string(),
            time: "Time".to_string(),
            amount: "Amount".to_string(),
        }
    }
}

/// Pipeline execution configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run the rule evaluator and each detector on scoped threads
    pub parallel: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        let path = Path::new("config/config.toml");
        if path.exists() {
            Self::load_from_path(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.scoring.fraud_label_threshold, 3);
        assert_eq!(config.scoring.amount_sigma, 2.0);
        assert_eq!(config.detectors.contamination, 0.05);
        assert_eq!(config.detectors.lof.n_neighbors, 20);
        assert!(config.detectors.standardize);
        assert_eq!(config.detectors.one_class_svm.nu, 0.05);
        assert_eq!(config.columns.invoice_number, "Invoice Number");
        assert!(!config.pipeline.parallel);
    }

    #[test]
    fn test_business_day_window() {
        let policy = ScoringPolicy::default();
        assert_eq!(policy.business_day_start, NaiveTime::from_hms_opt(6, 0, 0).unwrap());
        assert_eq!(policy.business_day_end, NaiveTime::from_hms_opt(22, 0, 0).unwrap());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[pipeline]\nparallel = true\n\n[columns]\namount = \"Total\"").unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();

        assert!(config.pipeline.parallel);
        assert_eq!(config.columns.amount, "Total");
        assert_eq!(config.columns.date, "Date");
        assert_eq!(config.detectors.isolation_forest.random_state, 42);
    }
}
