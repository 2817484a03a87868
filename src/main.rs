//! Invoice Fraud Scoring - Main Entry Point
//!
//! Reads an invoice CSV, scores every record, and writes the scored table.
//! Optional filters produce a second, filtered view of the same scores.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use invoice_fraud_scoring::{
    config::AppConfig,
    io,
    metrics::{RunReport, ScoringMetrics},
    pipeline::ScoringPipeline,
    view::{FilterCriteria, FilterSummary},
};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "invoice-fraud")]
#[command(about = "Score vendor invoices for fraud risk", long_about = None)]
struct Cli {
    /// Input invoice CSV
    #[arg(short, long)]
    input: PathBuf,

    /// Output CSV with flags, risk score and label appended
    #[arg(short, long)]
    output: PathBuf,

    /// Configuration file (TOML); defaults to config/config.toml when present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a JSON run report
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write the filtered view to this CSV
    #[arg(long)]
    filtered_output: Option<PathBuf>,

    /// Keep only these vendors (repeatable)
    #[arg(long = "vendor")]
    vendors: Vec<String>,

    /// Keep only these departments (repeatable)
    #[arg(long = "department")]
    departments: Vec<String>,

    /// Lowest risk score to keep
    #[arg(long)]
    min_score: Option<u8>,

    /// Highest risk score to keep
    #[arg(long)]
    max_score: Option<u8>,

    /// Earliest invoice date to keep (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Latest invoice date to keep (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl Cli {
    fn filter_criteria(&self) -> FilterCriteria {
        let mut criteria = FilterCriteria::default();
        if !self.vendors.is_empty() {
            criteria = criteria.with_vendors(self.vendors.iter().cloned());
        }
        if !self.departments.is_empty() {
            criteria = criteria.with_departments(self.departments.iter().cloned());
        }
        if self.min_score.is_some() || self.max_score.is_some() {
            criteria = criteria
                .with_score_range(self.min_score.unwrap_or(0)..=self.max_score.unwrap_or(u8::MAX));
        }
        if self.from.is_some() || self.to.is_some() {
            criteria = criteria.with_date_range(
                self.from.unwrap_or(NaiveDate::MIN)..=self.to.unwrap_or(NaiveDate::MAX),
            );
        }
        criteria
    }
}

fn init_tracing(config: &AppConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(
        format!("invoice_fraud_scoring={}", config.logging.level).parse()?,
    );

    if config.logging.format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };

    init_tracing(&config)?;
    info!("Starting invoice fraud scoring");
    info!(
        "Label threshold: {}, contamination: {:.2}, LOF neighbors: {}, SVM nu: {:.2}",
        config.scoring.fraud_label_threshold,
        config.detectors.contamination,
        config.detectors.lof.n_neighbors,
        config.detectors.one_class_svm.nu
    );

    let batch = io::read_batch(&cli.input)?;

    let pipeline = ScoringPipeline::new(&config);
    let (scored, timings) = pipeline
        .run_timed(&batch)
        .with_context(|| format!("Scoring {} failed", cli.input.display()))?;

    io::write_scored(&cli.output, &scored, pipeline.normalizer(), &scored.records)?;
    info!("Fraud risk scores saved to {}", cli.output.display());

    let metrics = ScoringMetrics::from_batch(&scored, timings);
    metrics.print_summary();

    if let Some(path) = &cli.report {
        let report = RunReport::new(&cli.input.display().to_string(), &metrics);
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        info!(run_id = %report.run_id, "Run report written to {}", path.display());
    }

    let criteria = cli.filter_criteria();
    if let Some(path) = &cli.filtered_output {
        let view = criteria.apply(&scored.records);
        io::write_scored(path, &scored, pipeline.normalizer(), view.iter().copied())?;
        info!("{}", FilterSummary::from_view(&view));
    } else if !criteria.is_empty() {
        warn!("Filters given without --filtered-output, ignoring them");
    }

    Ok(())
}
