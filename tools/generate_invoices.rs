//! Synthetic Invoice Generator
//!
//! Writes a seeded invoice CSV for exercising the scoring pipeline. A share of
//! the rows is suspicious: reused invoice numbers, off-hours entry times and
//! extreme amounts.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveTime};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "generate-invoices")]
#[command(about = "Generate a synthetic invoice CSV", long_about = None)]
struct Cli {
    /// Output CSV path
    #[arg(short, long, default_value = "invoices.csv")]
    output: PathBuf,

    /// Number of invoices
    #[arg(short, long, default_value_t = 1000)]
    count: u64,

    /// Share of suspicious invoices
    #[arg(long, default_value_t = 0.05)]
    fraud_rate: f64,

    /// Share of rows emitted twice verbatim
    #[arg(long, default_value_t = 0.01)]
    duplicate_rate: f64,

    /// RNG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// One CSV row in the input layout the scorer expects
#[derive(Debug, Clone, Serialize)]
struct InvoiceRow {
    #[serde(rename = "Invoice Number")]
    invoice_number: String,
    #[serde(rename = "Vendor Name")]
    vendor_name: String,
    #[serde(rename = "Department")]
    department: String,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Time")]
    time: String,
    #[serde(rename = "Amount")]
    amount: String,
}

const VENDORS: &[&str] = &[
    "Acme Supplies",
    "Northwind Traders",
    "Globex Corp",
    "Initech",
    "Umbrella Logistics",
    "Stark Components",
];

const DEPARTMENTS: &[&str] = &["IT", "HR", "Finance", "Operations", "Marketing"];

struct InvoiceGenerator {
    rng: StdRng,
    invoice_counter: u64,
    issued: Vec<String>,
    start: NaiveDate,
}

impl InvoiceGenerator {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            invoice_counter: 0,
            issued: Vec::new(),
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
        }
    }

    fn next_number(&mut self) -> String {
        self.invoice_counter += 1;
        let number = format!("INV-{:06}", self.invoice_counter);
        self.issued.push(number.clone());
        number
    }

    fn date(&mut self) -> String {
        let offset = self.rng.gen_range(0..365);
        (self.start + Duration::days(offset))
            .format("%Y-%m-%d")
            .to_string()
    }

    fn time_between(&mut self, from_hour: u32, to_hour: u32) -> String {
        let hour = self.rng.gen_range(from_hour..to_hour);
        let minute = self.rng.gen_range(0..60);
        let second = self.rng.gen_range(0..60);
        NaiveTime::from_hms_opt(hour, minute, second)
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_default()
    }

    /// Business-hours invoice with an ordinary amount
    fn generate_legitimate(&mut self) -> InvoiceRow {
        InvoiceRow {
            invoice_number: self.next_number(),
            vendor_name: self.random_choice(VENDORS).to_string(),
            department: self.random_choice(DEPARTMENTS).to_string(),
            date: self.date(),
            time: self.time_between(9, 17),
            amount: format!("{:.2}", self.rng.gen_range(50.0..5000.0)),
        }
    }

    /// Invoice carrying one or more of the patterns the scorer looks for
    fn generate_suspicious(&mut self) -> InvoiceRow {
        let mut row = self.generate_legitimate();

        if !self.issued.is_empty() && self.rng.gen_bool(0.5) {
            let reused = self.rng.gen_range(0..self.issued.len());
            row.invoice_number = self.issued[reused].clone();
        }
        if self.rng.gen_bool(0.6) {
            row.time = if self.rng.gen_bool(0.5) {
                self.time_between(0, 9)
            } else {
                self.time_between(17, 24)
            };
        }
        if self.rng.gen_bool(0.7) {
            row.amount = format!("{:.2}", self.rng.gen_range(50_000.0..250_000.0));
        }
        row
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("generate_invoices=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    anyhow::ensure!(
        (0.0..=1.0).contains(&cli.fraud_rate) && (0.0..=1.0).contains(&cli.duplicate_rate),
        "Rates must lie in [0, 1]"
    );

    info!(
        output = %cli.output.display(),
        count = cli.count,
        fraud_rate = cli.fraud_rate,
        seed = cli.seed,
        "Configuration loaded"
    );

    let mut generator = InvoiceGenerator::new(cli.seed);
    let mut writer = csv::Writer::from_path(&cli.output)
        .with_context(|| format!("Failed to create {}", cli.output.display()))?;

    let mut legitimate_count = 0u64;
    let mut suspicious_count = 0u64;
    let mut duplicate_count = 0u64;

    for _ in 0..cli.count {
        let row = if generator.rng.gen_bool(cli.fraud_rate) {
            suspicious_count += 1;
            generator.generate_suspicious()
        } else {
            legitimate_count += 1;
            generator.generate_legitimate()
        };

        writer.serialize(&row)?;
        if generator.rng.gen_bool(cli.duplicate_rate) {
            duplicate_count += 1;
            writer.serialize(&row)?;
        }
    }
    writer.flush()?;

    info!(
        "Completed! Wrote {} invoices ({} legitimate, {} suspicious, {} exact duplicates)",
        cli.count, legitimate_count, suspicious_count, duplicate_count
    );

    Ok(())
}
