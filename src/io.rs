//! CSV input and output for invoice batches.

use crate::normalizer::RecordNormalizer;
use crate::types::{RawBatch, ScoredBatch, ScoredRecord};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::info;

/// Load a raw batch from a CSV file with a header row.
pub fn read_batch(path: &Path) -> Result<RawBatch> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let batch = read_batch_from(BufReader::new(file))
        .with_context(|| format!("Failed to parse CSV {}", path.display()))?;

    info!(path = %path.display(), rows = batch.len(), columns = batch.headers.len(), "Loaded invoice batch");
    Ok(batch)
}

/// Load a raw batch from any CSV source.
pub fn read_batch_from<R: Read>(reader: R) -> Result<RawBatch> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .context("Missing CSV header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let rows = reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect::<Vec<String>>())
                .context("Malformed CSV record")
        })
        .collect::<Result<Vec<Vec<String>>>>()?;

    Ok(RawBatch::new(headers, rows))
}

/// Write scored records (all, or a filtered view) with the full output header.
pub fn write_scored<'a, I>(
    path: &Path,
    batch: &ScoredBatch,
    normalizer: &RecordNormalizer,
    records: I,
) -> Result<usize>
where
    I: IntoIterator<Item = &'a ScoredRecord>,
{
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let written = write_scored_to(BufWriter::new(file), batch, normalizer, records)?;

    info!(path = %path.display(), rows = written, "Wrote scored invoices");
    Ok(written)
}

/// Write scored records to any sink.
pub fn write_scored_to<'a, W, I>(
    writer: W,
    batch: &ScoredBatch,
    normalizer: &RecordNormalizer,
    records: I,
) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a ScoredRecord>,
{
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(batch.output_headers())?;

    let mut written = 0;
    for scored in records {
        let mut row = normalizer.render_row(&batch.headers, &scored.record);
        row.extend(scored.flags.columns().map(|(_, v)| v.to_string()));
        row.push(scored.fraud_risk_score.to_string());
        row.push(scored.fraud_label.to_string());
        writer.write_record(&row)?;
        written += 1;
    }

    writer.flush().context("Failed to flush CSV output")?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ScoringPipeline;
    use tempfile::NamedTempFile;

    const INPUT: &str = "\
Invoice Number,Vendor Name,Department,Date,Time,Amount,PO
INV-1,Acme,IT,2024-01-05,03:00:00,120.50,PO-9
INV-2,\"Beta, Inc\",HR,01/06/2024,14:00:00,300,
INV-1,Acme,IT,2024-01-07,bad,99.99,PO-9
";

    #[test]
    fn test_read_batch_from_str() {
        let batch = read_batch_from(INPUT.as_bytes()).unwrap();

        assert_eq!(batch.headers.len(), 7);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.rows[1][1], "Beta, Inc");
        assert_eq!(batch.rows[1][6], "");
    }

    #[test]
    fn test_write_scored_round_trip() {
        let pipeline = ScoringPipeline::default();
        let batch = read_batch_from(INPUT.as_bytes()).unwrap();
        let scored = pipeline.run(&batch).unwrap();

        let file = NamedTempFile::new().unwrap();
        let written = write_scored(file.path(), &scored, pipeline.normalizer(), &scored.records).unwrap();
        assert_eq!(written, 3);

        let output = read_batch(file.path()).unwrap();
        assert_eq!(output.headers.len(), 7 + 8);
        assert_eq!(output.headers.last().map(String::as_str), Some("fraud_label"));

        // Dates normalized, unparseable time left empty
        assert_eq!(output.rows[1][3], "2024-01-06");
        assert_eq!(output.rows[2][4], "");

        let duplicate = output.column_index("is_duplicate_invoice").unwrap();
        let weird = output.column_index("is_weird_time").unwrap();
        assert_eq!(output.rows[0][duplicate], "1");
        assert_eq!(output.rows[1][duplicate], "0");
        assert_eq!(output.rows[0][weird], "1");
        assert_eq!(output.rows[2][weird], "0");
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_batch(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(err.to_string().contains("Failed to open"));
    }
}
