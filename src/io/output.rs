use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::models::{AnalysisRecord, ClassificationResult, Modality};

/// Append-mode writer for the result table (JSON Lines, one row per
/// (segment, modality) pair).
///
/// A single writer owns the file handle; each `write` serializes one complete
/// row, terminates it with a newline, and flushes, so a row is either fully
/// visible on disk or absent. Reruns append by key; rows are never rewritten.
pub struct ResultWriter {
    file: std::fs::File,
}

impl ResultWriter {
    pub fn open_append(path: &Path) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open result table: {:?}", path))?;
        Ok(Self { file })
    }

    pub fn write(&mut self, result: &ClassificationResult) -> Result<()> {
        let mut line =
            serde_json::to_string(result).context("Failed to serialize result row")?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .context("Failed to append result row")?;
        self.file.flush().context("Failed to flush result table")?;
        Ok(())
    }
}

/// Load every row of a result table.
pub fn load_results(path: &Path) -> Result<Vec<ClassificationResult>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;

    let mut results = Vec::new();
    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let result: ClassificationResult = serde_json::from_str(line)
            .with_context(|| format!("Malformed result row at line {}", number + 1))?;
        results.push(result);
    }
    Ok(results)
}

/// Load the (segment_id, modality) keys already present in a result table.
///
/// Every persisted row carries a terminal status, so presence alone means the
/// pair is done and a resumed run must not re-bill the rating service for it.
/// A missing file is an empty table, not an error.
pub fn load_terminal_keys(path: &Path) -> Result<HashSet<(String, Modality)>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }
    let results = load_results(path)?;
    Ok(results.iter().map(|r| r.key()).collect())
}

/// Write the analysis table as pretty-printed JSON.
pub fn write_analysis(path: &Path, records: &[AnalysisRecord]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {:?}", path))?;
    serde_json::to_writer_pretty(file, records).context("Failed to write analysis")?;
    Ok(())
}

/// Format the analysis records as a human-readable console report.
pub fn render_report(records: &[AnalysisRecord]) -> String {
    let mut out = String::new();

    for record in records {
        let _ = writeln!(out, "Modality: {}", record.modality);
        let _ = writeln!(out, "----------");
        let _ = writeln!(
            out,
            "Mean absolute error: {:.2}",
            record.mean_absolute_error
        );
        let _ = writeln!(
            out,
            "Accuracy: {:.1}% ({} rated samples)",
            record.accuracy_percent, record.sample_count
        );
        let _ = writeln!(
            out,
            "Excluded (skipped/error): {} ({:.1}%)",
            record.skipped_count,
            record.skipped_proportion * 100.0
        );
        let _ = writeln!(
            out,
            "Hits: {}  Near-misses: {}  Misses: {}",
            record.hits, record.near_misses, record.misses
        );

        let _ = writeln!(out, "Confusion matrix (rows = truth, columns = predicted):");
        let matrix = &record.confusion_matrix;
        let _ = write!(out, "      ");
        for label in matrix.scale.labels() {
            let _ = write!(out, "{:>6}", label);
        }
        let _ = writeln!(out);
        for truth in matrix.scale.labels() {
            let _ = write!(out, "{:>6}", truth);
            for predicted in matrix.scale.labels() {
                let _ = write!(out, "{:>6}", matrix.get(truth, predicted));
            }
            let _ = writeln!(out);
        }
        let _ = writeln!(out);
    }

    out
}
