//! Raw-record source.
//!
//! Loads collector output from disk. Two layouts are accepted: a JSON array
//! of records, or JSON Lines (`.jsonl` / `.ndjson`, one record per line,
//! blank lines ignored).

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::types::RawTransactionRecord;

/// Load raw records from `path`, picking the layout by extension.
pub fn load_raw_records(path: &str) -> Result<Vec<RawTransactionRecord>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read raw records from {path}"))?;

    let records = if is_json_lines(path) {
        parse_json_lines(&contents)
    } else {
        parse_json_array(&contents)
    }
    .with_context(|| format!("Failed to parse raw records from {path}"))?;

    info!(path, count = records.len(), "Raw records loaded");
    Ok(records)
}

pub fn parse_json_array(contents: &str) -> Result<Vec<RawTransactionRecord>> {
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(contents).context("Invalid JSON array of raw records")
}

pub fn parse_json_lines(contents: &str) -> Result<Vec<RawTransactionRecord>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Invalid raw record on line {}", idx + 1))
        })
        .collect()
}

fn is_json_lines(path: &str) -> bool {
    matches!(
        Path::new(path).extension().and_then(|e| e.to_str()),
        Some("jsonl") | Some("ndjson")
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
