//! Persistence layer.
//!
//! Enriched records are kept in a flat JSON file, keyed by record identity.
//! Re-enhancement overwrites by identity, so the store never holds two
//! records for the same `(tx_id, wallet)`.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::types::EnrichedTransactionRecord;

/// Default store file path.
const DEFAULT_STORE_FILE: &str = "txlens_enriched.json";

/// Outcome of an upsert batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    pub inserted: usize,
    pub replaced: usize,
}

/// In-memory view of the enriched-record file. Insertion order is kept;
/// a replaced record stays in its original slot.
#[derive(Debug, Clone, Default)]
pub struct EnrichedStore {
    records: Vec<EnrichedTransactionRecord>,
    index: HashMap<String, usize>,
}

impl EnrichedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list that may contain duplicate identities; the last
    /// occurrence wins.
    pub fn from_records(records: Vec<EnrichedTransactionRecord>) -> Self {
        let mut store = Self::new();
        let stats = store.upsert(records);
        if stats.replaced > 0 {
            warn!(duplicates = stats.replaced, "Store contained duplicate identities, kept last");
        }
        store
    }

    /// Insert or overwrite each record by identity.
    pub fn upsert(&mut self, records: impl IntoIterator<Item = EnrichedTransactionRecord>) -> UpsertStats {
        let mut stats = UpsertStats::default();
        for record in records {
            match self.index.get(&record.id) {
                Some(&slot) => {
                    self.records[slot] = record;
                    stats.replaced += 1;
                }
                None => {
                    self.index.insert(record.id.clone(), self.records.len());
                    self.records.push(record);
                    stats.inserted += 1;
                }
            }
        }
        debug!(inserted = stats.inserted, replaced = stats.replaced, "Store upsert");
        stats
    }

    pub fn get(&self, id: &str) -> Option<&EnrichedTransactionRecord> {
        self.index.get(id).map(|&slot| &self.records[slot])
    }

    pub fn records(&self) -> &[EnrichedTransactionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Save the store to a JSON file.
pub fn save_store(store: &EnrichedStore, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STORE_FILE);
    let json = serde_json::to_string_pretty(store.records())
        .context("Failed to serialise enriched records")?;

    std::fs::write(path, &json)
        .with_context(|| format!("Failed to write store to {path}"))?;

    debug!(path, records = store.len(), "Store saved");
    Ok(())
}

/// Load the store from a JSON file.
/// Returns an empty store if the file doesn't exist (first run).
pub fn load_store(path: Option<&str>) -> Result<EnrichedStore> {
    let path = path.unwrap_or(DEFAULT_STORE_FILE);

    if !Path::new(path).exists() {
        info!(path, "No enriched store found, starting empty");
        return Ok(EnrichedStore::new());
    }

    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read store from {path}"))?;

    let records: Vec<EnrichedTransactionRecord> = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse store from {path}"))?;

    let store = EnrichedStore::from_records(records);
    info!(path, records = store.len(), "Store loaded from disk");
    Ok(store)
}

/// Delete the store file (for testing or reset).
pub fn delete_store(path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STORE_FILE);
    if Path::new(path).exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to delete store file {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
