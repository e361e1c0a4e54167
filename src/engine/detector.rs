//! Platform detection.
//!
//! Resolves the counterparty platform of a transaction from its free-text
//! fields against a [`PlatformMapping`] snapshot. Each field is tried
//! against the contract table, then the pattern rules; the first tier that
//! answers wins for that field. If no field answers, the chain default (or
//! "Unknown") applies. Pure given the snapshot.

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::mapping::PlatformMapping;
use crate::types::{Chain, DetectionMethod, UNKNOWN_PLATFORM};

// Truncated exports ("0x8093d002...") still yield a usable prefix.
static HEX_ADDRESS: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"0[xX][0-9a-fA-F]{6,}"));
static BASE58_ADDRESS: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"\b[1-9A-HJ-NP-Za-km-z]{32,44}\b"));

/// Outcome of detection for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub platform: String,
    pub method: DetectionMethod,
    /// All distinct platforms found across fields; empty unless more than one.
    pub candidates: Vec<String>,
}

impl Detection {
    pub fn unknown() -> Self {
        Self {
            platform: UNKNOWN_PLATFORM.to_string(),
            method: DetectionMethod::None,
            candidates: Vec::new(),
        }
    }
}

/// Detection over the process-wide address extractors, which compile on
/// first use.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformDetector;

impl PlatformDetector {
    pub fn new() -> Self {
        Self
    }

    /// Detect the platform for `chain` from `fields`, in field order.
    pub fn detect<S: AsRef<str>>(
        &self,
        chain: Chain,
        fields: &[S],
        mapping: &PlatformMapping,
    ) -> Detection {
        let hits: Vec<(String, DetectionMethod)> = fields
            .iter()
            .filter_map(|field| self.detect_field(chain, field.as_ref(), mapping))
            .collect();

        let primary = [DetectionMethod::ContractMatch, DetectionMethod::PatternMatch]
            .iter()
            .find_map(|tier| hits.iter().find(|(_, method)| method == tier));

        let Some((platform, method)) = primary.cloned() else {
            return chain_fallback(chain, mapping);
        };

        let mut candidates: Vec<String> = Vec::new();
        for (name, _) in &hits {
            if !candidates.contains(name) {
                candidates.push(name.clone());
            }
        }
        if candidates.len() < 2 {
            candidates.clear();
        }

        debug!(
            chain = %chain,
            platform = %platform,
            method = %method,
            candidates = candidates.len(),
            "Platform detected"
        );

        Detection {
            platform,
            method,
            candidates,
        }
    }

    /// Contract tier, then pattern tier, for one field.
    fn detect_field(
        &self,
        chain: Chain,
        text: &str,
        mapping: &PlatformMapping,
    ) -> Option<(String, DetectionMethod)> {
        if text.trim().is_empty() {
            return None;
        }
        self.contract_hit(chain, text, mapping)
            .map(|p| (p.to_string(), DetectionMethod::ContractMatch))
            .or_else(|| {
                mapping
                    .pattern_platform(text)
                    .map(|p| (p.to_string(), DetectionMethod::PatternMatch))
            })
    }

    fn contract_hit<'m>(
        &self,
        chain: Chain,
        text: &str,
        mapping: &'m PlatformMapping,
    ) -> Option<&'m str> {
        self.extract_addresses(text)
            .into_iter()
            .find_map(|address| mapping.contract_platform(chain, address))
    }

    /// Every hex and base58 candidate in order of appearance.
    pub fn extract_addresses<'t>(&self, text: &'t str) -> Vec<&'t str> {
        let mut found: Vec<(usize, &'t str)> = Vec::new();
        for extractor in [&*HEX_ADDRESS, &*BASE58_ADDRESS].into_iter().flatten() {
            found.extend(extractor.find_iter(text).map(|m| (m.start(), m.as_str())));
        }
        found.sort_by_key(|(start, _)| *start);
        found.into_iter().map(|(_, s)| s).collect()
    }
}

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(pattern, error = %e, "Address extractor failed to compile, contract tier disabled");
            None
        }
    }
}

fn chain_fallback(chain: Chain, mapping: &PlatformMapping) -> Detection {
    match mapping.chain_default(chain) {
        Some(label) => Detection {
            platform: label.to_string(),
            method: DetectionMethod::ChainDefault,
            candidates: Vec::new(),
        },
        None => Detection::unknown(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
