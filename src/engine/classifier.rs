//! Transaction classification.
//!
//! Keyword rules over the raw type string, first match wins, with an
//! asset-shape fallback for generic types such as a bare "execute". The
//! rule table is plain data injected by the enhancer so tests and
//! `config.toml` can substitute their own.

use serde::Deserialize;
use std::collections::HashSet;
use tracing::trace;

use crate::types::{Category, DetectionMethod, Direction, ParsedAsset};

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

/// One keyword rule: a case-insensitive substring test on the type string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeywordRule {
    pub keyword: String,
    pub category: Category,
}

impl KeywordRule {
    pub fn new(keyword: &str, category: Category) -> Self {
        Self {
            keyword: keyword.to_lowercase(),
            category,
        }
    }
}

/// Ordered keyword table plus the type strings considered too generic to
/// classify by keyword.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryRules {
    pub rules: Vec<KeywordRule>,
    #[serde(default = "default_generic_types")]
    pub generic_types: Vec<String>,
}

impl Default for CategoryRules {
    fn default() -> Self {
        use Category::*;
        let table: &[(&str, Category)] = &[
            ("swap", Swap),
            ("bridge", Bridge),
            ("add liquidity", Liquidity),
            ("remove liquidity", Liquidity),
            ("liquidity", Liquidity),
            ("lp", Liquidity),
            ("harvest", Farming),
            ("collect", Farming),
            ("claim", Farming),
            ("farm", Farming),
            ("unstake", Staking),
            ("stake", Staking),
            ("delegate", Staking),
            ("send", Transfer),
            ("receive", Transfer),
            ("deposit", Transfer),
            ("withdraw", Transfer),
        ];
        Self {
            rules: table.iter().map(|(k, c)| KeywordRule::new(k, *c)).collect(),
            generic_types: default_generic_types(),
        }
    }
}

fn default_generic_types() -> Vec<String> {
    ["execute", "transfer", "call", "contract interaction", "unknown", ""]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Classifies records against an injected [`CategoryRules`] table.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: CategoryRules,
    generic: HashSet<String>,
}

impl Classifier {
    pub fn new(mut rules: CategoryRules) -> Self {
        // Config-file keywords arrive as written.
        for rule in &mut rules.rules {
            rule.keyword = rule.keyword.trim().to_lowercase();
        }
        rules.rules.retain(|rule| !rule.keyword.is_empty());
        let generic = rules
            .generic_types
            .iter()
            .map(|t| t.trim().to_lowercase())
            .collect();
        Self { rules, generic }
    }

    /// Classify a transaction. `method` is how its platform was detected;
    /// only contract and pattern hits count as a known counterparty.
    pub fn classify(
        &self,
        tx_type: &str,
        assets: &[ParsedAsset],
        method: DetectionMethod,
    ) -> Category {
        let normalized = tx_type.trim().to_lowercase();
        let counterparty = method.is_counterparty();

        if !self.generic.contains(&normalized) {
            if let Some(rule) = self
                .rules
                .rules
                .iter()
                .find(|rule| normalized.contains(rule.keyword.as_str()))
            {
                trace!(tx_type, keyword = %rule.keyword, category = %rule.category, "Keyword match");
                return rule.category;
            }
        }

        classify_by_shape(assets, counterparty)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(CategoryRules::default())
    }
}

/// Asset-shape heuristics for generic or unmatched types:
/// - one movement, no counterparty: TRANSFER
/// - opposite-direction movements with a counterparty: SWAP
/// - anything else: OTHER
fn classify_by_shape(assets: &[ParsedAsset], counterparty: bool) -> Category {
    let has_in = assets.iter().any(|a| a.direction == Direction::In);
    let has_out = assets.iter().any(|a| a.direction == Direction::Out);

    match (assets.len(), counterparty) {
        (1, false) => Category::Transfer,
        (n, true) if n >= 2 && has_in && has_out => Category::Swap,
        _ => Category::Other,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
