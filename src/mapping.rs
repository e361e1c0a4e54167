//! Platform mapping snapshot.
//!
//! Contract-address table, ordered regex pattern rules and per-chain
//! default labels, loaded from `platform_mapping.toml`. A snapshot is
//! immutable once built; the `with_*` methods consume it and return a new
//! one, so a batch holding `&PlatformMapping` can never see a change.

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use tracing::info;

use crate::types::{normalize_address, Chain, EnrichError};

// ---------------------------------------------------------------------------
// File format
// ---------------------------------------------------------------------------

/// On-disk shape of the mapping file. `contracts` and `patterns` are
/// required tables; an absent table is a structural error.
#[derive(Debug, Clone, Deserialize)]
pub struct MappingFile {
    pub contracts: Vec<ContractEntry>,
    pub patterns: Vec<PatternEntry>,
    #[serde(default)]
    pub chain_defaults: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractEntry {
    pub chain: String,
    pub address: String,
    pub platform: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatternEntry {
    pub pattern: String,
    pub platform: String,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct PatternRule {
    regex: Regex,
    platform: String,
}

/// Immutable platform-attribution tables.
#[derive(Debug, Clone, Default)]
pub struct PlatformMapping {
    contracts: HashMap<(Chain, String), String>,
    patterns: Vec<PatternRule>,
    chain_defaults: HashMap<Chain, String>,
}

impl PlatformMapping {
    /// A mapping with no rules at all (every record falls to "Unknown").
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load and validate a mapping file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read mapping file: {path}"))?;
        let mapping = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to load mapping file: {path}"))?;
        info!(
            path,
            contracts = mapping.contract_count(),
            patterns = mapping.pattern_count(),
            chain_defaults = mapping.chain_defaults.len(),
            "Platform mapping loaded"
        );
        Ok(mapping)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, EnrichError> {
        let file: MappingFile =
            toml::from_str(contents).map_err(|e| EnrichError::InvalidMapping(e.to_string()))?;
        Self::from_file(file)
    }

    /// Validate every entry up front; nothing is processed against a
    /// half-valid mapping.
    pub fn from_file(file: MappingFile) -> Result<Self, EnrichError> {
        let mut mapping = Self::empty();
        for entry in file.contracts {
            let chain: Chain = entry.chain.parse()?;
            mapping = mapping.with_contract(chain, &entry.address, &entry.platform)?;
        }
        for entry in file.patterns {
            mapping = mapping.with_pattern(&entry.pattern, &entry.platform)?;
        }
        for (chain, platform) in file.chain_defaults {
            let chain: Chain = chain.parse()?;
            mapping = mapping.with_chain_default(chain, &platform)?;
        }
        Ok(mapping)
    }

    /// New snapshot with one more contract entry. Mapping a known contract
    /// to a different platform is an error; see [`Self::replace_contract`].
    pub fn with_contract(
        mut self,
        chain: Chain,
        address: &str,
        platform: &str,
    ) -> Result<Self, EnrichError> {
        let (key, platform) = contract_entry(chain, address, platform)?;
        if let Some(existing) = self.contracts.get(&(chain, key.clone())) {
            if *existing != platform {
                return Err(EnrichError::InvalidMapping(format!(
                    "{chain} contract {key} mapped to both {existing} and {platform}"
                )));
            }
        }
        self.contracts.insert((chain, key), platform);
        Ok(self)
    }

    /// New snapshot with the contract pointed at `platform`, overwriting any
    /// earlier attribution.
    pub fn replace_contract(
        mut self,
        chain: Chain,
        address: &str,
        platform: &str,
    ) -> Result<Self, EnrichError> {
        let (key, platform) = contract_entry(chain, address, platform)?;
        if let Some(previous) = self.contracts.insert((chain, key.clone()), platform.clone()) {
            if previous != platform {
                info!(chain = %chain, contract = %key, from = %previous, to = %platform, "Contract re-attributed");
            }
        }
        Ok(self)
    }

    /// New snapshot with a pattern rule appended (lowest priority).
    pub fn with_pattern(mut self, pattern: &str, platform: &str) -> Result<Self, EnrichError> {
        let platform = validated_platform(platform)?;
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| EnrichError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        self.patterns.push(PatternRule { regex, platform });
        Ok(self)
    }

    /// New snapshot with the fallback label for `chain` set.
    pub fn with_chain_default(mut self, chain: Chain, platform: &str) -> Result<Self, EnrichError> {
        let platform = validated_platform(platform)?;
        self.chain_defaults.insert(chain, platform);
        Ok(self)
    }

    /// Exact lookup; hex addresses compare case-insensitively, base58 exactly.
    pub fn contract_platform(&self, chain: Chain, address: &str) -> Option<&str> {
        self.contracts
            .get(&(chain, normalize_address(address)))
            .map(String::as_str)
    }

    /// First rule (in declaration order) matching the lower-cased text.
    pub fn pattern_platform(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.patterns
            .iter()
            .find(|rule| rule.regex.is_match(&lowered))
            .map(|rule| rule.platform.as_str())
    }

    pub fn chain_default(&self, chain: Chain) -> Option<&str> {
        self.chain_defaults.get(&chain).map(String::as_str)
    }

    pub fn contract_count(&self) -> usize {
        self.contracts.len()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

/// Normalised `(address, platform)` for a contract row.
fn contract_entry(
    chain: Chain,
    address: &str,
    platform: &str,
) -> Result<(String, String), EnrichError> {
    let platform = validated_platform(platform)?;
    let key = normalize_address(address);
    if key.is_empty() {
        return Err(EnrichError::InvalidMapping(format!(
            "empty contract address for {platform} on {chain}"
        )));
    }
    Ok((key, platform))
}

fn validated_platform(platform: &str) -> Result<String, EnrichError> {
    let trimmed = platform.trim();
    if trimmed.is_empty() {
        return Err(EnrichError::InvalidMapping("empty platform name".into()));
    }
    Ok(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
