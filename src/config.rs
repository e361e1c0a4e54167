//! Configuration loading from TOML.
//!
//! Reads `config.toml` (or the file named by `TXLENS_CONFIG`) and
//! deserializes it into strongly-typed structs.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;

use crate::engine::classifier::CategoryRules;

/// Environment variable overriding the config file path.
pub const CONFIG_PATH_ENV: &str = "TXLENS_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub paths: PathsConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    /// Replaces the built-in keyword table when present.
    #[serde(default)]
    pub classifier: Option<CategoryRules>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Raw records, JSON array or JSON Lines.
    pub raw_records: String,
    /// Enriched-record store (JSON).
    pub store: String,
    /// Platform mapping (TOML).
    pub mapping: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PricingConfig {
    /// Symbol → USD price, written as strings ("3.10") to stay exact.
    #[serde(default)]
    pub usd: BTreeMap<String, Decimal>,
    /// Symbol → canonical symbol.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Config path from `TXLENS_CONFIG`, else `config.toml`.
    pub fn resolve_path() -> String {
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    /// The classifier table to inject: configured rules or the built-in default.
    pub fn category_rules(&self) -> CategoryRules {
        self.classifier.clone().unwrap_or_default()
    }
}
