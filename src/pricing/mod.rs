//! USD price sources.
//!
//! The enhancer never fetches prices itself; it is handed a [`PriceSource`]
//! and asks it for `price(symbol, at)`. `Ok(None)` means "no price right
//! now", `Err` means the lookup itself broke. Both leave the record
//! unpriced; neither aborts a batch.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use crate::config::PricingConfig;

/// Abstraction over whatever supplies historical USD prices.
///
/// Implementations must be safe to call concurrently for distinct symbols.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// USD price of one unit of `symbol` at `at`.
    async fn price(&self, symbol: &str, at: DateTime<Utc>) -> Result<Option<Decimal>>;
}

// ---------------------------------------------------------------------------
// Closure adapter
// ---------------------------------------------------------------------------

/// Wraps a plain synchronous function as a [`PriceSource`].
pub struct PriceFn<F>(pub F);

#[async_trait]
impl<F> PriceSource for PriceFn<F>
where
    F: Fn(&str, DateTime<Utc>) -> Option<Decimal> + Send + Sync,
{
    async fn price(&self, symbol: &str, at: DateTime<Utc>) -> Result<Option<Decimal>> {
        Ok((self.0)(symbol, at))
    }
}

// ---------------------------------------------------------------------------
// Static table
// ---------------------------------------------------------------------------

/// Fixed USD table from `config.toml`, ignoring the timestamp.
///
/// Wrapped and bridged tickers resolve through `aliases` first
/// (`WETH` → `ETH`, `USDC.E` → `USDC`).
#[derive(Debug, Clone, Default)]
pub struct StaticPriceSource {
    usd: HashMap<String, Decimal>,
    aliases: HashMap<String, String>,
}

impl StaticPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &PricingConfig) -> Self {
        let mut source = Self::new();
        for (symbol, price) in &config.usd {
            source = source.with_price(symbol, *price);
        }
        for (alias, target) in &config.aliases {
            source = source.with_alias(alias, target);
        }
        debug!(
            symbols = source.usd.len(),
            aliases = source.aliases.len(),
            "Static price table built"
        );
        source
    }

    pub fn with_price(mut self, symbol: &str, usd: Decimal) -> Self {
        self.usd.insert(symbol.trim().to_uppercase(), usd);
        self
    }

    pub fn with_alias(mut self, alias: &str, target: &str) -> Self {
        self.aliases
            .insert(alias.trim().to_uppercase(), target.trim().to_uppercase());
        self
    }

    /// Canonical ticker after alias resolution (one hop).
    pub fn resolve(&self, symbol: &str) -> String {
        let upper = symbol.trim().to_uppercase();
        self.aliases.get(&upper).cloned().unwrap_or(upper)
    }

    pub fn lookup(&self, symbol: &str) -> Option<Decimal> {
        self.usd.get(&self.resolve(symbol)).copied()
    }

    pub fn len(&self) -> usize {
        self.usd.len()
    }

    pub fn is_empty(&self) -> bool {
        self.usd.is_empty()
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    async fn price(&self, symbol: &str, _at: DateTime<Utc>) -> Result<Option<Decimal>> {
        Ok(self.lookup(symbol))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
