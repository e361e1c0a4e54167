//! Mock price source for integration testing.
//!
//! Deterministic, in-memory `PriceSource` that records every lookup,
//! can be told to fail for chosen symbols, and can delay chosen symbols
//! to scramble completion order.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use txlens::pricing::PriceSource;

#[derive(Clone, Default)]
pub struct MockPriceSource {
    prices: HashMap<String, Decimal>,
    delays: HashMap<String, Duration>,
    failing: Arc<Mutex<HashSet<String>>>,
    calls: Arc<Mutex<Vec<(String, DateTime<Utc>)>>>,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, symbol: &str, usd: Decimal) -> Self {
        self.prices.insert(symbol.to_string(), usd);
        self
    }

    /// Hold the lookup for `symbol` before answering.
    pub fn with_delay(mut self, symbol: &str, delay: Duration) -> Self {
        self.delays.insert(symbol.to_string(), delay);
        self
    }

    /// Make every lookup for `symbol` return an error.
    pub fn fail_symbol(&self, symbol: &str) {
        self.failing.lock().unwrap().insert(symbol.to_string());
    }

    pub fn calls(&self) -> Vec<(String, DateTime<Utc>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, symbol: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s == symbol)
            .count()
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn price(&self, symbol: &str, at: DateTime<Utc>) -> Result<Option<Decimal>> {
        self.calls.lock().unwrap().push((symbol.to_string(), at));

        if let Some(delay) = self.delays.get(symbol) {
            tokio::time::sleep(*delay).await;
        }

        if self.failing.lock().unwrap().contains(symbol) {
            return Err(anyhow!("price feed unavailable for {symbol}"));
        }

        Ok(self.prices.get(symbol).copied())
    }
}
