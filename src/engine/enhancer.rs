//! Enhancement pipeline.
//!
//! Raw record → parse assets → detect platform → classify → value, one
//! enriched record out per record in, input order preserved. Prices are
//! looked up once per distinct `(symbol, timestamp)` across the whole batch,
//! concurrently, then re-associated by key so completion order never leaks
//! into the output.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

use crate::engine::classifier::{CategoryRules, Classifier};
use crate::engine::detector::{Detection, PlatformDetector};
use crate::engine::parser::parse_asset_strings;
use crate::mapping::PlatformMapping;
use crate::pricing::PriceSource;
use crate::types::{
    Category, DetectionMethod, EnrichedTransactionRecord, ParsedAsset, RawTransactionRecord,
    ValidationStatus,
};

type PriceKey = (String, DateTime<Utc>);

/// Resolved prices for one batch. `None` covers both "unavailable" and
/// "lookup failed".
type PriceTable = HashMap<PriceKey, Option<Decimal>>;

// ---------------------------------------------------------------------------
// Enhancer
// ---------------------------------------------------------------------------

/// Holds the detector and the injected classifier table.
/// Stateless across batches; the mapping and price source are passed per call.
#[derive(Debug, Clone)]
pub struct Enhancer {
    detector: PlatformDetector,
    classifier: Classifier,
}

impl Enhancer {
    pub fn new(rules: CategoryRules) -> Self {
        Self {
            detector: PlatformDetector::new(),
            classifier: Classifier::new(rules),
        }
    }

    /// Enhance a batch against one mapping snapshot.
    ///
    /// Never fails and never drops a record: unparseable input and price
    /// failures show up in each record's fields and validation status.
    pub async fn enhance(
        &self,
        batch: &[RawTransactionRecord],
        mapping: &PlatformMapping,
        prices: &dyn PriceSource,
    ) -> Vec<EnrichedTransactionRecord> {
        info!(count = batch.len(), "Starting batch enhancement");

        let parsed: Vec<Vec<ParsedAsset>> = batch
            .iter()
            .map(|raw| {
                if raw.is_malformed() {
                    Vec::new()
                } else {
                    parse_asset_strings(&raw.raw_assets)
                }
            })
            .collect();

        let table = resolve_prices(batch, &parsed, prices).await;

        let records: Vec<EnrichedTransactionRecord> = batch
            .iter()
            .zip(parsed)
            .map(|(raw, assets)| self.enhance_one(raw, assets, mapping, &table))
            .collect();

        let verified = records
            .iter()
            .filter(|r| r.validation_status == ValidationStatus::Verified)
            .count();
        let unknown = records.iter().filter(|r| r.is_unknown_platform()).count();
        info!(
            enhanced = records.len(),
            verified,
            unknown,
            lookups = table.len(),
            "Batch enhancement complete"
        );

        records
    }

    fn enhance_one(
        &self,
        raw: &RawTransactionRecord,
        assets: Vec<ParsedAsset>,
        mapping: &PlatformMapping,
        table: &PriceTable,
    ) -> EnrichedTransactionRecord {
        let id = raw.identity();

        if raw.is_malformed() {
            debug!(id = %id, tx = %raw, "Malformed record, emitting as unknown");
            return EnrichedTransactionRecord {
                id,
                raw: raw.clone(),
                assets,
                total_usd_value: None,
                platform: Detection::unknown().platform,
                candidate_platforms: Vec::new(),
                category: Category::Other,
                validation_status: ValidationStatus::Unverified,
                detection_method: DetectionMethod::None,
            };
        }

        let detection = self.detector.detect(raw.chain, &detection_fields(raw), mapping);
        let category = self
            .classifier
            .classify(&raw.tx_type, &assets, detection.method);
        let valuation = value_assets(&assets, raw.timestamp, table);
        let validation_status = validation_status(&valuation, detection.method);

        let record = EnrichedTransactionRecord {
            id,
            raw: raw.clone(),
            assets,
            total_usd_value: valuation.total,
            platform: detection.platform,
            candidate_platforms: detection.candidates,
            category,
            validation_status,
            detection_method: detection.method,
        };
        debug!(id = %record.id, record = %record, "Record enhanced");
        record
    }
}

/// Enhance `batch` with the built-in classifier table.
pub async fn enhance(
    batch: &[RawTransactionRecord],
    mapping: &PlatformMapping,
    prices: &dyn PriceSource,
) -> Vec<EnrichedTransactionRecord> {
    Enhancer::new(CategoryRules::default())
        .enhance(batch, mapping, prices)
        .await
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Free-text fields searched for a counterparty: interaction columns in
/// export order, then the type string.
fn detection_fields(raw: &RawTransactionRecord) -> Vec<&str> {
    raw.raw_interaction
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(raw.tx_type.as_str()))
        .filter(|field| !field.trim().is_empty())
        .collect()
}

/// Look up every distinct `(symbol, timestamp)` in the batch concurrently.
async fn resolve_prices(
    batch: &[RawTransactionRecord],
    parsed: &[Vec<ParsedAsset>],
    prices: &dyn PriceSource,
) -> PriceTable {
    let keys: Vec<PriceKey> = batch
        .iter()
        .zip(parsed)
        .flat_map(|(raw, assets)| assets.iter().map(|a| (a.symbol.clone(), raw.timestamp)))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let results = join_all(keys.iter().map(|(symbol, at)| async move {
        match prices.price(symbol, *at).await {
            Ok(price) => price,
            Err(e) => {
                warn!(symbol = %symbol, at = %at, error = %e, "Price lookup failed, leaving unpriced");
                None
            }
        }
    }))
    .await;

    keys.into_iter().zip(results).collect()
}

struct Valuation {
    total: Option<Decimal>,
    priced: usize,
}

/// Sum of `amount × price`. Any missing price on a non-empty list makes the
/// total `None`; an empty list is also `None`. A value that overflows
/// `Decimal` counts as unpriced.
fn value_assets(assets: &[ParsedAsset], at: DateTime<Utc>, table: &PriceTable) -> Valuation {
    let values: Vec<Option<Decimal>> = assets
        .iter()
        .map(|asset| {
            let price = table.get(&(asset.symbol.clone(), at)).copied().flatten()?;
            let value = asset.amount.checked_mul(price);
            if value.is_none() {
                warn!(
                    symbol = %asset.symbol,
                    amount = %asset.amount,
                    price = %price,
                    "USD value overflowed, leaving unpriced"
                );
            }
            value
        })
        .collect();

    let priced = values.iter().filter(|v| v.is_some()).count();
    let total = if assets.is_empty() || priced < assets.len() {
        None
    } else {
        let sum = values
            .into_iter()
            .flatten()
            .try_fold(Decimal::ZERO, Decimal::checked_add);
        if sum.is_none() {
            warn!(assets = assets.len(), "USD total overflowed, leaving unpriced");
        }
        sum
    };

    Valuation { total, priced }
}

/// VERIFIED needs a complete total; an overflowed sum is not one.
fn validation_status(valuation: &Valuation, method: DetectionMethod) -> ValidationStatus {
    if valuation.total.is_some() && method != DetectionMethod::None {
        ValidationStatus::Verified
    } else if method == DetectionMethod::None && valuation.priced == 0 {
        ValidationStatus::Unverified
    } else {
        ValidationStatus::Processed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
