//! End-to-end pipeline tests: raw records through enhancement, the
//! enriched store and the unclear-transaction analyzer.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

use txlens::engine::analyzer::analyze_unclear;
use txlens::engine::classifier::CategoryRules;
use txlens::engine::enhancer::Enhancer;
use txlens::mapping::PlatformMapping;
use txlens::storage::{self, EnrichedStore};
use txlens::types::*;

use crate::mock_prices::MockPriceSource;

const AERO_ROUTER: &str = "0xcF77a3Ba9A5CA399B7c97c74d54e5b1Beb874E43";

fn ts() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// No BASE default, so unattributed BASE records stay "Unknown".
fn mapping() -> PlatformMapping {
    PlatformMapping::from_toml_str(
        r#"
        [[contracts]]
        chain = "base"
        address = "0xcF77a3Ba9A5CA399B7c97c74d54e5b1Beb874E43"
        platform = "Aerodrome"

        [[patterns]]
        pattern = "cetus"
        platform = "Cetus"

        [[patterns]]
        pattern = "uniswap"
        platform = "Uniswap"

        [chain_defaults]
        sol = "DEX"
        "#,
    )
    .unwrap()
}

fn prices() -> MockPriceSource {
    MockPriceSource::new()
        .with_price("SUI", dec!(3))
        .with_price("USDC", dec!(1))
        .with_price("ETH", dec!(3500))
}

fn enhancer() -> Enhancer {
    Enhancer::new(CategoryRules::default())
}

fn sui_swap(tx: &str) -> RawTransactionRecord {
    RawTransactionRecord::new(Chain::Sui, "0xwallet", tx, ts())
        .with_type("execute")
        .with_asset("-904.000000003SUI,2647.652454USDC")
        .with_interaction("0x8093d002...(Cetus Aggregator)")
        .with_gas_fee(dec!(0.003411))
}

fn temp_path() -> String {
    let mut p = std::env::temp_dir();
    p.push(format!("txlens_it_store_{}.json", uuid::Uuid::new_v4()));
    p.to_string_lossy().to_string()
}

// -- Core properties ------------------------------------------------------

#[tokio::test]
async fn test_enhancement_is_idempotent() {
    let batch = vec![
        sui_swap("0xa"),
        RawTransactionRecord::new(Chain::Base, "0xw", "0xb", ts())
            .with_type("Add Liquidity")
            .with_asset("-0.5ETH,-1750USDC")
            .with_interaction(AERO_ROUTER),
        RawTransactionRecord::new(Chain::Sol, "Wallet1", "Sig1", ts()),
    ];
    let e = enhancer();
    let first = e.enhance(&batch, &mapping(), &prices()).await;
    let second = e.enhance(&batch, &mapping(), &prices()).await;

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn test_output_order_ignores_lookup_completion_order() {
    // The first record's symbol answers last.
    let source = MockPriceSource::new()
        .with_price("SLOW", dec!(1))
        .with_price("FAST", dec!(2))
        .with_delay("SLOW", Duration::from_millis(30));

    let batch: Vec<RawTransactionRecord> = ["1SLOW", "1FAST", "2SLOW", "2FAST"]
        .iter()
        .enumerate()
        .map(|(i, asset)| {
            RawTransactionRecord::new(Chain::Eth, "0xw", format!("0x{i:02}"), ts())
                .with_type("Receive")
                .with_asset(*asset)
        })
        .collect();

    let out = enhancer().enhance(&batch, &mapping(), &source).await;
    let expected: Vec<String> = batch.iter().map(|r| r.identity()).collect();
    let actual: Vec<String> = out.iter().map(|r| r.id.clone()).collect();
    assert_eq!(actual, expected);
    assert_eq!(out[0].total_usd_value, Some(dec!(1)));
    assert_eq!(out[3].total_usd_value, Some(dec!(4)));
}

#[tokio::test]
async fn test_contract_beats_pattern() {
    let raw = RawTransactionRecord::new(Chain::Base, "0xw", "0xc", ts())
        .with_type("swap")
        .with_asset("-1ETH,3500USDC")
        .with_interaction(format!("Uniswap Universal Router via {}", AERO_ROUTER.to_lowercase()));
    let out = enhancer().enhance(&[raw], &mapping(), &prices()).await;
    assert_eq!(out[0].platform, "Aerodrome");
    assert_eq!(out[0].detection_method, DetectionMethod::ContractMatch);
}

#[tokio::test]
async fn test_missing_price_gives_null_total() {
    let raw = RawTransactionRecord::new(Chain::Sui, "0xw", "0xd", ts())
        .with_type("swap")
        .with_asset("-10SUI,+5NOPRICE")
        .with_interaction("Cetus");
    let out = enhancer().enhance(&[raw], &mapping(), &prices()).await;
    assert_eq!(out[0].assets.len(), 2);
    assert_eq!(out[0].total_usd_value, None);
    assert_ne!(out[0].validation_status, ValidationStatus::Verified);
}

#[tokio::test]
async fn test_lookup_failure_does_not_abort_batch() {
    let source = prices();
    source.fail_symbol("SUI");

    let usdc = RawTransactionRecord::new(Chain::Sui, "0xw", "0xe", ts())
        .with_type("Receive")
        .with_asset("25USDC");
    let out = enhancer()
        .enhance(&[sui_swap("0xa"), usdc], &mapping(), &source)
        .await;

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].total_usd_value, None);
    assert_eq!(out[0].validation_status, ValidationStatus::Processed);
    assert_eq!(out[1].total_usd_value, Some(dec!(25)));
}

#[tokio::test]
async fn test_each_symbol_time_looked_up_once() {
    let source = prices();
    let later = ts() + ChronoDuration::hours(1);
    let batch = vec![
        sui_swap("0xa"),
        sui_swap("0xb"),
        RawTransactionRecord::new(Chain::Sui, "0xwallet", "0xc", later)
            .with_type("Send")
            .with_asset("-1SUI"),
    ];
    enhancer().enhance(&batch, &mapping(), &source).await;

    assert_eq!(source.call_count("SUI"), 2);
    assert_eq!(source.call_count("USDC"), 1);
    assert_eq!(source.calls().len(), 3);
}

// -- Scenarios ------------------------------------------------------------

#[tokio::test]
async fn test_sui_asset_string_parsed_in_order() {
    let out = enhancer().enhance(&[sui_swap("0xa")], &mapping(), &prices()).await;
    assert_eq!(
        out[0].assets,
        vec![
            ParsedAsset::new(dec!(904.000000003), "SUI", Direction::Out),
            ParsedAsset::new(dec!(2647.652454), "USDC", Direction::In),
        ]
    );
}

#[tokio::test]
async fn test_truncated_address_falls_to_pattern() {
    let out = enhancer().enhance(&[sui_swap("0xa")], &mapping(), &prices()).await;
    assert_eq!(out[0].platform, "Cetus");
    assert_eq!(out[0].detection_method, DetectionMethod::PatternMatch);
    assert_eq!(out[0].category, Category::Swap);
    assert_eq!(out[0].validation_status, ValidationStatus::Verified);
}

#[tokio::test]
async fn test_failed_execute_without_assets_is_retained() {
    let raw = RawTransactionRecord::new(Chain::Base, "0xw", "0xfailed", ts())
        .with_type("execute")
        .with_status(TxStatus::Failed);
    let out = enhancer().enhance(&[raw.clone()], &mapping(), &prices()).await;

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, raw.identity());
    assert_eq!(out[0].category, Category::Other);
    assert_eq!(out[0].validation_status, ValidationStatus::Unverified);
    assert_eq!(out[0].raw.status, TxStatus::Failed);

    let report = analyze_unclear(&out);
    assert_eq!(report.ids(DefectReason::FailedTx), &[raw.identity()]);
    assert_eq!(report.count(DefectReason::MissingAmount), 1);
    assert_eq!(report.count(DefectReason::UnknownPlatform), 1);
}

#[tokio::test]
async fn test_unknown_platform_share_over_enhanced_set() {
    let unknown = (0..1006).map(|i| {
        RawTransactionRecord::new(Chain::Eth, "0xw", format!("0xu{i}"), ts())
            .with_type("Send")
            .with_asset("-1USDC")
            .with_interaction("0x0000000000000000000000000000000000000001")
    });
    let known = (0..1155).map(|i| sui_swap(&format!("0xk{i}")));
    let batch: Vec<RawTransactionRecord> = unknown.chain(known).collect();

    let out = enhancer().enhance(&batch, &mapping(), &prices()).await;
    assert_eq!(out.len(), 2161);

    let report = analyze_unclear(&out);
    assert_eq!(report.count(DefectReason::UnknownPlatform), 1006);
    assert_eq!(report.percentage(DefectReason::UnknownPlatform), dec!(46.6));
}

// -- Store ----------------------------------------------------------------

#[tokio::test]
async fn test_reenhancement_overwrites_by_identity() {
    let path = temp_path();
    let batch = vec![
        RawTransactionRecord::new(Chain::Sui, "0xwallet", "0xa", ts())
            .with_type("execute")
            .with_asset("-1SUI,3USDC")
            .with_interaction("Turbos Finance"),
        sui_swap("0xb"),
    ];

    let e = enhancer();
    let mut store = storage::load_store(Some(&path)).unwrap();
    store.upsert(e.enhance(&batch, &mapping(), &prices()).await);
    storage::save_store(&store, Some(&path)).unwrap();
    assert!(store.records()[0].is_unknown_platform());

    // New snapshot with one more rule; the old one is untouched.
    let before = mapping();
    let updated = before.clone().with_pattern("turbos", "Turbos").unwrap();
    assert_eq!(before.pattern_count() + 1, updated.pattern_count());

    let mut store = storage::load_store(Some(&path)).unwrap();
    let stats = store.upsert(e.enhance(&batch, &updated, &prices()).await);
    storage::save_store(&store, Some(&path)).unwrap();

    assert_eq!(stats.inserted, 0);
    assert_eq!(stats.replaced, 2);

    let reloaded = storage::load_store(Some(&path)).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.records()[0].platform, "Turbos");
    assert_eq!(reloaded.records()[1].platform, "Cetus");
    assert_eq!(reloaded.records()[1].raw.gas_fee, Some(dec!(0.003411)));

    storage::delete_store(Some(&path)).unwrap();
}

#[tokio::test]
async fn test_repeated_runs_never_duplicate() {
    let e = enhancer();
    let batch = vec![sui_swap("0xa"), sui_swap("0xb")];
    let mut store = EnrichedStore::new();
    for _ in 0..3 {
        store.upsert(e.enhance(&batch, &mapping(), &prices()).await);
    }
    assert_eq!(store.len(), 2);

    let total: Decimal = store.records().iter().filter_map(|r| r.total_usd_value).sum();
    assert_eq!(total, dec!(10719.304908018));
}

#[tokio::test]
async fn test_corrected_contract_reattributes_stored_record() {
    let raw = RawTransactionRecord::new(Chain::Base, "0xw", "0xc", ts())
        .with_type("swap")
        .with_asset("-1ETH,3500USDC")
        .with_interaction(AERO_ROUTER);

    let e = enhancer();
    let mut store = EnrichedStore::new();
    store.upsert(e.enhance(&[raw.clone()], &mapping(), &prices()).await);
    assert_eq!(store.records()[0].platform, "Aerodrome");

    let corrected = mapping()
        .replace_contract(Chain::Base, AERO_ROUTER, "Aerodrome Slipstream")
        .unwrap();
    let stats = store.upsert(e.enhance(&[raw], &corrected, &prices()).await);

    assert_eq!(stats.replaced, 1);
    assert_eq!(store.len(), 1);
    assert_eq!(store.records()[0].platform, "Aerodrome Slipstream");
    assert_eq!(store.records()[0].detection_method, DetectionMethod::ContractMatch);
}
