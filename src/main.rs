//! TXLENS: per-chain transaction enrichment
//!
//! Entry point. Loads configuration, initialises structured logging, then
//! runs one batch: load raw records and the platform mapping, enhance,
//! upsert into the enriched store, save, and report on data quality.

use anyhow::Result;
use tracing::info;

use txlens::config::AppConfig;
use txlens::engine::analyzer::{analyze_unclear, EnhancementSummary};
use txlens::engine::enhancer::Enhancer;
use txlens::mapping::PlatformMapping;
use txlens::pricing::StaticPriceSource;
use txlens::source;
use txlens::storage;

const BANNER: &str = r#"
 _______  __   __  _      _____  _   _  _____
|__   __| \ \ / / | |    |  ___|| \ | |/ ____|
   | |     \ V /  | |    | |__  |  \| | (___
   | |      > <   | |    |  __| | . ` |\___ \
   | |     / . \  | |____| |___ | |\  |____) |
   |_|    /_/ \_\ |______|_____||_| \_|_____/

  Chain transaction enrichment
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = AppConfig::resolve_path();
    let cfg = AppConfig::load(&config_path)?;

    init_logging();

    println!("{BANNER}");
    info!(
        config = %config_path,
        raw_records = %cfg.paths.raw_records,
        store = %cfg.paths.store,
        mapping = %cfg.paths.mapping,
        "TXLENS starting up"
    );

    // A structurally invalid mapping is rejected before any record is touched.
    let mapping = PlatformMapping::load(&cfg.paths.mapping)?;
    let prices = StaticPriceSource::from_config(&cfg.pricing);
    let enhancer = Enhancer::new(cfg.category_rules());

    let raw = source::load_raw_records(&cfg.paths.raw_records)?;
    let mut store = storage::load_store(Some(&cfg.paths.store))?;

    let enriched = enhancer.enhance(&raw, &mapping, &prices).await;
    let stats = store.upsert(enriched);
    storage::save_store(&store, Some(&cfg.paths.store))?;

    info!(
        inserted = stats.inserted,
        replaced = stats.replaced,
        stored = store.len(),
        "Enriched store updated"
    );

    EnhancementSummary::from_records(store.records()).log();
    analyze_unclear(store.records()).log();

    info!("TXLENS run complete.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("txlens=info"));

    let json_logging = std::env::var("TXLENS_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
