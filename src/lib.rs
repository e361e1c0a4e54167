//! TXLENS: per-chain transaction enrichment
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod mapping;
pub mod engine;
pub mod pricing;
pub mod source;
pub mod storage;

pub use engine::analyzer::{analyze_unclear, DefectReport, EnhancementSummary};
pub use engine::enhancer::{enhance, Enhancer};
pub use mapping::PlatformMapping;
pub use pricing::{PriceFn, PriceSource, StaticPriceSource};
