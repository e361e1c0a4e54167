//! Enrichment engine: parse → detect → classify → value, then analyze.

pub mod parser;
pub mod detector;
pub mod classifier;
pub mod enhancer;
pub mod analyzer;
