//! Integration tests for the enrichment pipeline.

mod mock_prices;
mod pipeline;
