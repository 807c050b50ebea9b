//! Cost and usage accounting for LLM API calls
//!
//! # Module Structure
//!
//! - `pricing`: per-model pricing table and cost calculation
//! - `record`: usage records and aggregate types
//! - `tracker`: bounded in-memory usage tracker

mod pricing;
mod record;
mod tracker;


pub use pricing::{
    default_pricing, ModelPricing, PricingTable, DEFAULT_INPUT_COST_PER_1K,
    DEFAULT_OUTPUT_COST_PER_1K,
};
pub use record::{RecentUsage, SessionUsage, TokenUsage, UsageSummary};
pub use tracker::UsageTracker;
