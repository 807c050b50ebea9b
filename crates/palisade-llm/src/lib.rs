//! Palisade LLM - Provider-facing failure and usage accounting
//!
//! This crate holds the pieces of the resilience layer that face the
//! upstream provider rather than the admission engine:
//! - Error: failure type surfaced by a unit of work against the provider
//! - Classify: pure mapping of failures to retry classes
//! - Cost: per-model pricing and exact token/cost usage tracking

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod classify;
pub mod cost;
pub mod error;

pub use classify::{classify_failure, Classify, ErrorClass};
pub use cost::{
    default_pricing, ModelPricing, PricingTable, RecentUsage, SessionUsage, TokenUsage,
    UsageSummary, UsageTracker,
};
pub use error::{Error, Result};
