//! Palisade Core - Admission control and retry engine
//!
//! This crate sits between an application and a rate-limited, token-metered
//! upstream API and decides when calls may be dispatched:
//! - Config: sliding-window budgets, backoff shape, stabilization period
//! - Limiter: four simultaneous sliding windows plus cooldown bookkeeping
//! - Retry: admission-check / dispatch / classify-and-backoff loop
//!
//! The limiter and the usage tracker (in `palisade-llm`) are the only
//! shared mutable resources; construct one of each at the composition root
//! and pass them by reference. There are no process globals.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod limiter;
pub mod retry;

pub use config::{ConfigError, RateLimitConfig};
pub use limiter::{AdmissionDecision, DenyReason, RateLimiter, UsageStats};
pub use retry::{execute_with_limits, RetryExhausted};
