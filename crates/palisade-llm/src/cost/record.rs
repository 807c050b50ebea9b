//! Usage records and aggregates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exact usage of one completed call. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens consumed
    pub prompt_tokens: u64,
    /// Completion tokens produced
    pub completion_tokens: u64,
    /// Total tokens billed
    pub total_tokens: u64,
    /// Cost in USD
    pub cost: f64,
    /// When the call completed
    pub timestamp: DateTime<Utc>,
}

/// Aggregate usage for one logical session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionUsage {
    /// Session identifier
    pub session_id: String,
    /// Calls recorded against the session
    pub request_count: u64,
    /// Total prompt tokens
    pub prompt_tokens: u64,
    /// Total completion tokens
    pub completion_tokens: u64,
    /// Total tokens
    pub total_tokens: u64,
    /// Total cost in USD
    pub cost: f64,
}

impl SessionUsage {
    /// Zeroed aggregate for an unknown session.
    #[must_use]
    pub fn empty(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            ..Default::default()
        }
    }
}

/// Aggregate usage over a trailing window of the global log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecentUsage {
    /// Window width in hours
    pub window_hours: i64,
    /// Calls inside the window
    pub request_count: u64,
    /// Total prompt tokens
    pub prompt_tokens: u64,
    /// Total completion tokens
    pub completion_tokens: u64,
    /// Total tokens
    pub total_tokens: u64,
    /// Total cost in USD
    pub cost: f64,
    /// Mean total tokens per call, 0.0 when the window is empty
    pub avg_tokens_per_request: f64,
}

/// Whole-tracker snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageSummary {
    /// Records currently retained in the global log
    pub tracked_records: usize,
    /// Total tokens across retained records
    pub total_tokens: u64,
    /// Total cost across retained records (USD)
    pub total_cost: f64,
    /// Sessions with at least one record
    pub active_sessions: usize,
}
