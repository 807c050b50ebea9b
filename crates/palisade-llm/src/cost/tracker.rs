//! Usage tracker
//!
//! Bounded in-memory accounting of completed calls. The tracker keeps a
//! global rolling log capped at [`MAX_RECORDS`] entries (FIFO eviction
//! from the front, append order preserved) plus an unbounded per-session
//! list. It uses its own lock so recording completed usage never contends
//! with admission checks in the rate limiter.
//!
//! Aggregation is a linear scan, acceptable under the record cap.

use super::record::{RecentUsage, SessionUsage, TokenUsage, UsageSummary};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Maximum records retained in the global log.
const MAX_RECORDS: usize = 1000;

#[derive(Debug, Default)]
struct TrackerInner {
    records: Vec<TokenUsage>,
    sessions: HashMap<String, Vec<TokenUsage>>,
}

/// Bounded in-memory tracker of exact token and cost usage.
///
/// Construct one per process at the composition root and share it by
/// reference; there is no global instance.
#[derive(Debug, Default)]
pub struct UsageTracker {
    inner: RwLock<TrackerInner>,
}

impl UsageTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed call.
    ///
    /// `total` defaults to `prompt + completion` when not supplied. When
    /// `session_id` is given the record is also appended to that
    /// session's list.
    pub async fn record_usage(
        &self,
        prompt_tokens: u64,
        completion_tokens: u64,
        total: Option<u64>,
        cost: f64,
        session_id: Option<&str>,
    ) -> TokenUsage {
        self.record_usage_at(
            prompt_tokens,
            completion_tokens,
            total,
            cost,
            session_id,
            Utc::now(),
        )
        .await
    }

    /// Record a completed call with an explicit timestamp.
    ///
    /// Intended for backfill and replay; timestamps are expected to be
    /// non-decreasing across calls.
    pub async fn record_usage_at(
        &self,
        prompt_tokens: u64,
        completion_tokens: u64,
        total: Option<u64>,
        cost: f64,
        session_id: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> TokenUsage {
        let record = TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: total.unwrap_or(prompt_tokens + completion_tokens),
            cost,
            timestamp,
        };

        let mut inner = self.inner.write().await;
        inner.records.push(record.clone());
        if inner.records.len() > MAX_RECORDS {
            let excess = inner.records.len() - MAX_RECORDS;
            inner.records.drain(0..excess);
            debug!(evicted = excess, "usage log at capacity, dropped oldest records");
        }

        if let Some(id) = session_id {
            inner
                .sessions
                .entry(id.to_string())
                .or_default()
                .push(record.clone());
        }

        record
    }

    /// Aggregate usage for a session.
    ///
    /// Unknown sessions yield a zeroed aggregate, not an error.
    pub async fn get_session_usage(&self, session_id: &str) -> SessionUsage {
        let inner = self.inner.read().await;
        let Some(records) = inner.sessions.get(session_id) else {
            return SessionUsage::empty(session_id);
        };

        let mut usage = SessionUsage::empty(session_id);
        for record in records {
            usage.request_count += 1;
            usage.prompt_tokens += record.prompt_tokens;
            usage.completion_tokens += record.completion_tokens;
            usage.total_tokens += record.total_tokens;
            usage.cost += record.cost;
        }
        usage
    }

    /// Aggregate usage over the trailing `hours` of the global log.
    ///
    /// Sums exactly the records with `timestamp > now - hours`; an empty
    /// window yields zeros.
    pub async fn get_recent_usage(&self, hours: i64) -> RecentUsage {
        let cutoff = Utc::now() - Duration::hours(hours);
        let inner = self.inner.read().await;

        let mut usage = RecentUsage {
            window_hours: hours,
            ..Default::default()
        };
        for record in inner.records.iter().filter(|r| r.timestamp > cutoff) {
            usage.request_count += 1;
            usage.prompt_tokens += record.prompt_tokens;
            usage.completion_tokens += record.completion_tokens;
            usage.total_tokens += record.total_tokens;
            usage.cost += record.cost;
        }
        if usage.request_count > 0 {
            usage.avg_tokens_per_request = usage.total_tokens as f64 / usage.request_count as f64;
        }
        usage
    }

    /// Snapshot of the whole tracker.
    pub async fn get_stats(&self) -> UsageSummary {
        let inner = self.inner.read().await;
        UsageSummary {
            tracked_records: inner.records.len(),
            total_tokens: inner.records.iter().map(|r| r.total_tokens).sum(),
            total_cost: inner.records.iter().map(|r| r.cost).sum(),
            active_sessions: inner.sessions.len(),
        }
    }
}
