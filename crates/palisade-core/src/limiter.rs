//! Sliding-window admission control
//!
//! The limiter tracks four simultaneous trailing windows (requests and
//! tokens, per minute and per hour) plus stabilization bookkeeping after
//! provider rate limit violations. All state lives behind one exclusive
//! lock that is held only across in-memory transitions, never across I/O
//! or sleeps, so critical sections are bounded by window size rather than
//! network latency.
//!
//! Admission is not strictly fair: `can_make_request` and
//! `record_request` are separate lock acquisitions, so under contention
//! several callers can pass a check before any of them records. Admission
//! projects pessimistic *estimated* token counts, which bounds the
//! overshoot; callers wanting strict reservation must serialize the pair
//! themselves.

use crate::config::RateLimitConfig;
use rand::rngs::OsRng;
use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// One admitted event inside a window.
#[derive(Debug, Clone, Copy)]
struct Event {
    at: Instant,
    weight: u64,
}

/// Time-ordered event log summed over a trailing window.
///
/// Events are appended with non-decreasing timestamps, so expired entries
/// always sit at the front and eviction is a pop loop. A running weight
/// sum keeps window totals exact and O(1) to read.
#[derive(Debug)]
struct SlidingWindow {
    duration: Duration,
    events: VecDeque<Event>,
    weight_sum: u64,
}

impl SlidingWindow {
    fn new(duration: Duration) -> Self {
        Self {
            duration,
            events: VecDeque::new(),
            weight_sum: 0,
        }
    }

    fn push(&mut self, now: Instant, weight: u64) {
        self.events.push_back(Event { at: now, weight });
        self.weight_sum += weight;
    }

    /// Drop events strictly older than the window. An event recorded at
    /// exactly `now - duration` is still inside the window.
    fn evict(&mut self, now: Instant) {
        while let Some(event) = self.events.front() {
            if now.duration_since(event.at) > self.duration {
                self.weight_sum -= event.weight;
                self.events.pop_front();
            } else {
                break;
            }
        }
    }

    fn count(&self) -> u64 {
        self.events.len() as u64
    }

    fn weight(&self) -> u64 {
        self.weight_sum
    }
}

/// Mutable limiter state guarded by the limiter's lock.
#[derive(Debug)]
struct RateLimitState {
    requests_minute: SlidingWindow,
    requests_hour: SlidingWindow,
    tokens_minute: SlidingWindow,
    tokens_hour: SlidingWindow,
    consecutive_errors: u32,
    last_rate_limit_error: Option<Instant>,
}

impl RateLimitState {
    fn new() -> Self {
        Self {
            requests_minute: SlidingWindow::new(MINUTE),
            requests_hour: SlidingWindow::new(HOUR),
            tokens_minute: SlidingWindow::new(MINUTE),
            tokens_hour: SlidingWindow::new(HOUR),
            consecutive_errors: 0,
            last_rate_limit_error: None,
        }
    }

    fn cleanup(&mut self, now: Instant) {
        self.requests_minute.evict(now);
        self.requests_hour.evict(now);
        self.tokens_minute.evict(now);
        self.tokens_hour.evict(now);
    }

    fn add_request(&mut self, now: Instant, token_count: u64) {
        self.requests_minute.push(now, 1);
        self.requests_hour.push(now, 1);
        if token_count > 0 {
            self.tokens_minute.push(now, token_count);
            self.tokens_hour.push(now, token_count);
        }
        self.cleanup(now);
    }

    /// Stabilization is derived on every read, never cached. The gate is
    /// strict: exactly `period` after the violation the limiter is open.
    fn in_stabilization(&self, now: Instant, period: Duration) -> bool {
        self.last_rate_limit_error
            .is_some_and(|at| now.duration_since(at) < period)
    }

    fn stabilization_remaining(&self, now: Instant, period: Duration) -> Duration {
        match self.last_rate_limit_error {
            Some(at) => period.saturating_sub(now.duration_since(at)),
            None => Duration::ZERO,
        }
    }
}

/// Why a request was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Cooldown after a provider rate limit violation is still active
    Stabilizing {
        /// Whole seconds until the cooldown ends, rounded up
        remaining_secs: u64,
    },
    /// Per-minute request window is at its limit
    RequestsPerMinute,
    /// Per-hour request window is at its limit
    RequestsPerHour,
    /// Estimated tokens would overflow the per-minute token window
    TokensPerMinute,
    /// Estimated tokens would overflow the per-hour token window
    TokensPerHour,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stabilizing { remaining_secs } => {
                write!(f, "Stabilization period active ({remaining_secs}s remaining)")
            }
            Self::RequestsPerMinute => write!(f, "Request rate limit exceeded (per minute)"),
            Self::RequestsPerHour => write!(f, "Request rate limit exceeded (per hour)"),
            Self::TokensPerMinute => write!(f, "Token rate limit exceeded (per minute)"),
            Self::TokensPerHour => write!(f, "Token rate limit exceeded (per hour)"),
        }
    }
}

/// Result of an admission check.
#[derive(Debug, Clone)]
pub struct AdmissionDecision {
    /// Whether the request may be dispatched now
    pub allowed: bool,
    /// Denial reason when not allowed
    pub reason: Option<DenyReason>,
}

impl AdmissionDecision {
    fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn denied(reason: DenyReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

/// Current usage across all four windows plus utilization percentages.
#[derive(Debug, Clone, Serialize)]
pub struct UsageStats {
    /// Requests inside the trailing minute
    pub requests_last_minute: u64,
    /// Requests inside the trailing hour
    pub requests_last_hour: u64,
    /// Tokens inside the trailing minute
    pub tokens_last_minute: u64,
    /// Tokens inside the trailing hour
    pub tokens_last_hour: u64,
    /// Whether the stabilization cooldown is active
    pub stabilization_active: bool,
    /// Provider rate limit violations since the last success
    pub consecutive_errors: u32,
    /// Per-minute request utilization (used / limit x 100)
    pub requests_minute_pct: f64,
    /// Per-hour request utilization
    pub requests_hour_pct: f64,
    /// Per-minute token utilization
    pub tokens_minute_pct: f64,
    /// Per-hour token utilization
    pub tokens_hour_pct: f64,
}

fn utilization_pct(used: u64, limit: u64) -> f64 {
    if limit == 0 {
        100.0
    } else {
        used as f64 / limit as f64 * 100.0
    }
}

/// Admission control and backoff engine.
///
/// Safe for concurrent callers; all operations take the internal lock
/// once and release it before returning.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<RateLimitState>,
}

impl RateLimiter {
    /// Create a limiter over the given thresholds.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(RateLimitState::new()),
        }
    }

    /// The thresholds this limiter enforces.
    #[must_use]
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Decide whether a request with `estimated_tokens` may dispatch now.
    ///
    /// The token check is a conservative projection: it adds the estimate
    /// to the current window sums, so admission never under-reserves
    /// budget. Passing `0` skips the token windows entirely.
    pub fn can_make_request(&self, estimated_tokens: u64) -> AdmissionDecision {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap();
        state.cleanup(now);

        let period = self.config.stabilization_period();
        if state.in_stabilization(now, period) {
            let remaining = state.stabilization_remaining(now, period);
            let reason = DenyReason::Stabilizing {
                remaining_secs: remaining.as_secs_f64().ceil() as u64,
            };
            debug!(%reason, "request denied");
            return AdmissionDecision::denied(reason);
        }

        if state.requests_minute.count() >= self.config.requests_per_minute {
            debug!(reason = %DenyReason::RequestsPerMinute, "request denied");
            return AdmissionDecision::denied(DenyReason::RequestsPerMinute);
        }
        if state.requests_hour.count() >= self.config.requests_per_hour {
            debug!(reason = %DenyReason::RequestsPerHour, "request denied");
            return AdmissionDecision::denied(DenyReason::RequestsPerHour);
        }

        if estimated_tokens > 0 {
            if state.tokens_minute.weight() + estimated_tokens > self.config.tokens_per_minute {
                debug!(reason = %DenyReason::TokensPerMinute, estimated_tokens, "request denied");
                return AdmissionDecision::denied(DenyReason::TokensPerMinute);
            }
            if state.tokens_hour.weight() + estimated_tokens > self.config.tokens_per_hour {
                debug!(reason = %DenyReason::TokensPerHour, estimated_tokens, "request denied");
                return AdmissionDecision::denied(DenyReason::TokensPerHour);
            }
        }

        AdmissionDecision::allowed()
    }

    /// Record a dispatched request against all applicable windows.
    ///
    /// Recording is unconditional and happens at dispatch time, before
    /// the call completes, so in-flight work already counts against the
    /// budget. The reservation is not rolled back if the call is later
    /// cancelled.
    pub fn record_request(&self, token_count: u64) {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap();
        state.add_request(now, token_count);
    }

    /// Record a provider rate limit violation and enter stabilization.
    pub fn record_rate_limit_error(&self) {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap();
        state.last_rate_limit_error = Some(now);
        state.consecutive_errors += 1;
        warn!(
            consecutive_errors = state.consecutive_errors,
            stabilization_minutes = self.config.stabilization_period_minutes,
            "provider rate limit hit, entering stabilization"
        );
    }

    /// Record a successful call.
    ///
    /// Resets the error streak only. A past violation keeps gating the
    /// stabilization window; success does not clear it.
    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap();
        if state.consecutive_errors > 0 {
            debug!(
                consecutive_errors = state.consecutive_errors,
                "success after errors, resetting streak"
            );
        }
        state.consecutive_errors = 0;
    }

    /// Backoff delay before retry `attempt` (1-based).
    ///
    /// `base x exponential_base^(attempt-1)` plus a jitter fraction drawn
    /// from the OS entropy source, clamped to `max_delay`. The jitter is
    /// deliberately non-deterministic so independent processes hitting
    /// the same upstream do not retry in lockstep. When the error streak
    /// exceeds 3 the clamped result is multiplied by 1.5 without
    /// re-clamping, an intentional escape past `max_delay` under
    /// sustained failure.
    pub fn calculate_retry_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let mut delay = self.config.base_delay * self.config.exponential_base.powi(attempt as i32 - 1);
        delay += delay * self.config.jitter_factor * OsRng.gen::<f64>();
        delay = delay.min(self.config.max_delay);

        let consecutive_errors = self.state.lock().unwrap().consecutive_errors;
        if consecutive_errors > 3 {
            delay *= 1.5;
        }

        Duration::from_secs_f64(delay)
    }

    /// Snapshot of current window usage and utilization.
    pub fn get_usage_stats(&self) -> UsageStats {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap();
        state.cleanup(now);

        let requests_last_minute = state.requests_minute.count();
        let requests_last_hour = state.requests_hour.count();
        let tokens_last_minute = state.tokens_minute.weight();
        let tokens_last_hour = state.tokens_hour.weight();

        UsageStats {
            requests_last_minute,
            requests_last_hour,
            tokens_last_minute,
            tokens_last_hour,
            stabilization_active: state.in_stabilization(now, self.config.stabilization_period()),
            consecutive_errors: state.consecutive_errors,
            requests_minute_pct: utilization_pct(requests_last_minute, self.config.requests_per_minute),
            requests_hour_pct: utilization_pct(requests_last_hour, self.config.requests_per_hour),
            tokens_minute_pct: utilization_pct(tokens_last_minute, self.config.tokens_per_minute),
            tokens_hour_pct: utilization_pct(tokens_last_hour, self.config.tokens_per_hour),
        }
    }
}

#[cfg(test)]
mod tests;
