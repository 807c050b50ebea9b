use super::*;
use std::sync::Arc;
use tokio::time::{advance, Duration};

fn limiter(config: RateLimitConfig) -> RateLimiter {
    RateLimiter::new(config)
}

#[tokio::test(start_paused = true)]
async fn test_minute_window_counts_exactly_trailing_sixty_seconds() {
    let limiter = limiter(RateLimitConfig::default());

    limiter.record_request(0);
    limiter.record_request(0);
    advance(Duration::from_secs(30)).await;
    limiter.record_request(0);

    let stats = limiter.get_usage_stats();
    assert_eq!(stats.requests_last_minute, 3);

    // 31s later the two t=0 events age out; the t=30 event remains.
    advance(Duration::from_secs(31)).await;
    let stats = limiter.get_usage_stats();
    assert_eq!(stats.requests_last_minute, 1);
    assert_eq!(stats.requests_last_hour, 3);

    // Everything ages out of the hour window eventually.
    advance(Duration::from_secs(3600)).await;
    let stats = limiter.get_usage_stats();
    assert_eq!(stats.requests_last_minute, 0);
    assert_eq!(stats.requests_last_hour, 0);
}

#[tokio::test(start_paused = true)]
async fn test_per_minute_request_denial_and_recovery() {
    let limiter = limiter(RateLimitConfig::default().with_requests_per_minute(2));

    limiter.record_request(0);
    limiter.record_request(0);

    let decision = limiter.can_make_request(0);
    assert!(!decision.allowed);
    assert_eq!(
        decision.reason.unwrap().to_string(),
        "Request rate limit exceeded (per minute)"
    );

    advance(Duration::from_secs(61)).await;
    let decision = limiter.can_make_request(0);
    assert!(decision.allowed);
    assert!(decision.reason.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_per_hour_request_denial() {
    let limiter = limiter(
        RateLimitConfig::default()
            .with_requests_per_minute(100)
            .with_requests_per_hour(3),
    );

    for _ in 0..3 {
        limiter.record_request(0);
        advance(Duration::from_secs(120)).await;
    }

    // Minute window is empty, hour window is full.
    let decision = limiter.can_make_request(0);
    assert_eq!(decision.reason, Some(DenyReason::RequestsPerHour));
}

#[tokio::test(start_paused = true)]
async fn test_token_projection_denies_before_overflow() {
    let limiter = limiter(RateLimitConfig::default().with_tokens_per_minute(1000));

    limiter.record_request(900);

    // 900 + 200 would overflow the minute budget.
    let decision = limiter.can_make_request(200);
    assert_eq!(decision.reason, Some(DenyReason::TokensPerMinute));

    // A smaller estimate still fits.
    assert!(limiter.can_make_request(100).allowed);

    // Zero estimate skips the token windows.
    assert!(limiter.can_make_request(0).allowed);
}

#[tokio::test(start_paused = true)]
async fn test_hour_token_window_denial() {
    let limiter = limiter(
        RateLimitConfig::default()
            .with_tokens_per_minute(100_000)
            .with_tokens_per_hour(150_000),
    );

    limiter.record_request(90_000);
    advance(Duration::from_secs(120)).await;
    limiter.record_request(50_000);

    // Minute window holds 50k, hour window 140k: 20k breaks the hour cap.
    let decision = limiter.can_make_request(20_000);
    assert_eq!(decision.reason, Some(DenyReason::TokensPerHour));
}

#[tokio::test(start_paused = true)]
async fn test_stabilization_gates_with_strict_boundary() {
    let limiter = limiter(RateLimitConfig::default());

    limiter.record_rate_limit_error();

    let decision = limiter.can_make_request(0);
    assert!(!decision.allowed);
    assert!(matches!(
        decision.reason,
        Some(DenyReason::Stabilizing { .. })
    ));

    // 899s in: still gated.
    advance(Duration::from_secs(899)).await;
    assert!(!limiter.can_make_request(0).allowed);

    // Exactly 900s: the gate is strict `<`, so the limiter is open.
    advance(Duration::from_secs(1)).await;
    assert!(limiter.can_make_request(0).allowed);
}

#[tokio::test(start_paused = true)]
async fn test_stabilization_reports_remaining_seconds() {
    let limiter = limiter(RateLimitConfig::default());
    limiter.record_rate_limit_error();
    advance(Duration::from_secs(300)).await;

    match limiter.can_make_request(0).reason {
        Some(DenyReason::Stabilizing { remaining_secs }) => assert_eq!(remaining_secs, 600),
        other => panic!("expected stabilization denial, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_success_resets_streak_but_not_stabilization() {
    let limiter = limiter(RateLimitConfig::default());

    limiter.record_rate_limit_error();
    limiter.record_rate_limit_error();
    assert_eq!(limiter.get_usage_stats().consecutive_errors, 2);

    limiter.record_success();
    let stats = limiter.get_usage_stats();
    assert_eq!(stats.consecutive_errors, 0);
    // The cooldown window is still gating admission.
    assert!(stats.stabilization_active);
    assert!(!limiter.can_make_request(0).allowed);
}

#[tokio::test]
async fn test_retry_delay_zero_attempt() {
    let limiter = limiter(RateLimitConfig::default());
    assert_eq!(limiter.calculate_retry_delay(0), Duration::ZERO);
}

#[tokio::test]
async fn test_retry_delay_exponential_growth_without_jitter() {
    let limiter = limiter(RateLimitConfig::default().with_jitter_factor(0.0));

    assert_eq!(limiter.calculate_retry_delay(1), Duration::from_secs_f64(1.0));
    assert_eq!(limiter.calculate_retry_delay(2), Duration::from_secs_f64(2.0));
    assert_eq!(limiter.calculate_retry_delay(3), Duration::from_secs_f64(4.0));
    assert_eq!(limiter.calculate_retry_delay(4), Duration::from_secs_f64(8.0));

    // Non-decreasing until the clamp takes over.
    let mut prev = Duration::ZERO;
    for attempt in 1..=12 {
        let delay = limiter.calculate_retry_delay(attempt);
        assert!(delay >= prev);
        prev = delay;
    }
    assert_eq!(prev, Duration::from_secs_f64(300.0));
}

#[tokio::test]
async fn test_retry_delay_jitter_stays_within_fraction() {
    let limiter = limiter(RateLimitConfig::default().with_jitter_factor(0.1));

    for _ in 0..50 {
        let delay = limiter.calculate_retry_delay(3).as_secs_f64();
        assert!((4.0..4.4).contains(&delay), "delay {delay} outside jitter band");
    }
}

#[tokio::test]
async fn test_sustained_failure_multiplier_escapes_clamp() {
    let limiter = limiter(
        RateLimitConfig::default()
            .with_jitter_factor(0.0)
            .with_base_delay(100.0)
            .with_max_delay(200.0),
    );

    for _ in 0..4 {
        limiter.record_rate_limit_error();
    }

    // attempt 3: 100 * 2^2 = 400, clamped to 200, then x1.5 = 300.
    let delay = limiter.calculate_retry_delay(3);
    assert_eq!(delay, Duration::from_secs_f64(300.0));
}

#[tokio::test(start_paused = true)]
async fn test_usage_stats_utilization() {
    let limiter = limiter(
        RateLimitConfig::default()
            .with_requests_per_minute(10)
            .with_tokens_per_minute(1000),
    );

    limiter.record_request(250);
    limiter.record_request(250);

    let stats = limiter.get_usage_stats();
    assert_eq!(stats.requests_last_minute, 2);
    assert_eq!(stats.tokens_last_minute, 500);
    assert!((stats.requests_minute_pct - 20.0).abs() < 1e-9);
    assert!((stats.tokens_minute_pct - 50.0).abs() < 1e-9);
    assert!(!stats.stabilization_active);
}

#[tokio::test(start_paused = true)]
async fn test_stats_serialize_directly() {
    let limiter = limiter(RateLimitConfig::default());
    limiter.record_request(100);

    let json = serde_json::to_value(limiter.get_usage_stats()).unwrap();
    assert_eq!(json["requests_last_minute"], 1);
    assert_eq!(json["tokens_last_minute"], 100);
    assert_eq!(json["stabilization_active"], false);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_recording_sums_exactly() {
    let limiter = Arc::new(limiter(RateLimitConfig::default()));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let limiter = Arc::clone(&limiter);
        handles.push(tokio::spawn(async move {
            for _ in 0..5 {
                limiter.record_request(10);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stats = limiter.get_usage_stats();
    assert_eq!(stats.requests_last_minute, 50);
    assert_eq!(stats.tokens_last_minute, 500);
}
