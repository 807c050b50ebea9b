//! Retry execution around admission control
//!
//! Drives a unit of work through the limiter: check admission, record the
//! reservation, dispatch, classify any failure, back off, repeat. No lock
//! is held while the work or a backoff sleep is pending, so cancelling
//! the returned future at any await point unwinds cleanly. A reservation
//! already recorded for an in-flight attempt is not rolled back on
//! cancellation; the dispatch may already have reached the network.

use crate::limiter::RateLimiter;
use palisade_llm::{Classify, ErrorClass};
use std::future::Future;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Raised when every attempt was spent on admission denials and the unit
/// of work never produced a terminal result.
#[derive(Debug, Clone, Error)]
#[error("retry budget exhausted after {attempts} attempts without a provider response")]
pub struct RetryExhausted {
    /// Attempts consumed
    pub attempts: u32,
}

impl From<RetryExhausted> for palisade_llm::Error {
    fn from(err: RetryExhausted) -> Self {
        palisade_llm::Error::Api {
            status: None,
            message: err.to_string(),
        }
    }
}

/// Execute a unit of work under the limiter's admission and retry policy.
///
/// The attempt budget is the limiter's `max_retries`, and it is shared:
/// an admission denial costs an attempt exactly like a provider
/// rejection, so aggressive self-throttling can exhaust the budget before
/// the provider is ever reached.
///
/// Failure handling per attempt:
/// - fatal errors propagate immediately without consuming further
///   attempts;
/// - rate limit rejections enter stabilization and retry after backoff;
/// - transient server errors retry after backoff with no cooldown;
/// - the last permitted attempt re-raises the original error unwrapped.
///
/// # Errors
///
/// Returns the upstream error unchanged on exhaustion or fatal
/// classification, or `RetryExhausted` converted into `E` when every
/// attempt was denied admission.
pub async fn execute_with_limits<T, E, F, Fut>(
    limiter: &RateLimiter,
    estimated_tokens: u64,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + From<RetryExhausted> + std::fmt::Debug,
{
    let max_retries = limiter.config().max_retries;

    for attempt in 1..=max_retries {
        let decision = limiter.can_make_request(estimated_tokens);
        if !decision.allowed {
            let delay = limiter.calculate_retry_delay(attempt);
            debug!(
                attempt,
                max_retries,
                delay_ms = delay.as_millis() as u64,
                reason = ?decision.reason,
                "admission denied, backing off"
            );
            sleep(delay).await;
            continue;
        }

        limiter.record_request(estimated_tokens);

        match operation().await {
            Ok(result) => {
                limiter.record_success();
                if attempt > 1 {
                    debug!(attempt, "call succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => {
                let class = err.classify();
                match class {
                    ErrorClass::Fatal => {
                        debug!(attempt, error = ?err, "fatal error, not retrying");
                        return Err(err);
                    }
                    ErrorClass::RateLimited => limiter.record_rate_limit_error(),
                    ErrorClass::TransientServer => {}
                }

                if attempt == max_retries {
                    warn!(attempt, error = ?err, "retries exhausted");
                    return Err(err);
                }

                let delay = limiter.calculate_retry_delay(attempt);
                warn!(
                    attempt,
                    max_retries,
                    class = %class,
                    delay_ms = delay.as_millis() as u64,
                    error = ?err,
                    "call failed, retrying"
                );
                sleep(delay).await;
            }
        }
    }

    // Every attempt was denied admission; nothing upstream to re-raise.
    Err(E::from(RetryExhausted {
        attempts: max_retries,
    }))
}
