//! Retry with exponential back-off and jitter for outbound HTTP calls.
//!
//! Rate limiting (429), 5xx responses and network failures are retried.
//! Anything else (404, other 4xx, undecodable bodies) fails on the first try.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

const MAX_DELAY_MS: u64 = 60_000;

fn is_retriable(err: &ScraperError) -> bool {
    matches!(
        err,
        ScraperError::RateLimited { .. } | ScraperError::ServerError { .. } | ScraperError::Http(_)
    )
}

/// Runs `operation`, retrying transient failures up to `max_retries` extra
/// times.
///
/// The wait before retry `n` is `backoff_base_ms * 2^(n-1)` capped at one
/// minute, scaled by a random factor in `[0.75, 1.25)`.
///
/// | Retry | Delay (base = 1 000 ms)      |
/// |-------|------------------------------|
/// | 1     | 1 000 ms × 2⁰ ± 25 % jitter  |
/// | 2     | 1 000 ms × 2¹ ± 25 % jitter  |
/// | 3     | 1 000 ms × 2² ± 25 % jitter  |
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient HTTP error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
