//! Exponential-backoff retry engine (§4.2, §8).

use rand::Rng;
use std::future::Future;

use crate::config::ClientOptions;
use crate::error::Error;

/// Drives `attempt` through the retry algorithm in §4.2: invoke, classify
/// failures as transient or not, back off with jitter, repeat.
///
/// `attempt` receives the zero-based retry counter `k` for diagnostics (the
/// teacher's handlers thread a similar counter through retried operations).
pub async fn retry<T, F, Fut>(options: &ClientOptions, mut attempt: F) -> Result<T, Error>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut k = 0u32;
    loop {
        match attempt(k).await {
            Ok(value) => return Ok(value),
            Err(mut err) => {
                if !options.transient_error_codes.contains(&err.code) {
                    err.retries = k;
                    return Err(err);
                }
                if k >= options.retries {
                    err.retries = k;
                    return Err(err);
                }
                k += 1;
                let delay = backoff_delay(k, options);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// `base = min(2^k * delayFactor, maxDelay)`, `delay = base * uniform(1±rf)`.
fn backoff_delay(k: u32, options: &ClientOptions) -> std::time::Duration {
    let base = (2u64.saturating_pow(k).saturating_mul(options.delay_factor_ms)).min(options.max_delay_ms);
    let rf = options.randomization_factor;
    let factor = rand::thread_rng().gen_range((1.0 - rf)..=(1.0 + rf));
    let millis = (base as f64 * factor).max(0.0) as u64;
    std::time::Duration::from_millis(millis)
}
