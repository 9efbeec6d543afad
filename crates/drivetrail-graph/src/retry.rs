//! Retry with exponential backoff
//!
//! Wraps gateway calls so that rate limits and transient failures are
//! absorbed before an error escapes to the reconciliation layer. A 429
//! with a Retry-After hint sleeps exactly as long as the provider asks;
//! everything else retryable follows the 1s, 2s, 4s, 8s schedule.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use drivetrail_core::ports::provider::GatewayError;

/// Maximum number of attempts (initial call plus retries)
pub const MAX_ATTEMPTS: u32 = 5;

/// Base delay for exponential backoff
const BASE_DELAY: Duration = Duration::from_secs(1);

/// Executes an async gateway operation with backoff retry
///
/// Only [`GatewayError::RateLimited`] and [`GatewayError::Transient`] are
/// retried; auth and fatal errors return immediately.
pub async fn with_backoff<F, Fut, T>(operation: &str, f: F) -> Result<T, GatewayError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let mut last_error: Option<GatewayError> = None;

    for attempt in 0..MAX_ATTEMPTS {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(operation, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() && attempt + 1 < MAX_ATTEMPTS => {
                let delay = match &err {
                    GatewayError::RateLimited {
                        retry_after: Some(hint),
                    } => *hint,
                    _ => BASE_DELAY * 2u32.pow(attempt),
                };
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retryable gateway error, backing off"
                );
                tokio::time::sleep(delay).await;
                last_error = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_error
        .unwrap_or_else(|| GatewayError::Transient(format!("retry loop exited for {operation}"))))
}
