//! HTTP outcome classification
//!
//! Maps transport failures and non-success status codes into the
//! [`GatewayError`] taxonomy. The mapping is the contract the rest of the
//! system routes on: 401/403 disable the credential gate, 429 and 5xx are
//! retried, everything else is fatal.

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};

use drivetrail_core::ports::provider::GatewayError;

/// Classifies a reqwest transport error (nothing usable came back)
pub(crate) fn classify_transport(err: reqwest::Error, what: &str) -> GatewayError {
    if err.is_decode() || err.is_builder() {
        GatewayError::Fatal(format!("{what}: {err}"))
    } else {
        // Connect failures, timeouts, resets: all retryable.
        GatewayError::Transient(format!("{what}: {err}"))
    }
}

/// Classifies a non-success response, consuming its body for the detail
pub(crate) async fn classify_response(response: Response, what: &str) -> GatewayError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let detail = response.text().await.unwrap_or_default();

    classify_status(status, retry_after, &detail, what)
}

/// Pure status-code classification, split out for tests
pub(crate) fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    detail: &str,
    what: &str,
) -> GatewayError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            GatewayError::AuthInvalid(format!("{what}: HTTP {status}"))
        }
        StatusCode::TOO_MANY_REQUESTS => GatewayError::RateLimited { retry_after },
        s if s.is_server_error() => {
            GatewayError::Transient(format!("{what}: HTTP {status}: {detail}"))
        }
        _ => GatewayError::Fatal(format!("{what}: HTTP {status}: {detail}")),
    }
}

/// Parses a Retry-After header value given in whole seconds
///
/// HTTP-date forms are rare on Graph and are ignored; the caller falls
/// back to its own backoff schedule.
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
