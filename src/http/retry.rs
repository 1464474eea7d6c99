//! Classification of HTTP failures into retryable and permanent ones.

use reqwest::StatusCode;
use thiserror::Error;

/// Maximum number of attempts for one download.
pub(crate) const MAX_RETRIES: usize = 3;

/// Delay between attempts in milliseconds.
pub(crate) const RETRY_DELAY_MS: u64 = 1000;

/// Failures that will not go away by asking again.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NonRetryableError {
    #[error("Authentication required to download {0}")]
    AuthenticationFailed(String),
    #[error("Access to {0} is forbidden")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Too many requests to {0}, try again later")]
    RateLimitExceeded(String),
    #[error("Request to {url} failed with HTTP {status}")]
    ClientError { url: String, status: u16 },
}

/// Returns `Err` when the failure is permanent, `Ok(())` when it may be retried.
pub(crate) fn classify_error(error: &reqwest::Error) -> Result<(), NonRetryableError> {
    let Some(status) = error.status() else {
        // Connection errors and timeouts
        return Ok(());
    };
    let url = error
        .url()
        .map(|u| u.to_string())
        .unwrap_or_else(|| "the requested resource".to_string());

    match status {
        StatusCode::UNAUTHORIZED => Err(NonRetryableError::AuthenticationFailed(url)),
        StatusCode::FORBIDDEN => Err(NonRetryableError::Forbidden(url)),
        StatusCode::NOT_FOUND => Err(NonRetryableError::NotFound(url)),
        StatusCode::TOO_MANY_REQUESTS => Err(NonRetryableError::RateLimitExceeded(url)),
        s if s.is_client_error() => Err(NonRetryableError::ClientError {
            url,
            status: s.as_u16(),
        }),
        _ => Ok(()),
    }
}

/// Wrap an `error_for_status()` failure, marking permanent ones as such.
pub(crate) fn check_retryable(error: reqwest::Error) -> anyhow::Error {
    match classify_error(&error) {
        Ok(()) => anyhow::Error::from(error),
        Err(non_retryable) => anyhow::Error::from(non_retryable),
    }
}
