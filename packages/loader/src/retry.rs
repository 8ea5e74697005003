//! HTTP retry helpers for transient errors.
//!
//! Both dataset downloads go through [`send_text`] so that a flaky
//! connection or an overloaded server does not immediately abort the map.
//! Retries use exponential backoff (2s, 4s, 8s, ...). HTTP 4xx other than
//! 429 is permanent and fails at once.

use std::time::Duration;

use crate::LoaderError;

/// How a response status should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    /// Success; read the body.
    Accept,
    /// Transient; try again if attempts remain.
    Retry,
    /// Permanent failure.
    Fail,
}

/// Classifies a response status.
#[must_use]
pub fn classify_status(status: reqwest::StatusCode) -> StatusAction {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        StatusAction::Retry
    } else if status.is_client_error() {
        StatusAction::Fail
    } else {
        StatusAction::Accept
    }
}

/// Delay before retry number `attempt` (1-based).
#[must_use]
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(6))
}

/// Sends an HTTP request and returns the response body as a `String`.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`], since builders are consumed by
/// `.send()`.
///
/// # Errors
///
/// Returns [`LoaderError`] if the request still fails after
/// `max_retries` retries, or the server returns a permanent error status.
pub async fn send_text<F>(build_request: F, max_retries: u32) -> Result<String, LoaderError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }
        let can_retry = attempt < max_retries;
        attempt += 1;

        let response = match build_request().send().await {
            Ok(response) => response,
            Err(e) if is_transient(&e) && can_retry => {
                log::warn!("  transient error: {e}");
                continue;
            }
            Err(e) => return Err(LoaderError::Http(e)),
        };

        let status = response.status();
        let url = response.url().to_string();

        match classify_status(status) {
            StatusAction::Accept => {}
            StatusAction::Retry if can_retry => {
                log::warn!("  HTTP {status} from {url}");
                continue;
            }
            StatusAction::Retry | StatusAction::Fail => {
                return Err(LoaderError::Status {
                    url,
                    status: status.as_u16(),
                });
            }
        }

        match response.text().await {
            Ok(text) => return Ok(text),
            Err(e) if can_retry => {
                log::warn!("  body read failed for {url}: {e}");
            }
            Err(e) => {
                log::error!("Body read failed for {url} after {max_retries} retries: {e}");
                return Err(LoaderError::Http(e));
            }
        }
    }
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}
