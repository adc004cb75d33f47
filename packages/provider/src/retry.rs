//! HTTP retry helper for live provider paths.
//!
//! Every live provider call goes through [`send_json`] so transient
//! failures (timeouts, connection resets, HTTP 429, HTTP 5xx) get a short
//! exponential backoff before the provider gives up and falls back to
//! synthetic data. Budgets are deliberately small: a slow upstream must
//! not stall a whole tile batch.
//!
//! ```ignore
//! let body = retry::send_json(|| client.post(&url).json(&payload)).await?;
//! ```

use std::time::Duration;

use crate::ProviderError;

/// Retry attempts after the first request for transient errors.
const MAX_RETRIES: u32 = 2;

/// Backoff before the first retry; doubled on every further attempt.
const BASE_DELAY: Duration = Duration::from_millis(500);

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 300;

/// Sends the request built by `build_request` and parses the body as JSON.
///
/// `build_request` is called once per attempt because builders are
/// consumed by `.send()`. HTTP 4xx other than 429 is permanent and never
/// retried.
///
/// # Errors
///
/// Returns [`ProviderError`] if the request still fails after all
/// retries, the status is not retryable, or the body is not JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(build_request: F) -> Result<serde_json::Value, ProviderError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(&build_request).await?;
    let url = response.url().to_string();
    let status = response.status();
    let text = response.text().await?;

    serde_json::from_str(&text).map_err(|e| {
        let preview: String = text.chars().take(BODY_PREVIEW_LEN).collect();
        log::warn!(
            "JSON parse failed\n  url: {url}\n  status: {status}\n  \
             received: {} bytes\n  body preview: {preview}",
            text.len()
        );
        ProviderError::Json(e)
    })
}

#[allow(clippy::future_not_send)]
async fn send_inner<F>(build_request: &F) -> Result<reqwest::Response, ProviderError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            let delay = BASE_DELAY * 2u32.pow(attempt - 1);
            log::debug!("  retry {attempt}/{MAX_RETRIES} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }
        let can_retry = attempt < MAX_RETRIES;
        attempt += 1;

        let response = match build_request().send().await {
            Ok(response) => response,
            Err(e) if can_retry && is_transient(&e) => {
                log::debug!("  transient error: {e}");
                continue;
            }
            Err(e) => return Err(ProviderError::Http(e)),
        };

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            if can_retry {
                log::debug!("  HTTP {status}, will retry");
                continue;
            }
            return Err(ProviderError::Response {
                message: format!("HTTP {status} after {MAX_RETRIES} retries"),
            });
        }
        if status.is_client_error() {
            return Err(ProviderError::Response {
                message: format!("HTTP {status}"),
            });
        }
        return Ok(response);
    }
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}
