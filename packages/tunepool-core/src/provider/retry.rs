//! Retry logic for transient provider errors.
//!
//! Provides exponential backoff for provider requests that fail with
//! timeouts, connection errors, rate limiting or server errors.

use std::time::Duration;

use super::http::ProviderResult;
use crate::protocol_constants::PROVIDER_RETRY_DELAYS_MS;

/// Executes a provider request with retry logic for transient errors.
///
/// Retries with exponential backoff (200ms, 500ms, 1000ms). Non-transient
/// errors are returned immediately.
///
/// # Arguments
/// * `action` - Action name for logging
/// * `operation` - Closure that performs the request
pub(crate) async fn with_retry<T, F, Fut>(action: &str, mut operation: F) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ProviderResult<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(r) => return Ok(r),
            Err(e) if e.is_transient() && attempt < PROVIDER_RETRY_DELAYS_MS.len() => {
                let delay_ms = PROVIDER_RETRY_DELAYS_MS[attempt];
                attempt += 1;
                log::warn!("[Provider] {} transient error: {}", action, e);
                log::info!(
                    "[Provider] Retrying {} (attempt {}/{}) after {}ms",
                    action,
                    attempt + 1,
                    PROVIDER_RETRY_DELAYS_MS.len() + 1,
                    delay_ms
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(e) => return Err(e),
        }
    }
}
