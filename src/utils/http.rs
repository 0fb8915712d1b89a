// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;
use crate::models::CrawlerConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Create a client with a cookie store, for the per-day archive session.
pub fn create_session_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .cookie_store(true)
        .build()?;
    Ok(client)
}

/// GET with bounded retry on transient failures.
///
/// Server errors (5xx) and transport errors are retried up to `attempts`
/// times with a fixed backoff. Anything else, including 4xx, is returned
/// to the caller for classification. After exhaustion the last 5xx
/// response is returned so the caller still sees the status.
pub async fn get_with_retry(
    client: &reqwest::Client,
    url: &str,
    attempts: u32,
    backoff: Duration,
) -> Result<reqwest::Response> {
    let attempts = attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=attempts {
        match client.get(url).send().await {
            Ok(response) => {
                if !response.status().is_server_error() || attempt == attempts {
                    return Ok(response);
                }
                log::warn!(
                    "Server error {} from {} (attempt {}/{})",
                    response.status(),
                    url,
                    attempt,
                    attempts
                );
            }
            Err(error) => {
                log::warn!("Request to {} failed (attempt {}/{}): {}", url, attempt, attempts, error);
                last_err = Some(error);
                if attempt == attempts {
                    break;
                }
            }
        }
        tokio::time::sleep(backoff).await;
    }

    Err(last_err.expect("retry loop exits early on success").into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_async_client_with_defaults() {
        let config = CrawlerConfig::default();
        assert!(create_async_client(&config).is_ok());
    }

    #[test]
    fn create_session_client_with_defaults() {
        let config = CrawlerConfig::default();
        assert!(create_session_client(&config).is_ok());
    }
}
