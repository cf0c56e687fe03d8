//! HTTP retrieval collaborator
//!
//! The client owns the transport concerns the core stays out of: request
//! headers, timeout policy, and bounded retry with exponential backoff for
//! transient failures. Retrieval is cooperatively cancellable through a
//! watch signal; a cancelled fetch resolves with `FetchError::Cancelled`,
//! which the request layer turns into a silent cancelled completion.

mod config;

pub use config::ClientConfig;

use std::time::Duration;

use reqwest::header::HeaderMap;
use tokio::sync::watch;
use tracing::{debug, error, warn};
use url::Url;

use crate::constants::limits;
use crate::errors::{FetchError, FetchResult};

/// HTTP retrieval handler shared by all load requests
#[derive(Debug)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Create a client with default configuration
    pub fn new() -> FetchResult<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(config: ClientConfig) -> FetchResult<Self> {
        Ok(Self {
            client: config.build_http_client()?,
        })
    }

    /// Fetch the resource at `url` into memory
    ///
    /// Transient failures (connect errors, 429, 5xx) are retried with
    /// exponential backoff up to the configured limit. The fetch aborts as
    /// soon as `cancel` flips to true.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Cancelled` on cooperative cancellation, and the
    /// underlying fetch error otherwise.
    pub async fn fetch(
        &self,
        url: &Url,
        headers: Option<&HeaderMap>,
        mut cancel: watch::Receiver<bool>,
    ) -> FetchResult<Vec<u8>> {
        tokio::select! {
            biased;
            _ = wait_cancelled(&mut cancel) => {
                debug!("Fetch cancelled: {}", url);
                Err(FetchError::Cancelled)
            }
            result = self.fetch_with_retries(url, headers) => result,
        }
    }

    /// Retry loop around a single fetch attempt
    async fn fetch_with_retries(
        &self,
        url: &Url,
        headers: Option<&HeaderMap>,
    ) -> FetchResult<Vec<u8>> {
        let mut retries = 0;
        loop {
            match self.attempt(url, headers).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if !Self::is_transient(&e) => return Err(e),
                Err(e) if retries < limits::MAX_RETRIES => {
                    retries += 1;
                    let delay =
                        Duration::from_millis(limits::RETRY_BASE_DELAY_MS * 2_u64.pow(retries));
                    warn!(
                        "Fetch failed (attempt {}/{}): {}. Retrying in {}ms",
                        retries,
                        limits::MAX_RETRIES,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!("Fetch failed after {} retries: {}", limits::MAX_RETRIES, e);
                    return Err(FetchError::MaxRetriesExceeded {
                        max_retries: limits::MAX_RETRIES,
                    });
                }
            }
        }
    }

    /// One fetch attempt
    async fn attempt(&self, url: &Url, headers: Option<&HeaderMap>) -> FetchResult<Vec<u8>> {
        let mut request = self.client.get(url.clone());
        if let Some(headers) = headers {
            request = request.headers(headers.clone());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 404 {
                return Err(FetchError::NotFound {
                    url: url.to_string(),
                });
            }
            return Err(FetchError::ServerError {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        debug!("Fetched {} ({} bytes)", url, bytes.len());
        Ok(bytes.to_vec())
    }

    /// Whether an error is worth retrying
    fn is_transient(error: &FetchError) -> bool {
        match error {
            FetchError::Http(_) => true,
            FetchError::ServerError { status } => {
                matches!(status, 429 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }
}

/// Resolve once the cancel signal flips to true
///
/// Never resolves when the sender goes away without cancelling, so the
/// fetch branch of the select wins by default.
async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    if *cancel.borrow() {
        return;
    }
    while cancel.changed().await.is_ok() {
        if *cancel.borrow() {
            return;
        }
    }
    std::future::pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn test_transient_classification() {
        assert!(HttpClient::is_transient(&FetchError::ServerError {
            status: 503
        }));
        assert!(HttpClient::is_transient(&FetchError::ServerError {
            status: 429
        }));
        assert!(!HttpClient::is_transient(&FetchError::ServerError {
            status: 403
        }));
        assert!(!HttpClient::is_transient(&FetchError::NotFound {
            url: "https://example.com/a.jpg".to_string()
        }));
        assert!(!HttpClient::is_transient(&FetchError::Cancelled));
    }

    #[tokio::test]
    async fn test_pre_cancelled_fetch_resolves_immediately() {
        let client = HttpClient::new().unwrap();
        // TEST-NET address: connecting would hang, but the cancel signal is
        // already set so the fetch must resolve without touching the network.
        let url = Url::parse("http://192.0.2.1/image.png").unwrap();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        cancel_tx.send(true).unwrap();

        let result = timeout(Duration::from_millis(200), client.fetch(&url, None, cancel_rx))
            .await
            .expect("cancelled fetch must not block");
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_mid_flight() {
        let client = HttpClient::new().unwrap();
        let url = Url::parse("http://192.0.2.1/image.png").unwrap();
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let fetch = tokio::spawn(async move { client.fetch(&url, None, cancel_rx).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel_tx.send(true).unwrap();

        let result = timeout(Duration::from_secs(1), fetch)
            .await
            .expect("fetch must resolve after cancel")
            .unwrap();
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }

    #[test]
    fn test_exponential_backoff_delays() {
        let base = limits::RETRY_BASE_DELAY_MS;
        let delay_1 = Duration::from_millis(base * 2_u64.pow(1));
        let delay_2 = Duration::from_millis(base * 2_u64.pow(2));
        assert!(delay_2 > delay_1);
    }
}
