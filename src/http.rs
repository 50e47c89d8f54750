//! Shared HTTP client for provider queries and article fetches.
//!
//! One client is built at process start and passed into every component
//! (providers, fetcher, widgets); connection pooling and the retry policy
//! live here, not in module-level globals. Requests carry a browser-like
//! User-Agent and Accept headers because several news sources reject
//! non-browser clients.
//!
//! # Retry Strategy
//!
//! Connection errors and 5xx responses are retried a bounded number of
//! times with exponential backoff and jitter:
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```
//!
//! 4xx responses are returned immediately; they are the caller's problem.

use crate::config::PipelineConfig;
use crate::util::BoxError;
use rand::{rng, Rng};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{redirect, Client, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// A completed GET: the URL after redirects, the final status, and the
/// decoded body. 5xx statuses only show up here once retries are exhausted.
#[derive(Debug)]
pub struct FetchedPage {
    pub final_url: String,
    pub status: StatusCode,
    pub body: String,
}

/// Process-wide HTTP client with bounded retry. Cheap to clone; safe for
/// concurrent use by the fetch worker pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl HttpClient {
    pub fn new(config: &PipelineConfig) -> Result<Self, BoxError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language)?,
        );
        let inner = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .connect_timeout(config.connect_timeout())
            .timeout(config.read_timeout())
            .redirect(redirect::Policy::limited(10))
            .build()?;
        Ok(Self {
            inner,
            max_retries: config.http_retries,
            base_delay: config.retry_base_delay(),
            max_delay: Duration::from_secs(10),
        })
    }

    /// Raw client for endpoints that speak JSON (widgets, LLM).
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// GET a page, following redirects, retrying connection errors and 5xx.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_page(&self, url: &str) -> Result<FetchedPage, BoxError> {
        let mut attempt = 0usize;
        loop {
            let result = self.attempt_get(url).await;
            match result {
                Ok(page) if page.status.is_server_error() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        status = page.status.as_u16(),
                        ?delay,
                        "Server error; backing off"
                    );
                    sleep(delay).await;
                }
                Ok(page) => {
                    debug!(
                        status = page.status.as_u16(),
                        bytes = page.body.len(),
                        final_url = %page.final_url,
                        "GET complete"
                    );
                    return Ok(page);
                }
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "Request failed; backing off"
                    );
                    sleep(delay).await;
                }
                Err(e) => {
                    error!(attempt, error = %e, "GET exhausted retries");
                    return Err(Box::new(e));
                }
            }
        }
    }

    async fn attempt_get(&self, url: &str) -> Result<FetchedPage, reqwest::Error> {
        let response = self.inner.get(url).send().await?;
        let status = response.status();
        let final_url = response.url().to_string();
        let body = response.text().await?;
        Ok(FetchedPage {
            final_url,
            status,
            body,
        })
    }

    fn backoff_delay(&self, attempt: usize) -> Duration {
        let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
        if delay > self.max_delay {
            delay = self.max_delay;
        }
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + Duration::from_millis(jitter_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> HttpClient {
        let config = PipelineConfig {
            retry_base_delay_ms: 1,
            ..PipelineConfig::default()
        };
        HttpClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_get_page_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/page")
            .with_status(200)
            .with_body("<html><body>ok</body></html>")
            .create_async()
            .await;

        let page = test_client()
            .get_page(&format!("{}/page", server.url()))
            .await
            .unwrap();
        assert_eq!(page.status, StatusCode::OK);
        assert!(page.body.contains("ok"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_retried_then_surfaced() {
        let mut server = mockito::Server::new_async().await;
        // 1 initial try + 2 retries with the default config
        let mock = server
            .mock("GET", "/flaky")
            .with_status(500)
            .expect(3)
            .create_async()
            .await;

        let page = test_client()
            .get_page(&format!("{}/flaky", server.url()))
            .await
            .unwrap();
        assert_eq!(page.status.as_u16(), 500);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/gone")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let page = test_client()
            .get_page(&format!("{}/gone", server.url()))
            .await
            .unwrap();
        assert_eq!(page.status.as_u16(), 404);
        mock.assert_async().await;
    }
}
