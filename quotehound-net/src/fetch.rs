//! Static page fetcher
//!
//! Plain HTTP GET without script execution. Non-2xx responses, transport
//! failures and timeouts all surface as [`FetchError`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use quotehound_core::{FetchResult, RenderMode};

use crate::{create_http_client, FetchConfig, FetchError};

/// Capability to retrieve a page body without rendering
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the raw HTML of `url`
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// reqwest-backed static fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: create_http_client(config)?,
            timeout: config.timeout(),
        })
    }

    pub fn with_default_config() -> Result<Self, FetchError> {
        Self::new(&FetchConfig::default())
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        fetch_static(&self.client, url, self.timeout).await
    }
}

/// GET `url` with an overall `timeout`, failing on any non-2xx status
pub async fn fetch_static(client: &Client, url: &str, timeout: Duration) -> Result<String, FetchError> {
    let parsed = url::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FetchError::InvalidUrl(url.to_string()));
    }

    debug!("Fetching: {}", url);

    let response = client
        .get(parsed)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(e, timeout))?;

    let status = response.status();
    if !status.is_success() {
        warn!("Fetch of {} returned status: {}", url, status);
        return Err(FetchError::Status(status.as_u16()));
    }

    response
        .text()
        .await
        .map_err(|e| FetchError::from_reqwest(e, timeout))
}

/// Fetch through `fetcher`, recording mode and elapsed time
pub async fn fetch_page(fetcher: &dyn PageFetcher, url: &str) -> FetchResult {
    let started = Instant::now();
    let body = fetcher.fetch(url).await.map_err(|e| e.to_string());

    FetchResult {
        url: url.to_string(),
        body,
        mode: RenderMode::Static,
        elapsed: started.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn test_fetch_static_ok() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/quotes")
            .match_header("user-agent", crate::DEFAULT_USER_AGENT)
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body><p>\"Hello there, friend.\"</p></body></html>")
            .expect(1)
            .create_async()
            .await;

        let fetcher = HttpFetcher::with_default_config().unwrap();
        let html = fetcher.fetch(&format!("{}/quotes", server.url())).await.unwrap();

        assert!(html.contains("Hello there"));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_static_status_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let fetcher = HttpFetcher::with_default_config().unwrap();
        let err = fetcher
            .fetch(&format!("{}/missing", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Status(404)));
    }

    #[tokio::test]
    async fn test_fetch_static_invalid_url() {
        let fetcher = HttpFetcher::with_default_config().unwrap();

        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));

        let err = fetcher.fetch("ftp://example.com/file").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_fetch_page_records_result() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/page")
            .with_status(500)
            .create_async()
            .await;

        let fetcher = HttpFetcher::with_default_config().unwrap();
        let url = format!("{}/page", server.url());
        let result = fetch_page(&fetcher, &url).await;

        assert_eq!(result.url, url);
        assert_eq!(result.mode, RenderMode::Static);
        assert_eq!(result.body, Err("HTTP status 500".to_string()));
    }

    #[tokio::test]
    async fn test_fetch_static_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and never answer
        let _silent = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config = FetchConfig {
            timeout_secs: 1,
            ..Default::default()
        };
        let fetcher = HttpFetcher::new(&config).unwrap();
        let err = fetcher
            .fetch(&format!("http://{}/slow", addr))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Timeout(d) if d == Duration::from_secs(1)));
    }
}
