//! Browser-like HTTP client shared by all host handlers.
//!
//! Features:
//! - HTTP/2 with fallback to HTTP/1.1 (negotiated, never assumed)
//! - Brotli, Zstd, Gzip compression
//! - Cookie store so page visits and follow-up ajax calls share a session
//! - Fingerprinted default headers
//! - 403 backoff through [`crate::retry`]

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::error::{ExtractError, Result};
use crate::fingerprint::{random_profile, BrowserProfile};
use crate::retry::{send_with_retry, RetryPolicy};

/// HTTP client with a fixed browser fingerprint and retry policy.
#[derive(Debug, Clone)]
pub struct HostClient {
    client: Client,
    profile: BrowserProfile,
    retry: RetryPolicy,
}

impl HostClient {
    /// Create a client with a random browser profile.
    pub fn new(retry: RetryPolicy) -> Result<Self> {
        Self::with_profile(random_profile(), retry)
    }

    /// Create client with specific browser profile
    pub fn with_profile(profile: BrowserProfile, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .http2_adaptive_window(true)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .brotli(true)
            .zstd(true)
            .gzip(true)
            .deflate(true)
            .default_headers(profile.to_headers())
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::limited(10))
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            profile,
            retry,
        })
    }

    /// Underlying reqwest client, for collaborators that manage their own
    /// requests (sandbox, deobfuscator).
    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub fn profile(&self) -> &BrowserProfile {
        &self.profile
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    /// Send with 403 retry. A final non-success status becomes
    /// [`ExtractError::NoResponse`].
    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let url = request
            .try_clone()
            .and_then(|r| r.build().ok())
            .map(|r| r.url().to_string())
            .unwrap_or_default();
        send_with_retry(request, &self.retry)
            .await?
            .ok_or(ExtractError::NoResponse { url })
    }

    /// GET a page as text, optionally presenting a referer.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_text(&self, url: &str, referer: Option<&str>) -> Result<String> {
        let mut request = self.get(url);
        if let Some(referer) = referer {
            request = request.header(REFERER, referer);
        }
        let body = self.send(request).await?.text().await?;
        debug!(bytes = body.len(), "Fetched page");
        Ok(body)
    }

    /// Send and decode a JSON body.
    pub async fn fetch_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let body = self.send(request).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Headers an in-page `XMLHttpRequest` would carry.
pub fn xhr_headers(referer: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
    headers.insert(
        "accept",
        HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
    );
    if let Ok(value) = HeaderValue::from_str(referer) {
        headers.insert(REFERER, value);
    }
    headers
}
