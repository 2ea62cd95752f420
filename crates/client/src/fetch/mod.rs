//! Network fetch capability used by the cache worker.
//!
//! ### Contract
//! - A transport failure (DNS, connect, timeout, oversized body) is an `Err`.
//! - Any HTTP response, including 4xx/5xx, is an `Ok`. The caller decides
//!   whether the status is cacheable via [`FetchResponse::is_ok`].
//!
//! ### Revalidation
//! - [`CacheMode::Reload`] bypasses intermediate caches by sending
//!   `Cache-Control: no-cache` and `Pragma: no-cache`.
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 20MB (configurable)

pub mod url;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, header};

pub use reqwest::Method;
pub use self::url::{UrlError, parse_origin};

use precache_core::{AppConfig, CachedResponse, Error};

/// How intermediate HTTP caches should treat a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheMode {
    /// Normal HTTP caching rules apply.
    #[default]
    Default,
    /// Force revalidation against the origin.
    Reload,
}

/// A request for one resource.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub method: Method,
    pub url: ::url::Url,
    pub cache_mode: CacheMode,
}

impl ResourceRequest {
    pub fn new(method: Method, url: ::url::Url) -> Self {
        Self { method, url, cache_mode: CacheMode::Default }
    }

    pub fn get(url: ::url::Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "precache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 20MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "precache/0.1".to_string(),
            max_bytes: 20 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The URL the response belongs to
    pub url: ::url::Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response headers
    pub headers: header::HeaderMap,
    /// Response body bytes
    pub bytes: Bytes,
    /// Time taken to fetch in milliseconds (0 when served from storage)
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    /// Copy of this response suitable for a storage region.
    pub fn to_cached(&self) -> CachedResponse {
        let headers = self
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let cached =
            CachedResponse::new(self.url.as_str(), self.status.as_u16(), self.bytes.clone()).with_headers(headers);
        match &self.content_type {
            Some(content_type) => cached.with_content_type(content_type.clone()),
            None => cached,
        }
    }

    /// Rebuild a response from a stored entry.
    pub fn from_cached(entry: CachedResponse) -> Result<Self, Error> {
        let url = ::url::Url::parse(&entry.url).map_err(|e| Error::Storage(format!("stored URL {}: {e}", entry.url)))?;
        let status = StatusCode::from_u16(entry.status)
            .map_err(|e| Error::Storage(format!("stored status {}: {e}", entry.status)))?;

        let mut headers = header::HeaderMap::new();
        for (name, value) in &entry.headers {
            if let (Ok(name), Ok(value)) =
                (header::HeaderName::from_bytes(name.as_bytes()), header::HeaderValue::from_str(value))
            {
                headers.append(name, value);
            }
        }

        Ok(Self { url, status, content_type: entry.content_type, headers, bytes: entry.body, fetch_ms: 0 })
    }
}

/// Abstract network capability: `fetch(request) -> response | failure`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &ResourceRequest) -> Result<FetchResponse, Error>;
}

/// HTTP fetch client backed by reqwest.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() { Error::FetchTimeout(err.to_string()) } else { Error::Network(err.to_string()) }
}

#[async_trait]
impl Fetcher for FetchClient {
    /// Fetch a URL, returning raw bytes and metadata.
    ///
    /// Respects redirect and byte limits. Non-2xx responses are returned as-is.
    async fn fetch(&self, request: &ResourceRequest) -> Result<FetchResponse, Error> {
        let start = Instant::now();

        let mut builder = self.http.request(request.method.clone(), request.url.as_str());
        if request.cache_mode == CacheMode::Reload {
            builder = builder
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::PRAGMA, "no-cache");
        }

        let response = builder.send().await.map_err(transport_error)?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                len, self.config.max_bytes
            )));
        }

        let headers = response.headers().clone();

        let bytes = response.bytes().await.map_err(transport_error)?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                bytes.len(),
                self.config.max_bytes
            )));
        }

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            url = %request.url,
            status = status.as_u16(),
            fetch_ms,
            bytes = bytes.len(),
            reload = request.cache_mode == CacheMode::Reload,
            "fetched resource"
        );

        Ok(FetchResponse { url: request.url.clone(), status, content_type, bytes, headers, fetch_ms })
    }
}
