//! Multi-candidate page fetching
//!
//! `Fetcher` walks an ordered list of equivalent search URLs and returns the body
//! of the first one that answers with a success status and a real page. Each
//! candidate gets its own timeout; an expired timeout drops (and so cancels) only
//! that candidate's request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use thiserror::Error;

/// Browser user agent sent with search requests
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

const BROWSER_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Errors that can occur when fetching a page
#[derive(Debug, Error)]
pub enum FetchError {
    /// Building the HTTP client failed
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// The request could not be completed
    #[error("Request to {url} failed: {message}")]
    Network { url: String, message: String },

    /// The candidate did not answer within its timeout
    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    /// The candidate answered with a non-success status
    #[error("Request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The candidate answered with a stub or empty page
    #[error("Response from {url} too short ({len} bytes, need {min})")]
    BodyTooShort { url: String, len: usize, min: usize },

    /// There was nothing to try
    #[error("No URL candidates to fetch")]
    NoCandidates,

    /// Every candidate failed; carries the last failure
    #[error("All {attempts} URL candidates failed, last error: {last}")]
    Exhausted {
        attempts: usize,
        #[source]
        last: Box<FetchError>,
    },
}

/// Status and text body of an HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Capability to GET a URL as text
///
/// Implementations must be cancel-safe: the fetcher drops the returned future when
/// a candidate times out.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str, retain_credentials: bool) -> Result<HttpResponse, FetchError>;
}

/// Per-call fetch options
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Hard timeout for each candidate
    pub timeout: Duration,
    /// Whether cookies set by the upstream are kept
    pub retain_credentials: bool,
}

/// `HttpClient` backed by reqwest
///
/// Keeps two clients so that credential-less requests never see cookies picked up
/// by credentialed ones.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    with_cookies: Client,
    without_cookies: Client,
}

impl ReqwestHttpClient {
    /// Creates clients that present themselves like a desktop browser
    pub fn new() -> Result<Self, FetchError> {
        Ok(Self {
            with_cookies: Self::builder().cookie_store(true).build()?,
            without_cookies: Self::builder().build()?,
        })
    }

    fn builder() -> reqwest::ClientBuilder {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE));
        Client::builder().default_headers(headers)
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, retain_credentials: bool) -> Result<HttpResponse, FetchError> {
        let client = if retain_credentials {
            &self.with_cookies
        } else {
            &self.without_cookies
        };

        let network_error = |e: reqwest::Error| FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = client.get(url).send().await.map_err(network_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(network_error)?;

        Ok(HttpResponse { status, body })
    }
}

/// Fetches the first usable page from an ordered list of URL candidates
#[derive(Clone)]
pub struct Fetcher {
    client: Arc<dyn HttpClient>,
    min_response_bytes: usize,
}

impl Fetcher {
    pub fn new(client: Arc<dyn HttpClient>, min_response_bytes: usize) -> Self {
        Self {
            client,
            min_response_bytes,
        }
    }

    /// Fetches page text, falling through the candidates in order
    ///
    /// # Arguments
    /// * `candidates` - Equivalent URLs, most preferred first
    /// * `options` - Per-candidate timeout and credential handling
    ///
    /// # Returns
    /// * `Ok(String)` - Body of the first candidate with a 2xx status and a full page
    /// * `Err(FetchError::Exhausted)` - Every candidate failed, with the last failure
    /// * `Err(FetchError::NoCandidates)` - `candidates` was empty
    pub async fn fetch_text(
        &self,
        candidates: &[String],
        options: &FetchOptions,
    ) -> Result<String, FetchError> {
        let mut last_error = None;

        for url in candidates {
            match self.fetch_candidate(url, options).await {
                Ok(body) => {
                    info!("Fetched {} ({} bytes)", url, body.len());
                    return Ok(body);
                }
                Err(e) => {
                    warn!("Candidate failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(last) => Err(FetchError::Exhausted {
                attempts: candidates.len(),
                last: Box::new(last),
            }),
            None => Err(FetchError::NoCandidates),
        }
    }

    async fn fetch_candidate(&self, url: &str, options: &FetchOptions) -> Result<String, FetchError> {
        debug!("Fetching {}", url);
        let request = self.client.get(url, options.retain_credentials);

        let response = tokio::time::timeout(options.timeout, request)
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
                timeout: options.timeout,
            })??;

        if !response.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }

        if response.body.len() < self.min_response_bytes {
            return Err(FetchError::BodyTooShort {
                url: url.to_string(),
                len: response.body.len(),
                min: self.min_response_bytes,
            });
        }

        Ok(response.body)
    }
}
