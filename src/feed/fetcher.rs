use crate::feed::parser::{parse_document, ParseError, RawFeedDocument};
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default bound on a whole request, body included
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default response size limit
pub const DEFAULT_MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
pub const DEFAULT_USER_AGENT: &str = concat!("gleaner/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur while fetching a feed document.
///
/// Every variant is feed-level: the worker logs it and carries on with an
/// empty item list.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL could not be parsed or uses a scheme other than http(s)
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Body is not a well-formed XML document
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Single-attempt HTTP fetcher for RSS documents.
///
/// Cloning is cheap; the underlying `reqwest::Client` pools connections.
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_size: usize,
}

impl Fetcher {
    pub fn new(timeout: Duration, max_size: usize, user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            timeout,
            max_size,
        })
    }

    /// Fetch `url` once and parse the body.
    ///
    /// No retries: a failed fetch is retried only when the feed comes due
    /// again on a later cycle.
    ///
    /// # Errors
    ///
    /// - [`FetchError::InvalidUrl`] - not an http(s) URL
    /// - [`FetchError::Network`] - connection or TLS errors
    /// - [`FetchError::Timeout`] - request plus body exceeded the timeout
    /// - [`FetchError::HttpStatus`] - non-2xx response
    /// - [`FetchError::ResponseTooLarge`] / [`FetchError::IncompleteResponse`]
    /// - [`FetchError::Parse`] - malformed XML
    pub async fn fetch(&self, url: &str) -> Result<RawFeedDocument, FetchError> {
        let url = validate_feed_url(url)?;

        let bytes = tokio::time::timeout(self.timeout, self.download(url))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        Ok(parse_document(&bytes)?)
    }

    async fn download(&self, url: Url) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, self.max_size).await
    }
}

fn validate_feed_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(FetchError::InvalidUrl(format!(
            "{raw}: unsupported scheme {scheme}"
        ))),
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
