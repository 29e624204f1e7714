use std::fmt;
use std::future::Future;

use bytes::Bytes;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint is unusable: {0}")]
    InvalidEndpoint(String),
}

/// Outbound side of a sender: issues one request per flushed body.
///
/// Implementations must not retry. The sender drops whatever error comes
/// back.
pub trait Transport: Send + Sync + 'static {
    fn put(&self, body: Bytes) -> impl Future<Output = Result<(), TransportError>> + Send + '_;
}

/// Target URL, parsed once. The scheme picks plain HTTP or TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Http(Url),
    Https(Url),
    /// Unparseable URL or unsupported scheme. Kept instead of rejected so
    /// construction never fails; every request to it errors out.
    Invalid(String),
}

impl Endpoint {
    pub fn parse(raw: &str) -> Self {
        match Url::parse(raw) {
            Ok(url) if url.scheme() == "http" => Endpoint::Http(url),
            Ok(url) if url.scheme() == "https" => Endpoint::Https(url),
            Ok(url) => Endpoint::Invalid(format!(
                "unsupported scheme {:?} in {raw}",
                url.scheme()
            )),
            Err(e) => Endpoint::Invalid(format!("{raw:?}: {e}")),
        }
    }

    pub fn url(&self) -> Option<&Url> {
        match self {
            Endpoint::Http(url) | Endpoint::Https(url) => Some(url),
            Endpoint::Invalid(_) => None,
        }
    }

    pub fn is_https(&self) -> bool {
        matches!(self, Endpoint::Https(_))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Http(url) | Endpoint::Https(url) => write!(f, "{url}"),
            Endpoint::Invalid(reason) => write!(f, "invalid endpoint ({reason})"),
        }
    }
}

/// Request options reused for every flush: client, URL and headers.
struct Target {
    client: Client,
    url: Url,
    headers: HeaderMap,
}

/// `PUT`s each body to the configured endpoint with `reqwest`.
pub struct HttpTransport {
    endpoint: Endpoint,
    target: Result<Target, String>,
}

impl HttpTransport {
    pub fn new(endpoint: Endpoint, headers: &[(String, String)]) -> Self {
        let target = build_target(&endpoint, headers);
        if let Err(reason) = &target {
            debug!(%endpoint, reason = %reason, "requests to this endpoint will be dropped");
        }
        Self { endpoint, target }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    async fn put(&self, body: Bytes) -> Result<(), TransportError> {
        let target = self
            .target
            .as_ref()
            .map_err(|reason| TransportError::InvalidEndpoint(reason.clone()))?;

        // Status and body of the response are never read.
        let _response = target
            .client
            .put(target.url.clone())
            .headers(target.headers.clone())
            .body(body)
            .send()
            .await?;
        Ok(())
    }
}

fn build_target(endpoint: &Endpoint, headers: &[(String, String)]) -> Result<Target, String> {
    let url = endpoint
        .url()
        .cloned()
        .ok_or_else(|| endpoint.to_string())?;
    let headers = header_map(headers)?;

    // Already installed is fine; the provider is process-wide.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let client = Client::builder()
        .https_only(endpoint.is_https())
        .build()
        .map_err(|e| format!("failed to build HTTP client: {e}"))?;

    Ok(Target {
        client,
        url,
        headers,
    })
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, String> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::try_from(name.as_str())
            .map_err(|e| format!("invalid header name {name:?}: {e}"))?;
        let value = HeaderValue::try_from(value.as_str())
            .map_err(|e| format!("invalid value for header {name}: {e}"))?;
        map.append(name, value);
    }
    Ok(map)
}
