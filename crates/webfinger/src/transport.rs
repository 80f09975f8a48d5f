//! HTTP fetch of descriptor documents.
//!
//! [`HttpTransport`] is the seam between the lookup logic and the network.
//! [`ReqwestTransport`] is the production implementation; tests plug in an
//! in-memory one.

use std::error::Error as StdError;
use std::fmt;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::WebFingerError;
use crate::jrd::{parse_jrd, Descriptor};
use crate::xrd::parse_xrd;

const ACCEPT_DESCRIPTORS: &str =
    "application/jrd+json, application/json;q=0.9, application/xrd+xml;q=0.8, application/xml;q=0.5";

/// Failures that trigger the `https` → `http` retry when insecure fallback
/// is enabled.
pub const DOWNGRADE_TRIGGERS: &[TransportErrorKind] = &[TransportErrorKind::ConnectionRefused];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    ConnectionRefused,
    Connect,
    Timeout,
    TooManyRedirects,
    Body,
    Request,
}

impl TransportErrorKind {
    pub fn triggers_downgrade(self) -> bool {
        DOWNGRADE_TRIGGERS.contains(&self)
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ConnectionRefused => "connection refused",
            Self::Connect => "connection failed",
            Self::Timeout => "timed out",
            Self::TooManyRedirects => "too many redirects",
            Self::Body => "failed to read body",
            Self::Request => "request failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_redirect() {
            TransportErrorKind::TooManyRedirects
        } else if err.is_connect() {
            if is_refused(&err) {
                TransportErrorKind::ConnectionRefused
            } else {
                TransportErrorKind::Connect
            }
        } else if err.is_body() || err.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Request
        };
        Self::new(kind, error_chain(&err))
    }
}

/// Walk the source chain looking for a refused TCP connection.
fn is_refused(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        current = e.source();
    }
    false
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        message.push_str(": ");
        message.push_str(&e.to_string());
        current = e.source();
    }
    message
}

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// GET `url`, following redirects, and read the whole body.
    async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Wrap an existing client. Its redirect policy and timeouts apply as-is.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, ACCEPT_DESCRIPTORS)
            .send()
            .await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Fetch `url` and parse the body as a JRD or XRD descriptor.
///
/// With `insecure_fallback`, an `https` request that fails with one of
/// [`DOWNGRADE_TRIGGERS`] is retried once over `http`.
pub async fn fetch_descriptor(
    transport: &dyn HttpTransport,
    url: &Url,
    insecure_fallback: bool,
) -> Result<Descriptor, WebFingerError> {
    debug!(%url, "GET");
    let (url, response) = match transport.get(url).await {
        Ok(response) => (url.clone(), response),
        Err(err)
            if insecure_fallback && url.scheme() == "https" && err.kind.triggers_downgrade() =>
        {
            let mut http_url = url.clone();
            // https → http never fails for special schemes
            let _ = http_url.set_scheme("http");
            warn!(%url, error = %err, "retrying over http");
            debug!(url = %http_url, "GET");
            let response = transport
                .get(&http_url)
                .await
                .map_err(|source| WebFingerError::Transport {
                    url: http_url.to_string(),
                    source,
                })?;
            (http_url, response)
        }
        Err(source) => {
            return Err(WebFingerError::Transport {
                url: url.to_string(),
                source,
            })
        }
    };

    if !response.status.is_success() {
        return Err(WebFingerError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    parse_descriptor(response.content_type.as_deref().unwrap_or(""), &response.body)
}

/// Parse a response body according to its `Content-Type`.
pub fn parse_descriptor(content_type: &str, body: &[u8]) -> Result<Descriptor, WebFingerError> {
    let ct = content_type.to_ascii_lowercase();
    if ct.contains("json") {
        parse_jrd(body)
    } else if ct.contains("xml") {
        Ok(parse_xrd(body)?.to_jrd())
    } else {
        Err(WebFingerError::UnsupportedContentType(ct))
    }
}
