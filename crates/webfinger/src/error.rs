use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum WebFingerError {
    #[error("Invalid resource {input:?}: not an absolute URL or email-like identifier")]
    InvalidResource { input: String },

    #[error("Resource {resource} has no host to query")]
    NoQueryHost { resource: String },

    #[error("Invalid query host {host:?}")]
    InvalidQueryHost { host: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] TransportError),

    #[error("{url} returned HTTP {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Invalid JRD document: {0}")]
    InvalidJrd(#[from] serde_json::Error),

    #[error("Invalid XRD document: {0}")]
    InvalidXrd(String),

    #[error("Host metadata not found for {host}")]
    HostMetaNotFound { host: String },

    #[error("Cannot find the LRDD link in the host metadata")]
    MissingLrddLink,

    #[error("Cannot find the template in the LRDD link")]
    MissingLrddTemplate,

    #[error("No secondary discovery link")]
    MissingWebFistLink,

    #[error("JRD subject {actual:?} does not match the resource {expected}")]
    SubjectMismatch { expected: String, actual: String },

    #[error("JRD not found")]
    NotFound,

    #[error("Lookup cancelled after {0:?}")]
    Cancelled(std::time::Duration),
}

/// Coarse failure categories, for callers that map errors onto exit codes
/// or user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Identifier,
    Transport,
    HttpStatus,
    UnsupportedContentType,
    DocumentParse,
    Protocol,
    Cancelled,
}

impl WebFingerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidResource { .. } | Self::InvalidQueryHost { .. } => ErrorKind::Identifier,
            Self::Transport { .. } | Self::HttpClient(_) => ErrorKind::Transport,
            Self::HttpStatus { .. } => ErrorKind::HttpStatus,
            Self::UnsupportedContentType(_) => ErrorKind::UnsupportedContentType,
            Self::InvalidJrd(_) | Self::InvalidXrd(_) => ErrorKind::DocumentParse,
            Self::NoQueryHost { .. }
            | Self::InvalidUrl(_)
            | Self::HostMetaNotFound { .. }
            | Self::MissingLrddLink
            | Self::MissingLrddTemplate
            | Self::MissingWebFistLink
            | Self::SubjectMismatch { .. }
            | Self::NotFound => ErrorKind::Protocol,
            Self::Cancelled(_) => ErrorKind::Cancelled,
        }
    }
}
