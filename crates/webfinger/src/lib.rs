//! WebFinger (RFC 7033) resource discovery.
//!
//! Resolves an email-like handle or absolute URL into a JRD descriptor
//! published by the resource's host. Lookups try, in order:
//!
//! 1. `/.well-known/webfinger` on the resource's host
//! 2. the legacy host-meta → LRDD template flow (if enabled)
//! 3. a WebFist server (if one is configured)
//!
//! Legacy XRD documents are converted to the JRD model on the way in.

mod client;
mod config;
mod error;
mod jrd;
mod resource;
mod transport;
mod xrd;

pub use client::Client;
pub use config::{ClientConfig, SubjectVerification, DEFAULT_MAX_REDIRECTS};
pub use error::{ErrorKind, WebFingerError};
pub use jrd::{parse_jrd, Descriptor, Link, Properties, Property, DEFAULT_TITLE_LANG};
pub use resource::Resource;
pub use transport::{
    fetch_descriptor, parse_descriptor, HttpResponse, HttpTransport, ReqwestTransport, TransportError,
    TransportErrorKind, DOWNGRADE_TRIGGERS,
};
pub use xrd::{parse_xrd, Xrd, XrdLink, XrdProperty, XrdTitle};

/// Path of the WebFinger query endpoint.
pub const WEBFINGER_PATH: &str = "/.well-known/webfinger";

/// Legacy host-meta endpoints, in the order they are tried.
pub const HOST_META_PATHS: [&str; 2] = ["/.well-known/host-meta.json", "/.well-known/host-meta"];

/// Link relation of the LRDD template in host-meta documents.
pub const LRDD_REL: &str = "lrdd";

/// Link relation WebFist servers use to point at the delegated descriptor.
pub const WEBFIST_REL: &str = "http://webfist.org/spec/rel";

/// Public WebFist server. Never used unless a caller configures it.
pub const WEBFIST_DEFAULT_SERVER: &str = "webfist.org";
