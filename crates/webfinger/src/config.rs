//! Lookup configuration.
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `legacy_support` | `false` | Fall back to host-meta + LRDD |
//! | `insecure_fallback` | `false` | Retry over `http` when `https` is refused |
//! | `fallback_host` | `None` | WebFist server queried last |
//! | `subject_verification` | `PrimaryOnly` | Which strategies check the JRD subject |
//! | `scheme` | `"https"` | Scheme of every URL the client builds |
//! | `max_redirects` | `10` | Redirects followed per request |
//! | `request_timeout` | `None` | Per-request deadline |
//! | `lookup_timeout` | `None` | Deadline across all strategies |
//!
//! ```
//! use webfinger::{ClientConfig, WEBFIST_DEFAULT_SERVER};
//!
//! let config = ClientConfig {
//!     legacy_support: true,
//!     fallback_host: Some(WEBFIST_DEFAULT_SERVER.to_string()),
//!     ..Default::default()
//! };
//! assert_eq!(config.max_redirects, 10);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Redirects followed per request before giving up.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Which lookup strategies require the returned subject to equal the
/// requested resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectVerification {
    /// Only documents from `/.well-known/webfinger` on the resource's host.
    #[default]
    PrimaryOnly,
    /// Every strategy, including legacy LRDD and WebFist.
    AllStrategies,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Fall back to the pre-RFC 7033 host-meta / LRDD flow.
    pub legacy_support: bool,

    /// Retry a refused `https` request once over plain `http`.
    pub insecure_fallback: bool,

    /// WebFist server to ask when the resource's host fails.
    /// `None` or an empty string disables the fallback.
    pub fallback_host: Option<String>,

    pub subject_verification: SubjectVerification,

    /// Scheme used for the WebFinger and host-meta URLs the client builds.
    pub scheme: String,

    pub max_redirects: usize,

    #[serde(with = "opt_secs")]
    pub request_timeout: Option<Duration>,

    /// Overall deadline. On expiry the lookup fails with
    /// [`WebFingerError::Cancelled`](crate::WebFingerError::Cancelled).
    #[serde(with = "opt_secs")]
    pub lookup_timeout: Option<Duration>,

    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            legacy_support: false,
            insecure_fallback: false,
            fallback_host: None,
            subject_verification: SubjectVerification::default(),
            scheme: "https".to_string(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            request_timeout: None,
            lookup_timeout: None,
            user_agent: concat!("webfinger-rs/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// The configured WebFist server, if the fallback is enabled.
    pub fn webfist_server(&self) -> Option<&str> {
        self.fallback_host.as_deref().filter(|h| !h.is_empty())
    }

    pub(crate) fn verifies(&self, primary: bool) -> bool {
        match self.subject_verification {
            SubjectVerification::PrimaryOnly => primary,
            SubjectVerification::AllStrategies => true,
            SubjectVerification::Disabled => false,
        }
    }
}

/// Durations as (fractional) seconds.
mod opt_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(d)?;
        secs.map(|s| Duration::try_from_secs_f64(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
