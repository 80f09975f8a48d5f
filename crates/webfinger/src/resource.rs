use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::WebFingerError;
use crate::WEBFINGER_PATH;

/// A WebFinger resource: an absolute URI such as `acct:bob@example.com`,
/// `mailto:bob@example.com` or `https://example.com/bob`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resource {
    url: Url,
}

impl Resource {
    /// Parse caller input into a resource.
    ///
    /// Absolute URLs are taken as-is. Scheme-less `local@domain` input is
    /// read as an `acct:` URI. Anything else is rejected.
    pub fn parse(raw: &str) -> Result<Self, WebFingerError> {
        let invalid = || WebFingerError::InvalidResource {
            input: raw.to_string(),
        };

        match Url::parse(raw) {
            Ok(url) => Ok(Self { url }),
            Err(url::ParseError::RelativeUrlWithoutBase) if is_email_like(raw) => {
                let url = Url::parse(&format!("acct:{raw}")).map_err(|_| invalid())?;
                Ok(Self { url })
            }
            Err(_) => Err(invalid()),
        }
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Host component of a hierarchical URL, without port.
    pub fn host(&self) -> Option<&str> {
        self.url.host_str().filter(|h| !h.is_empty())
    }

    /// The opaque part of a non-hierarchical URI (`bob@example.com` in
    /// `acct:bob@example.com`).
    pub fn opaque(&self) -> Option<&str> {
        self.url.cannot_be_a_base().then(|| self.url.path())
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }

    pub fn as_url(&self) -> &Url {
        &self.url
    }

    /// Canonical string form, sent as the `resource` query parameter and
    /// expected back as the JRD subject.
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// The host a WebFinger query for this resource goes to.
    ///
    /// Returns an empty string when there is none (e.g. `file:///x`);
    /// callers must treat that as a failed lookup.
    pub fn query_host(&self) -> String {
        if let Some(host) = self.host() {
            return match self.url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            };
        }

        match self.scheme() {
            "acct" | "mailto" => self
                .url
                .path()
                .split_once('@')
                .map(|(_, domain)| domain.to_string())
                .unwrap_or_default(),
            _ => String::new(),
        }
    }

    /// Build `{scheme}://{host}/.well-known/webfinger?resource=..&rel=..`.
    ///
    /// `host` overrides [`Resource::query_host`] when given and non-empty.
    /// `rel` parameters are emitted in the given order, duplicates included.
    pub fn webfinger_url<S: AsRef<str>>(
        &self,
        scheme: &str,
        host: Option<&str>,
        rels: &[S],
    ) -> Result<Url, WebFingerError> {
        let host = match host {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => self.query_host(),
        };
        if host.is_empty() {
            return Err(WebFingerError::NoQueryHost {
                resource: self.to_string(),
            });
        }

        let mut url = endpoint_url(scheme, &host, WEBFINGER_PATH)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("resource", self.as_str());
            for rel in rels {
                query.append_pair("rel", rel.as_ref());
            }
        }
        Ok(url)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = WebFingerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// `{scheme}://{authority}{path}` where `authority` may only be a host with an
/// optional port. Userinfo, path, query or fragment characters in it are
/// rejected instead of being read as URL structure.
pub(crate) fn endpoint_url(
    scheme: &str,
    authority: &str,
    path: &str,
) -> Result<Url, WebFingerError> {
    let invalid = || WebFingerError::InvalidQueryHost {
        host: authority.to_string(),
    };
    let (host, port) = split_authority(authority).ok_or_else(invalid)?;

    let mut url = Url::parse(&format!("{scheme}://localhost/"))?;
    url.set_host(Some(host)).map_err(|_| invalid())?;
    if port.is_some() {
        url.set_port(port).map_err(|_| invalid())?;
    }
    url.set_path(path);
    Ok(url)
}

/// Split `host[:port]`; IPv6 literals keep their brackets.
fn split_authority(authority: &str) -> Option<(&str, Option<u16>)> {
    let (host, port) = match authority.rfind(':') {
        Some(i) if !authority[i..].contains(']') => {
            (&authority[..i], Some(&authority[i + 1..]))
        }
        _ => (authority, None),
    };
    if host.is_empty() || (host.contains(':') && !host.starts_with('[')) {
        return None;
    }
    let port = port.map(str::parse::<u16>).transpose().ok()?;
    Some((host, port))
}

/// `local@domain` with exactly one `@` and both sides non-empty.
fn is_email_like(raw: &str) -> bool {
    match raw.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}
