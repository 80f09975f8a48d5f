use std::sync::Arc;

use tracing::{debug, info, warn};
use url::{form_urlencoded, Url};

use crate::config::ClientConfig;
use crate::error::WebFingerError;
use crate::jrd::Descriptor;
use crate::resource::{endpoint_url, Resource};
use crate::transport::{fetch_descriptor, HttpTransport, ReqwestTransport};
use crate::{HOST_META_PATHS, LRDD_REL, WEBFIST_REL};

const NO_RELS: &[&str] = &[];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    WebFinger,
    Legacy,
    WebFist,
}

/// A WebFinger client.
///
/// Holds no per-lookup state; one client can serve concurrent lookups.
#[derive(Clone)]
pub struct Client {
    config: ClientConfig,
    transport: Arc<dyn HttpTransport>,
}

impl Client {
    /// Build a client backed by reqwest.
    pub fn new(config: ClientConfig) -> Result<Self, WebFingerError> {
        let transport = ReqwestTransport::new(&config).map_err(WebFingerError::HttpClient)?;
        Ok(Self::with_transport(config, transport))
    }

    pub fn with_transport(config: ClientConfig, transport: impl HttpTransport + 'static) -> Self {
        Self {
            config,
            transport: Arc::new(transport),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Parse `raw` and look it up. See [`Client::resolve`].
    pub async fn lookup<S: AsRef<str> + Sync>(
        &self,
        raw: &str,
        rels: &[S],
    ) -> Result<Descriptor, WebFingerError> {
        let resource = Resource::parse(raw)?;
        self.resolve(&resource, rels).await
    }

    /// Resolve a resource to its descriptor.
    ///
    /// Tries the WebFinger endpoint of the resource's host, then (if enabled)
    /// the legacy host-meta flow, then (if configured) the WebFist server.
    /// The first strategy to succeed wins; if all fail, the last error is
    /// returned. `rels` only applies to the first strategy.
    pub async fn resolve<S: AsRef<str> + Sync>(
        &self,
        resource: &Resource,
        rels: &[S],
    ) -> Result<Descriptor, WebFingerError> {
        match self.config.lookup_timeout {
            Some(limit) => tokio::time::timeout(limit, self.run_strategies(resource, rels))
                .await
                .map_err(|_| WebFingerError::Cancelled(limit))?,
            None => self.run_strategies(resource, rels).await,
        }
    }

    fn strategies(&self) -> Vec<Strategy> {
        let mut strategies = vec![Strategy::WebFinger];
        if self.config.legacy_support {
            strategies.push(Strategy::Legacy);
        }
        if self.config.webfist_server().is_some() {
            strategies.push(Strategy::WebFist);
        }
        strategies
    }

    async fn run_strategies<S: AsRef<str> + Sync>(
        &self,
        resource: &Resource,
        rels: &[S],
    ) -> Result<Descriptor, WebFingerError> {
        debug!(%resource, "looking up");

        let mut last_error = None;
        for strategy in self.strategies() {
            let result = match strategy {
                Strategy::WebFinger => self.webfinger_lookup(resource, rels).await,
                Strategy::Legacy => self.legacy_lookup(resource).await,
                Strategy::WebFist => match self.config.webfist_server() {
                    Some(server) => self.webfist_lookup(resource, server).await,
                    None => continue,
                },
            }
            .and_then(|jrd| self.verify_subject(strategy, resource, jrd));

            match result {
                Ok(jrd) => {
                    info!(%resource, ?strategy, "resolved");
                    return Ok(jrd);
                }
                Err(err) => {
                    warn!(%resource, ?strategy, error = %err, "lookup failed");
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or(WebFingerError::NotFound))
    }

    fn verify_subject(
        &self,
        strategy: Strategy,
        resource: &Resource,
        jrd: Descriptor,
    ) -> Result<Descriptor, WebFingerError> {
        let primary = strategy == Strategy::WebFinger;
        if self.config.verifies(primary) && jrd.subject != resource.as_str() {
            return Err(WebFingerError::SubjectMismatch {
                expected: resource.to_string(),
                actual: jrd.subject,
            });
        }
        Ok(jrd)
    }

    async fn fetch(&self, url: &Url) -> Result<Descriptor, WebFingerError> {
        fetch_descriptor(self.transport.as_ref(), url, self.config.insecure_fallback).await
    }

    /// RFC 7033 query against the resource's own host.
    pub async fn webfinger_lookup<S: AsRef<str> + Sync>(
        &self,
        resource: &Resource,
        rels: &[S],
    ) -> Result<Descriptor, WebFingerError> {
        let url = resource.webfinger_url(&self.config.scheme, None, rels)?;
        self.fetch(&url).await
    }

    /// Host-meta URLs for `host`, in the order they are tried.
    pub fn legacy_host_meta_urls(&self, host: &str) -> Result<Vec<Url>, WebFingerError> {
        HOST_META_PATHS
            .iter()
            .map(|path| endpoint_url(&self.config.scheme, host, path))
            .collect()
    }

    /// Fetch the host metadata of `host` and return its LRDD template.
    pub async fn legacy_template(&self, host: &str) -> Result<String, WebFingerError> {
        let host_meta = self.find_host_meta(host).await?;
        let link = host_meta
            .link_by_rel(LRDD_REL)
            .ok_or(WebFingerError::MissingLrddLink)?;
        let template = link.template().ok_or(WebFingerError::MissingLrddTemplate)?;
        Ok(template.to_string())
    }

    async fn find_host_meta(&self, host: &str) -> Result<Descriptor, WebFingerError> {
        for url in self.legacy_host_meta_urls(host)? {
            match self.fetch(&url).await {
                Ok(jrd) => return Ok(jrd),
                Err(err) => debug!(%url, error = %err, "no host metadata"),
            }
        }
        Err(WebFingerError::HostMetaNotFound {
            host: host.to_string(),
        })
    }

    /// Original WebFinger flow: host-meta → LRDD template → descriptor.
    pub async fn legacy_lookup(&self, resource: &Resource) -> Result<Descriptor, WebFingerError> {
        let host = resource.query_host();
        if host.is_empty() {
            return Err(WebFingerError::NoQueryHost {
                resource: resource.to_string(),
            });
        }

        let template = self.legacy_template(&host).await?;
        let encoded: String =
            form_urlencoded::byte_serialize(resource.as_str().as_bytes()).collect();
        let url = Url::parse(&template.replacen("{uri}", &encoded, 1))?;
        debug!(%template, %url, "LRDD");

        self.fetch(&url).await
    }

    /// Ask a WebFist server for the resource and follow its delegation link.
    pub async fn webfist_lookup(
        &self,
        resource: &Resource,
        server: &str,
    ) -> Result<Descriptor, WebFingerError> {
        if server.is_empty() {
            return Err(WebFingerError::NoQueryHost {
                resource: resource.to_string(),
            });
        }

        let url = resource.webfinger_url(&self.config.scheme, Some(server), NO_RELS)?;
        let delegation = self.fetch(&url).await?;
        let href = delegation
            .link_by_rel(WEBFIST_REL)
            .and_then(|link| link.href.as_deref())
            .filter(|href| !href.is_empty())
            .ok_or(WebFingerError::MissingWebFistLink)?;

        let target = Url::parse(href)?;
        debug!(url = %target, "found WebFist link");
        self.fetch(&target).await
    }
}
