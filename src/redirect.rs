//! Redirect URI derivation
//!
//! The authorization server redirects back to the route that started the
//! grant. The hosting framework exposes that route through [`RequestContext`];
//! [`CurrentRouteRedirect`] turns it into an absolute callback URL.

use std::sync::Arc;

use axum::http::header::HOST;
use axum::http::request::Parts;
use url::Url;

use crate::client::ClientConfig;
use crate::{Error, Result};

/// Header set by reverse proxies terminating TLS
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// The in-flight inbound request, as seen by the grant engine
pub trait RequestContext: Send + Sync {
    /// Absolute URL of the route currently being served
    fn current_url(&self) -> Result<Url>;
}

/// Derives the redirect URI for a client
pub trait RedirectUriResolver: Send + Sync {
    /// Absolute callback URL to register with the authorization request
    fn redirect_uri(&self, client: &ClientConfig) -> Result<String>;
}

/// Snapshot of an inbound request's absolute route URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequest {
    url: Url,
}

impl InboundRequest {
    /// Wrap an absolute URL; query and fragment are dropped
    pub fn new(mut url: Url) -> Result<Self> {
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(Error::RequestContext(format!("Not an absolute URL: {url}")));
        }
        url.set_query(None);
        url.set_fragment(None);
        Ok(Self { url })
    }

    /// Parse an absolute URL string
    pub fn parse(url: &str) -> Result<Self> {
        Self::new(Url::parse(url)?)
    }

    /// Build from request parts. The scheme comes from `X-Forwarded-Proto`,
    /// then the request URI, then `default_scheme`; the authority from the
    /// `Host` header, then the request URI.
    pub fn from_parts(parts: &Parts, default_scheme: &str) -> Result<Self> {
        let scheme = parts
            .headers
            .get(X_FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .or_else(|| parts.uri.scheme_str())
            .unwrap_or(default_scheme);

        let host = parts
            .headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| parts.uri.authority().map(axum::http::uri::Authority::as_str))
            .ok_or_else(|| Error::RequestContext("Request has no Host".to_string()))?;

        Self::parse(&format!("{scheme}://{host}{}", parts.uri.path()))
    }

    /// The normalized URL
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl RequestContext for InboundRequest {
    fn current_url(&self) -> Result<Url> {
        Ok(self.url.clone())
    }
}

/// Redirects every client back to the current route
pub struct CurrentRouteRedirect {
    context: Arc<dyn RequestContext>,
}

impl CurrentRouteRedirect {
    /// Resolver reading from `context`
    pub fn new(context: Arc<dyn RequestContext>) -> Self {
        Self { context }
    }
}

impl RedirectUriResolver for CurrentRouteRedirect {
    fn redirect_uri(&self, _client: &ClientConfig) -> Result<String> {
        Ok(self.context.current_url()?.to_string())
    }
}
