//! OAuth2 providers and the per-service provider cache
//!
//! A [`Provider`] binds one client's endpoints, credentials and scopes to the
//! collaborators that perform the actual token requests. Building one is not
//! free (collaborators are constructed, the redirect URI is resolved), so a
//! [`ProviderCache`] keeps at most one per client identifier for the lifetime
//! of its owner. The cache is never invalidated.

mod grant;
mod http;
mod parser;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};
use url::Url;

pub use grant::{Grant, StandardGrantFactory};
pub use http::ReqwestHttpClient;
pub use parser::JsonTokenParser;

use crate::client::{ClientConfig, ClientLookup};
use crate::collaborator::{
    Collaborators, GrantFactory, TokenHttpClient, TokenResponseParser,
};
use crate::redirect::RedirectUriResolver;
use crate::token::AccessToken;
use crate::{Error, Result};

/// Runtime object for one configured client
pub struct Provider {
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
    authorization_url: Url,
    token_url: Url,
    resource_owner_url: Option<Url>,
    scopes: Vec<String>,
    scope_separator: String,
    collaborators: Collaborators,
    http_client: Arc<dyn TokenHttpClient>,
    grant_factory: Arc<dyn GrantFactory>,
    token_parser: Arc<dyn TokenResponseParser>,
}

impl Provider {
    /// Build a provider for `client`, constructing its configured collaborators
    pub fn from_config(client: &ClientConfig, redirect_uri: String) -> Result<Self> {
        let mut collaborators = Collaborators::default();
        for factory in client.collaborators.values() {
            collaborators.insert(factory.construct()?);
        }
        Self::new(client, redirect_uri, collaborators)
    }

    /// Build a provider from already constructed collaborators; empty roles
    /// fall back to [`ReqwestHttpClient::new`], [`StandardGrantFactory`] and
    /// [`JsonTokenParser`]
    pub fn new(
        client: &ClientConfig,
        redirect_uri: String,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let http_client: Arc<dyn TokenHttpClient> = match &collaborators.http_client {
            Some(http_client) => Arc::clone(http_client),
            None => Arc::new(ReqwestHttpClient::new()?),
        };
        let grant_factory = collaborators
            .grant_factory
            .clone()
            .unwrap_or_else(|| Arc::new(StandardGrantFactory));
        let token_parser = collaborators
            .token_parser
            .clone()
            .unwrap_or_else(|| Arc::new(JsonTokenParser));

        Ok(Self {
            client_id: client.client_id.clone(),
            client_secret: client.client_secret.clone(),
            redirect_uri,
            authorization_url: client.authorization_url.clone(),
            token_url: client.token_url.clone(),
            resource_owner_url: client.resource_owner_url.clone(),
            scopes: client.scopes.clone(),
            scope_separator: client.scope_separator.clone(),
            collaborators,
            http_client,
            grant_factory,
            token_parser,
        })
    }

    /// OAuth2 `client_id`
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Redirect URI resolved when the provider was built
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Token endpoint
    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// Configured scopes
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Scopes joined with the client's separator
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(&self.scope_separator)
    }

    /// Collaborators the client configured explicitly
    #[must_use]
    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Authorization endpoint URL with the code-flow query parameters
    pub fn authorization_url(&self, state: &str, code_challenge: Option<&str>) -> Url {
        let mut url = self.authorization_url.clone();
        {
            let mut params = url.query_pairs_mut();
            params.append_pair("response_type", "code");
            params.append_pair("client_id", &self.client_id);
            params.append_pair("redirect_uri", &self.redirect_uri);
            params.append_pair("state", state);

            if !self.scopes.is_empty() {
                params.append_pair("scope", &self.scope_string());
            }

            if let Some(challenge) = code_challenge {
                params.append_pair("code_challenge", challenge);
                params.append_pair("code_challenge_method", "S256");
            }
        }
        url
    }

    /// Exchange `grant` at the token endpoint
    pub async fn get_access_token(&self, grant: &Grant) -> Result<AccessToken> {
        let mut form = self.grant_factory.token_request_params(grant)?;
        form.push(("client_id".to_string(), self.client_id.clone()));
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret".to_string(), secret.clone()));
        }
        form.push(("redirect_uri".to_string(), self.redirect_uri.clone()));
        if grant.requests_scope() && !self.scopes.is_empty() {
            form.push(("scope".to_string(), self.scope_string()));
        }

        debug!(client_id = %self.client_id, ?grant, "Requesting access token");
        let response = self
            .http_client
            .post_form(self.token_url.as_str(), &form)
            .await?;

        let token = self.token_parser.parse(&response)?;
        info!(
            client_id = %self.client_id,
            grant_type = grant.grant_type(),
            expires_in = ?token.time_until_expiry(),
            "Access token issued"
        );
        Ok(token)
    }

    /// Fetch the resource owner's details with `token`
    pub async fn resource_owner_details(&self, token: &AccessToken) -> Result<Value> {
        let url = self.resource_owner_url.as_ref().ok_or_else(|| {
            Error::Config(format!(
                "Client '{}' has no resource_owner_url",
                self.client_id
            ))
        })?;

        let response = self
            .http_client
            .get_authorized(url.as_str(), &token.authorization_header())
            .await?;

        if !response.is_success() {
            return Err(Error::token_endpoint(
                format!("HTTP {}", response.status),
                Some("Resource owner request failed".to_string()),
            ));
        }

        Ok(serde_json::from_slice(&response.body)?)
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("token_url", &self.token_url.as_str())
            .field("scopes", &self.scope_string())
            .field("collaborators", &self.collaborators)
            .finish_non_exhaustive()
    }
}

/// Providers built so far, keyed by client identifier
#[derive(Debug, Default)]
pub struct ProviderCache {
    providers: HashMap<String, Arc<Provider>>,
}

impl ProviderCache {
    /// Empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached provider for `client_id`, if one was built
    #[must_use]
    pub fn get(&self, client_id: &str) -> Option<Arc<Provider>> {
        self.providers.get(client_id).cloned()
    }

    /// Cached provider for `client_id`, building and caching it on first use.
    /// Lookup and construction errors are returned as-is and leave the cache
    /// untouched.
    pub fn get_or_build(
        &mut self,
        client_id: &str,
        clients: &dyn ClientLookup,
        redirect: &dyn RedirectUriResolver,
    ) -> Result<Arc<Provider>> {
        if let Some(provider) = self.providers.get(client_id) {
            return Ok(Arc::clone(provider));
        }

        let client = clients.get_client(client_id)?;
        let redirect_uri = redirect.redirect_uri(&client)?;
        let provider = Arc::new(Provider::from_config(&client, redirect_uri)?);

        debug!(client = %client_id, collaborators = ?provider.collaborators(), "Built provider");
        self.providers
            .insert(client_id.to_string(), Arc::clone(&provider));
        Ok(provider)
    }

    /// Whether a provider is cached for `client_id`
    #[must_use]
    pub fn contains(&self, client_id: &str) -> bool {
        self.providers.contains_key(client_id)
    }

    /// Number of cached providers
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
