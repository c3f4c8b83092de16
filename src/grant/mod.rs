//! Grant orchestration
//!
//! [`GrantService`] is the shared base of every grant flow: it resolves client
//! configuration, hands out cached providers and persists issued tokens. The
//! flows themselves live in the submodules as further `impl GrantService`
//! blocks, one per grant type.
//!
//! A service is meant to live for one logical operation (typically one inbound
//! request). Its provider cache is owned, unsynchronized and dropped with it.

mod authorization_code;
mod client_credentials;
mod refresh_token;
mod resource_owner;

use std::sync::Arc;

use tracing::debug;

pub use authorization_code::{AuthorizationRequest, PendingAuthorization};

use crate::Result;
use crate::client::{ClientConfig, ClientLookup};
use crate::provider::{Provider, ProviderCache};
use crate::redirect::RedirectUriResolver;
use crate::token::{AccessToken, TokenStore};

/// Namespace of stored access tokens
pub const ACCESS_TOKEN_KEY_PREFIX: &str = "oauth2_client_access_token";

/// Token store key for `client_id`
#[must_use]
pub fn access_token_key(client_id: &str) -> String {
    format!("{ACCESS_TOKEN_KEY_PREFIX}-{client_id}")
}

/// Base service shared by all grant flows
pub struct GrantService {
    clients: Arc<dyn ClientLookup>,
    store: Arc<dyn TokenStore>,
    redirect: Arc<dyn RedirectUriResolver>,
    providers: ProviderCache,
}

impl GrantService {
    /// Create a service with an empty provider cache
    pub fn new(
        clients: Arc<dyn ClientLookup>,
        store: Arc<dyn TokenStore>,
        redirect: Arc<dyn RedirectUriResolver>,
    ) -> Self {
        Self {
            clients,
            store,
            redirect,
            providers: ProviderCache::new(),
        }
    }

    /// Configuration of `client_id`
    pub fn client(&self, client_id: &str) -> Result<Arc<ClientConfig>> {
        self.clients.get_client(client_id)
    }

    /// Provider for `client_id`, built on first use and cached for the
    /// lifetime of this service
    pub fn get_provider(&mut self, client_id: &str) -> Result<Arc<Provider>> {
        self.providers
            .get_or_build(client_id, self.clients.as_ref(), self.redirect.as_ref())
    }

    /// Providers built by this service
    #[must_use]
    pub fn providers(&self) -> &ProviderCache {
        &self.providers
    }

    /// Persist `token` for `client_id`, overwriting any previous token
    pub fn store_access_token(&self, client_id: &str, token: &AccessToken) -> Result<()> {
        debug!(client = %client_id, "Storing access token");
        self.store.set(&access_token_key(client_id), token)
    }

    /// Token stored for `client_id`
    pub fn retrieve_access_token(&self, client_id: &str) -> Result<Option<AccessToken>> {
        self.store.get(&access_token_key(client_id))
    }

    /// Remove the token stored for `client_id`
    pub fn clear_access_token(&self, client_id: &str) -> Result<()> {
        debug!(client = %client_id, "Clearing access token");
        self.store.delete(&access_token_key(client_id))
    }
}
