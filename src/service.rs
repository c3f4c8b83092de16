//! Token service
//!
//! Returns a usable access token for a client, reusing the stored one while it
//! is valid, refreshing it when it expired, and otherwise running the grant
//! the client is configured for.

use tracing::debug;

use crate::client::GrantType;
use crate::grant::GrantService;
use crate::token::AccessToken;
use crate::{Error, Result};

/// Client-facing access token facade over a [`GrantService`]
pub struct TokenService {
    grants: GrantService,
}

impl TokenService {
    /// Wrap a grant service
    #[must_use]
    pub fn new(grants: GrantService) -> Self {
        Self { grants }
    }

    /// The underlying grant service
    pub fn grants(&mut self) -> &mut GrantService {
        &mut self.grants
    }

    /// Valid access token for `client_id`
    pub async fn access_token(&mut self, client_id: &str) -> Result<AccessToken> {
        let client = self.grants.client(client_id)?;

        if let Some(stored) = self.grants.retrieve_access_token(client_id)? {
            if !stored.is_expired() {
                debug!(client = %client_id, "Using stored access token");
                return Ok(stored);
            }
            if stored.refresh_token.is_some() {
                debug!(client = %client_id, "Stored access token expired, refreshing");
                return self.grants.refresh_access_token(client_id).await;
            }
        }

        match client.grant_type {
            GrantType::ClientCredentials => self.grants.client_credentials(client_id).await,
            GrantType::ResourceOwner => {
                let credentials = client.credentials.as_ref().ok_or_else(|| {
                    Error::Config(format!("Client '{client_id}' has no resource owner credentials"))
                })?;
                self.grants
                    .resource_owner_password(client_id, &credentials.username, &credentials.password)
                    .await
            }
            GrantType::AuthorizationCode => Err(Error::AuthorizationRequired(client_id.to_string())),
        }
    }

    /// Drop the stored token for `client_id`
    pub fn clear_access_token(&self, client_id: &str) -> Result<()> {
        self.grants.clear_access_token(client_id)
    }
}
