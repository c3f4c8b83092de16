//! Authorization Code grant with PKCE (RFC 7636)
//!
//! Two steps, usually served by two different inbound requests:
//!
//! 1. [`GrantService::authorization_request`] builds the URL the user agent is
//!    sent to, plus the `state` and PKCE verifier the caller must keep (e.g.
//!    in the session) until the callback.
//! 2. [`GrantService::request_access_token`] validates the returned `state`,
//!    exchanges the code and stores the token.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use url::Url;

use super::GrantService;
use crate::provider::Grant;
use crate::token::AccessToken;
use crate::{Error, Result};

/// Values that must survive between the redirect and the callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    /// CSRF `state` sent with the authorization request
    pub state: String,
    /// PKCE code verifier
    pub code_verifier: String,
}

/// Authorization request ready to be sent to the user agent
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Authorization endpoint URL with all query parameters
    pub url: Url,
    /// State to keep until the callback
    pub pending: PendingAuthorization,
}

impl GrantService {
    /// Build the authorization request for `client_id`
    pub fn authorization_request(&mut self, client_id: &str) -> Result<AuthorizationRequest> {
        let provider = self.get_provider(client_id)?;

        let (code_verifier, code_challenge) = generate_pkce();
        let state = generate_state();

        let url = provider.authorization_url(&state, Some(&code_challenge));
        info!(client = %client_id, "Built authorization request");

        Ok(AuthorizationRequest {
            url,
            pending: PendingAuthorization {
                state,
                code_verifier,
            },
        })
    }

    /// Exchange the authorization `code` returned with `state` and store the token
    pub async fn request_access_token(
        &mut self,
        client_id: &str,
        code: &str,
        state: &str,
        pending: &PendingAuthorization,
    ) -> Result<AccessToken> {
        if state != pending.state {
            warn!(client = %client_id, "Authorization callback state mismatch");
            return Err(Error::StateMismatch);
        }

        let provider = self.get_provider(client_id)?;
        let token = provider
            .get_access_token(&Grant::AuthorizationCode {
                code: code.to_string(),
                code_verifier: Some(pending.code_verifier.clone()),
            })
            .await?;

        self.store_access_token(client_id, &token)?;
        Ok(token)
    }
}

/// Generate PKCE code verifier and challenge
fn generate_pkce() -> (String, String) {
    // Generate 32 random bytes for verifier
    let verifier_bytes: [u8; 32] = rand::rng().random();
    let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

    let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));

    (verifier, challenge)
}

/// Generate a random state parameter
fn generate_state() -> String {
    let state_bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(state_bytes)
}
