//! Refresh Token grant

use tracing::info;

use super::GrantService;
use crate::provider::Grant;
use crate::token::AccessToken;
use crate::{Error, Result};

impl GrantService {
    /// Exchange the stored refresh token for a new access token and store it.
    /// The previous refresh token is kept when the server does not rotate it.
    pub async fn refresh_access_token(&mut self, client_id: &str) -> Result<AccessToken> {
        let refresh_token = self
            .retrieve_access_token(client_id)?
            .and_then(|token| token.refresh_token)
            .ok_or_else(|| Error::MissingRefreshToken(client_id.to_string()))?;

        let provider = self.get_provider(client_id)?;
        let mut token = provider
            .get_access_token(&Grant::RefreshToken {
                refresh_token: refresh_token.clone(),
            })
            .await?;

        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token);
        }

        self.store_access_token(client_id, &token)?;
        info!(client = %client_id, "Access token refreshed");
        Ok(token)
    }
}
