//! Resource Owner Password Credentials grant

use tracing::info;

use super::GrantService;
use crate::Result;
use crate::provider::Grant;
use crate::token::AccessToken;

impl GrantService {
    /// Obtain a token with the resource owner's credentials and store it
    pub async fn resource_owner_password(
        &mut self,
        client_id: &str,
        username: &str,
        password: &str,
    ) -> Result<AccessToken> {
        let provider = self.get_provider(client_id)?;
        let token = provider
            .get_access_token(&Grant::Password {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;

        self.store_access_token(client_id, &token)?;
        info!(client = %client_id, username = %username, "Resource owner token stored");
        Ok(token)
    }
}
