//! Client Credentials grant

use tracing::info;

use super::GrantService;
use crate::Result;
use crate::provider::Grant;
use crate::token::AccessToken;

impl GrantService {
    /// Obtain a token with the client's own credentials and store it
    pub async fn client_credentials(&mut self, client_id: &str) -> Result<AccessToken> {
        let provider = self.get_provider(client_id)?;
        let token = provider.get_access_token(&Grant::ClientCredentials).await?;

        self.store_access_token(client_id, &token)?;
        info!(client = %client_id, "Client credentials token stored");
        Ok(token)
    }
}
