//! Grant parameters and the standard grant factory

use std::fmt;

use crate::Result;
use crate::collaborator::GrantFactory;

/// A grant to exchange at the token endpoint, with its grant-specific inputs
#[derive(Clone, PartialEq, Eq)]
pub enum Grant {
    /// `authorization_code`, optionally with the PKCE verifier
    AuthorizationCode {
        /// Code returned to the redirect URI
        code: String,
        /// PKCE code verifier issued with the authorization request
        code_verifier: Option<String>,
    },
    /// `client_credentials`
    ClientCredentials,
    /// `refresh_token`
    RefreshToken {
        /// Refresh token from an earlier exchange
        refresh_token: String,
    },
    /// `password` (resource owner credentials)
    Password {
        /// Resource owner user name
        username: String,
        /// Resource owner password
        password: String,
    },
}

impl Grant {
    /// RFC 6749 `grant_type` value
    #[must_use]
    pub fn grant_type(&self) -> &'static str {
        match self {
            Self::AuthorizationCode { .. } => "authorization_code",
            Self::ClientCredentials => "client_credentials",
            Self::RefreshToken { .. } => "refresh_token",
            Self::Password { .. } => "password",
        }
    }

    /// Grants whose token request carries the client's scopes
    #[must_use]
    pub fn requests_scope(&self) -> bool {
        matches!(self, Self::ClientCredentials | Self::Password { .. })
    }
}

// Codes, refresh tokens and passwords stay out of logs
impl fmt::Debug for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthorizationCode { code_verifier, .. } => f
                .debug_struct("AuthorizationCode")
                .field("pkce", &code_verifier.is_some())
                .finish_non_exhaustive(),
            Self::ClientCredentials => f.write_str("ClientCredentials"),
            Self::RefreshToken { .. } => f.debug_struct("RefreshToken").finish_non_exhaustive(),
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// Grant factory emitting the RFC 6749 parameters for every [`Grant`]
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardGrantFactory;

impl GrantFactory for StandardGrantFactory {
    fn token_request_params(&self, grant: &Grant) -> Result<Vec<(String, String)>> {
        let mut params = vec![("grant_type".to_string(), grant.grant_type().to_string())];

        match grant {
            Grant::AuthorizationCode {
                code,
                code_verifier,
            } => {
                params.push(("code".to_string(), code.clone()));
                if let Some(verifier) = code_verifier {
                    params.push(("code_verifier".to_string(), verifier.clone()));
                }
            }
            Grant::ClientCredentials => {}
            Grant::RefreshToken { refresh_token } => {
                params.push(("refresh_token".to_string(), refresh_token.clone()));
            }
            Grant::Password { username, password } => {
                params.push(("username".to_string(), username.clone()));
                params.push(("password".to_string(), password.clone()));
            }
        }

        Ok(params)
    }
}
