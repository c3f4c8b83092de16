//! Error types for the OAuth2 grant engine

use thiserror::Error;

/// Result type alias for the grant engine
pub type Result<T> = std::result::Result<T, Error>;

/// OAuth2 grant engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No client is configured under the requested identifier
    #[error("Invalid OAuth2 client: {0}")]
    InvalidClient(String),

    /// A client names a collaborator type that is not registered
    #[error("Client '{client}' references unknown {role} collaborator '{type_name}'")]
    UnknownCollaborator {
        /// Client identifier
        client: String,
        /// Collaborator role
        role: String,
        /// Configured type name
        type_name: String,
    },

    /// A registered collaborator constructor failed
    #[error("Failed to construct {role} collaborator: {message}")]
    CollaboratorConstruction {
        /// Collaborator role
        role: String,
        /// Constructor failure
        message: String,
    },

    /// The token endpoint answered with an OAuth2 error response
    #[error("Token endpoint error: {error}{}", .description.as_deref().map(|d| format!(" - {d}")).unwrap_or_default())]
    TokenEndpoint {
        /// RFC 6749 error code (or HTTP status when the body carries none)
        error: String,
        /// Optional human-readable description
        description: Option<String>,
    },

    /// Returned `state` does not match the one issued with the authorization request
    #[error("State mismatch - possible CSRF attack")]
    StateMismatch,

    /// Refresh requested but no refresh token is stored
    #[error("No refresh token stored for client: {0}")]
    MissingRefreshToken(String),

    /// Client uses the authorization code grant and needs a user agent round trip
    #[error("Authorization required for client: {0}")]
    AuthorizationRequired(String),

    /// Current request could not be resolved to an absolute URL
    #[error("Request context error: {0}")]
    RequestContext(String),

    /// Token store failure
    #[error("Token storage error: {0}")]
    Storage(String),

    /// URL error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create a token endpoint error
    pub fn token_endpoint(error: impl Into<String>, description: Option<String>) -> Self {
        Self::TokenEndpoint {
            error: error.into(),
            description,
        }
    }

    /// Whether the error means the client identifier is unknown
    #[must_use]
    pub fn is_invalid_client(&self) -> bool {
        matches!(self, Self::InvalidClient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_endpoint_display_includes_description() {
        let err = Error::token_endpoint("invalid_grant", Some("code expired".to_string()));
        assert_eq!(err.to_string(), "Token endpoint error: invalid_grant - code expired");

        let bare = Error::token_endpoint("server_error", None);
        assert_eq!(bare.to_string(), "Token endpoint error: server_error");
    }

    #[test]
    fn invalid_client_is_detected() {
        assert!(Error::InvalidClient("svc".to_string()).is_invalid_client());
        assert!(!Error::StateMismatch.is_invalid_client());
    }
}
