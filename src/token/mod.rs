//! Access tokens and their persistence
//!
//! [`AccessToken`] is the value produced by every grant exchange. It is
//! immutable once created and is stored under a per-client key in a
//! [`TokenStore`].

mod store;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};

/// Seconds before the real expiry at which a token is treated as expired
const EXPIRY_SKEW_SECS: u64 = 60;

/// Issued OAuth2 access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    /// Access token
    pub access_token: String,

    /// Token type (usually "Bearer")
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Refresh token (optional)
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Token expiration time (Unix timestamp)
    #[serde(default)]
    pub expires_at: Option<u64>,

    /// Granted scopes
    #[serde(default)]
    pub scope: Option<String>,

    /// Any other fields returned by the token endpoint (e.g. `id_token`)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub values: Map<String, Value>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl AccessToken {
    /// Create a bearer token with no expiry and no refresh token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            refresh_token: None,
            expires_at: None,
            scope: None,
            values: Map::new(),
        }
    }

    /// Create a token from the fields of a token endpoint response
    pub fn from_response(
        access_token: String,
        token_type: Option<String>,
        refresh_token: Option<String>,
        expires_in: Option<u64>,
        scope: Option<String>,
    ) -> Self {
        Self {
            access_token,
            token_type: token_type.unwrap_or_else(default_token_type),
            refresh_token,
            expires_at: expires_in.map(|secs| now_secs().saturating_add(secs)),
            scope,
            values: Map::new(),
        }
    }

    /// Attach the remaining response fields
    #[must_use]
    pub fn with_values(mut self, values: Map<String, Value>) -> Self {
        self.values = values;
        self
    }

    /// Check if the token is expired (with 60 second buffer)
    pub fn is_expired(&self) -> bool {
        // No expiry = doesn't expire
        self.expires_at
            .is_some_and(|expires_at| now_secs() + EXPIRY_SKEW_SECS >= expires_at)
    }

    /// Time until expiration
    pub fn time_until_expiry(&self) -> Option<Duration> {
        let now = now_secs();
        self.expires_at
            .filter(|expires_at| *expires_at > now)
            .map(|expires_at| Duration::from_secs(expires_at - now))
    }

    /// Value for an `Authorization` header
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}
