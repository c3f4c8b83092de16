//! OAuth2 client configuration and lookup
//!
//! [`ClientSettings`] is the serialized form of a client (collaborators named
//! by type). [`ClientConfig`] is the validated, immutable form the grant engine
//! works with. A [`ClientLookup`] resolves client identifiers to configurations.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::collaborator::{CollaboratorFactory, CollaboratorRegistry, CollaboratorRole};
use crate::{Error, Result};

/// Grant a client uses to obtain tokens without a stored one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Browser redirect to the authorization endpoint, then code exchange
    #[default]
    AuthorizationCode,
    /// Service-to-service credentials
    ClientCredentials,
    /// Resource owner password credentials
    ResourceOwner,
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AuthorizationCode => "authorization_code",
            Self::ClientCredentials => "client_credentials",
            Self::ResourceOwner => "resource_owner",
        })
    }
}

/// Client configuration as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    /// OAuth2 `client_id` (defaults to the client's key)
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth2 `client_secret` (supports `${VAR}` expansion)
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Authorization endpoint URL
    pub authorization_url: String,

    /// Token endpoint URL
    pub token_url: String,

    /// Resource owner details endpoint URL
    #[serde(default)]
    pub resource_owner_url: Option<String>,

    /// Requested scopes
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Separator used when joining scopes
    #[serde(default = "default_scope_separator")]
    pub scope_separator: String,

    /// Grant used when no valid token is stored
    #[serde(default)]
    pub grant_type: GrantType,

    /// Resource owner user name (for `resource_owner`)
    #[serde(default)]
    pub username: Option<String>,

    /// Resource owner password (for `resource_owner`)
    #[serde(default)]
    pub password: Option<String>,

    /// Collaborator type names by role
    #[serde(default)]
    pub collaborators: BTreeMap<CollaboratorRole, String>,
}

fn default_scope_separator() -> String {
    " ".to_string()
}

impl ClientSettings {
    /// Validate URLs and collaborator names, producing the immutable config
    pub fn resolve(&self, id: &str, registry: &CollaboratorRegistry) -> Result<ClientConfig> {
        let parse = |field: &str, value: &str| {
            Url::parse(value)
                .map_err(|e| Error::Config(format!("Client '{id}': invalid {field} '{value}': {e}")))
        };

        let collaborators = self
            .collaborators
            .iter()
            .map(|(role, type_name)| Ok((*role, registry.resolve(id, *role, type_name)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        let credentials = match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(ResourceOwnerCredentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };
        if self.grant_type == GrantType::ResourceOwner && credentials.is_none() {
            return Err(Error::Config(format!(
                "Client '{id}': resource_owner grant requires username and password"
            )));
        }

        Ok(ClientConfig {
            id: id.to_string(),
            client_id: self.client_id.clone().unwrap_or_else(|| id.to_string()),
            client_secret: self.client_secret.clone().filter(|s| !s.is_empty()),
            authorization_url: parse("authorization_url", &self.authorization_url)?,
            token_url: parse("token_url", &self.token_url)?,
            resource_owner_url: self
                .resource_owner_url
                .as_deref()
                .map(|u| parse("resource_owner_url", u))
                .transpose()?,
            scopes: self.scopes.clone(),
            scope_separator: self.scope_separator.clone(),
            grant_type: self.grant_type,
            credentials,
            collaborators,
        })
    }
}

/// Resource owner password credentials
#[derive(Clone, PartialEq, Eq)]
pub struct ResourceOwnerCredentials {
    /// User name
    pub username: String,
    /// Password
    pub password: String,
}

impl fmt::Debug for ResourceOwnerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceOwnerCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Immutable configuration of one OAuth2 client
#[derive(Clone)]
pub struct ClientConfig {
    /// Identifier the client is looked up by
    pub id: String,
    /// OAuth2 `client_id`
    pub client_id: String,
    /// OAuth2 `client_secret` (public clients have none)
    pub client_secret: Option<String>,
    /// Authorization endpoint
    pub authorization_url: Url,
    /// Token endpoint
    pub token_url: Url,
    /// Resource owner details endpoint
    pub resource_owner_url: Option<Url>,
    /// Requested scopes
    pub scopes: Vec<String>,
    /// Scope separator
    pub scope_separator: String,
    /// Grant used when no valid token is stored
    pub grant_type: GrantType,
    /// Resource owner credentials
    pub credentials: Option<ResourceOwnerCredentials>,
    /// Collaborator constructors by role
    pub collaborators: BTreeMap<CollaboratorRole, CollaboratorFactory>,
}

impl ClientConfig {
    /// Minimal configuration with no scopes and no collaborators
    pub fn new(id: impl Into<String>, authorization_url: Url, token_url: Url) -> Self {
        let id = id.into();
        Self {
            client_id: id.clone(),
            id,
            client_secret: None,
            authorization_url,
            token_url,
            resource_owner_url: None,
            scopes: Vec::new(),
            scope_separator: default_scope_separator(),
            grant_type: GrantType::default(),
            credentials: None,
            collaborators: BTreeMap::new(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("id", &self.id)
            .field("client_id", &self.client_id)
            .field("has_secret", &self.client_secret.is_some())
            .field("authorization_url", &self.authorization_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("scopes", &self.scopes)
            .field("grant_type", &self.grant_type)
            .field("collaborators", &self.collaborators.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Resolves client identifiers to configurations
pub trait ClientLookup: Send + Sync {
    /// Configuration for `id`, or [`Error::InvalidClient`]
    fn get_client(&self, id: &str) -> Result<Arc<ClientConfig>>;
}

/// In-memory client registry
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, Arc<ClientConfig>>,
}

impl ClientRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register every configured client
    pub fn from_settings<'a>(
        settings: impl IntoIterator<Item = (&'a String, &'a ClientSettings)>,
        collaborators: &CollaboratorRegistry,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for (id, client) in settings {
            registry.insert(client.resolve(id, collaborators)?);
        }
        Ok(registry)
    }

    /// Register a client, replacing any with the same identifier
    pub fn insert(&mut self, client: ClientConfig) {
        self.clients.insert(client.id.clone(), Arc::new(client));
    }

    /// Registered identifiers, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.clients.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no client is registered
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl ClientLookup for ClientRegistry {
    fn get_client(&self, id: &str) -> Result<Arc<ClientConfig>> {
        self.clients
            .get(id)
            .cloned()
            .ok_or_else(|| Error::InvalidClient(id.to_string()))
    }
}
