//! Pluggable protocol collaborators
//!
//! A provider delegates the wire-level work of a grant to three collaborators:
//!
//! - [`TokenHttpClient`] - sends token and resource-owner requests
//! - [`GrantFactory`] - turns a [`Grant`] into token request parameters
//! - [`TokenResponseParser`] - turns a token endpoint response into an [`AccessToken`]
//!
//! Clients select collaborators by type name in configuration. Names are
//! looked up in a [`CollaboratorRegistry`] of zero-argument constructors when
//! the configuration is loaded, so a typo fails at load time with
//! [`Error::UnknownCollaborator`] instead of at the first grant.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::provider::{Grant, JsonTokenParser, ReqwestHttpClient, StandardGrantFactory};
use crate::token::AccessToken;
use crate::{Error, Result};

/// Raw response from a token or resource-owner endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status is 2xx
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP transport used by a provider
#[async_trait]
pub trait TokenHttpClient: Send + Sync {
    /// POST an `application/x-www-form-urlencoded` body
    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<HttpResponse>;

    /// GET with the given `Authorization` header value
    async fn get_authorized(&self, url: &str, authorization: &str) -> Result<HttpResponse>;
}

/// Builds token request parameters for a grant
pub trait GrantFactory: Send + Sync {
    /// Form parameters (including `grant_type`) for `grant`
    fn token_request_params(&self, grant: &Grant) -> Result<Vec<(String, String)>>;
}

/// Parses token endpoint responses
pub trait TokenResponseParser: Send + Sync {
    /// Parse a response into a token, mapping error responses to [`Error::TokenEndpoint`]
    fn parse(&self, response: &HttpResponse) -> Result<AccessToken>;
}

/// Named collaborator role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorRole {
    /// [`TokenHttpClient`]
    HttpClient,
    /// [`GrantFactory`]
    GrantFactory,
    /// [`TokenResponseParser`]
    TokenParser,
}

impl CollaboratorRole {
    /// Role name as used in configuration
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HttpClient => "http_client",
            Self::GrantFactory => "grant_factory",
            Self::TokenParser => "token_parser",
        }
    }
}

impl fmt::Display for CollaboratorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An instantiated collaborator
#[derive(Clone)]
pub enum Collaborator {
    /// HTTP transport
    HttpClient(Arc<dyn TokenHttpClient>),
    /// Grant parameter builder
    GrantFactory(Arc<dyn GrantFactory>),
    /// Token response parser
    TokenParser(Arc<dyn TokenResponseParser>),
}

impl Collaborator {
    /// Role this collaborator fills
    #[must_use]
    pub fn role(&self) -> CollaboratorRole {
        match self {
            Self::HttpClient(_) => CollaboratorRole::HttpClient,
            Self::GrantFactory(_) => CollaboratorRole::GrantFactory,
            Self::TokenParser(_) => CollaboratorRole::TokenParser,
        }
    }
}

impl fmt::Debug for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Collaborator").field(&self.role()).finish()
    }
}

/// Collaborators instantiated for one provider, keyed by role
#[derive(Clone, Default)]
pub struct Collaborators {
    /// HTTP transport override
    pub http_client: Option<Arc<dyn TokenHttpClient>>,
    /// Grant factory override
    pub grant_factory: Option<Arc<dyn GrantFactory>>,
    /// Token parser override
    pub token_parser: Option<Arc<dyn TokenResponseParser>>,
}

impl Collaborators {
    /// Place a collaborator into its role slot, replacing any previous one
    pub fn insert(&mut self, collaborator: Collaborator) {
        match collaborator {
            Collaborator::HttpClient(c) => self.http_client = Some(c),
            Collaborator::GrantFactory(c) => self.grant_factory = Some(c),
            Collaborator::TokenParser(c) => self.token_parser = Some(c),
        }
    }

    /// Roles that hold a collaborator
    pub fn roles(&self) -> Vec<CollaboratorRole> {
        let mut roles = Vec::new();
        if self.http_client.is_some() {
            roles.push(CollaboratorRole::HttpClient);
        }
        if self.grant_factory.is_some() {
            roles.push(CollaboratorRole::GrantFactory);
        }
        if self.token_parser.is_some() {
            roles.push(CollaboratorRole::TokenParser);
        }
        roles
    }

    /// Number of roles filled
    pub fn len(&self) -> usize {
        self.roles().len()
    }

    /// Whether no role is filled
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.roles()).finish()
    }
}

type Constructor = dyn Fn() -> Result<Collaborator> + Send + Sync;

/// A registered zero-argument constructor bound to a role and type name
#[derive(Clone)]
pub struct CollaboratorFactory {
    role: CollaboratorRole,
    type_name: String,
    constructor: Arc<Constructor>,
}

impl CollaboratorFactory {
    /// Role the constructed collaborator fills
    #[must_use]
    pub fn role(&self) -> CollaboratorRole {
        self.role
    }

    /// Registered type name
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Run the constructor
    pub fn construct(&self) -> Result<Collaborator> {
        (self.constructor)().map_err(|e| match e {
            Error::CollaboratorConstruction { .. } => e,
            other => Error::CollaboratorConstruction {
                role: self.role.to_string(),
                message: format!("{}: {other}", self.type_name),
            },
        })
    }
}

impl fmt::Debug for CollaboratorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollaboratorFactory")
            .field("role", &self.role)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Registry of collaborator constructors, keyed by role and type name
#[derive(Clone, Default)]
pub struct CollaboratorRegistry {
    factories: HashMap<(CollaboratorRole, String), CollaboratorFactory>,
}

impl CollaboratorRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in collaborators
    /// (`reqwest`, `standard` and `json`)
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_http_client("reqwest", ReqwestHttpClient::new);
        registry.register_grant_factory("standard", || Ok(StandardGrantFactory));
        registry.register_token_parser("json", || Ok(JsonTokenParser));
        registry
    }

    /// Register an HTTP transport constructor
    pub fn register_http_client<F, C>(&mut self, type_name: impl Into<String>, ctor: F)
    where
        F: Fn() -> Result<C> + Send + Sync + 'static,
        C: TokenHttpClient + 'static,
    {
        self.insert(CollaboratorRole::HttpClient, type_name.into(), move || {
            Ok(Collaborator::HttpClient(Arc::new(ctor()?)))
        });
    }

    /// Register a grant factory constructor
    pub fn register_grant_factory<F, C>(&mut self, type_name: impl Into<String>, ctor: F)
    where
        F: Fn() -> Result<C> + Send + Sync + 'static,
        C: GrantFactory + 'static,
    {
        self.insert(CollaboratorRole::GrantFactory, type_name.into(), move || {
            Ok(Collaborator::GrantFactory(Arc::new(ctor()?)))
        });
    }

    /// Register a token parser constructor
    pub fn register_token_parser<F, C>(&mut self, type_name: impl Into<String>, ctor: F)
    where
        F: Fn() -> Result<C> + Send + Sync + 'static,
        C: TokenResponseParser + 'static,
    {
        self.insert(CollaboratorRole::TokenParser, type_name.into(), move || {
            Ok(Collaborator::TokenParser(Arc::new(ctor()?)))
        });
    }

    fn insert<F>(&mut self, role: CollaboratorRole, type_name: String, ctor: F)
    where
        F: Fn() -> Result<Collaborator> + Send + Sync + 'static,
    {
        let factory = CollaboratorFactory {
            role,
            type_name: type_name.clone(),
            constructor: Arc::new(ctor),
        };
        self.factories.insert((role, type_name), factory);
    }

    /// Whether a constructor is registered for `role` under `type_name`
    #[must_use]
    pub fn contains(&self, role: CollaboratorRole, type_name: &str) -> bool {
        self.factories.contains_key(&(role, type_name.to_string()))
    }

    /// Resolve the constructor a client configured for `role`
    pub fn resolve(
        &self,
        client: &str,
        role: CollaboratorRole,
        type_name: &str,
    ) -> Result<CollaboratorFactory> {
        self.factories
            .get(&(role, type_name.to_string()))
            .cloned()
            .ok_or_else(|| Error::UnknownCollaborator {
                client: client.to_string(),
                role: role.to_string(),
                type_name: type_name.to_string(),
            })
    }
}

impl fmt::Debug for CollaboratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.factories.keys().collect();
        keys.sort();
        f.debug_struct("CollaboratorRegistry")
            .field("factories", &keys)
            .finish()
    }
}
