//! OAuth2 client grant engine
//!
//! Builds OAuth2 providers from configured clients, drives grant exchanges
//! against them and persists the issued tokens.
//!
//! # Overview
//!
//! - **Clients**: [`client::ClientLookup`] resolves a client identifier to its
//!   validated [`client::ClientConfig`]
//! - **Providers**: [`provider::ProviderCache`] builds at most one
//!   [`provider::Provider`] per client for the lifetime of a grant service
//! - **Collaborators**: HTTP transport, grant factory and token parser are
//!   pluggable through [`collaborator::CollaboratorRegistry`]
//! - **Grants**: [`grant::GrantService`] runs authorization code (PKCE),
//!   client credentials, refresh token and resource owner grants
//! - **Storage**: tokens are written to a [`token::TokenStore`] under
//!   `oauth2_client_access_token-<client>`

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod client;
pub mod collaborator;
pub mod config;
pub mod error;
pub mod grant;
pub mod provider;
pub mod redirect;
pub mod service;
pub mod token;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries command output
    match format {
        Some("json") => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        _ => subscriber
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    }
    .map_err(|e| Error::Config(format!("Failed to initialize tracing: {e}")))
}
