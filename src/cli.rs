//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// OAuth2 client grant engine - obtain, refresh and inspect tokens for configured clients
#[derive(Parser, Debug)]
#[command(name = "oauth2-grant")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "OAUTH2_GRANT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "warn",
        env = "OAUTH2_GRANT_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "OAUTH2_GRANT_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Callback URL the authorization server redirects to
    #[arg(
        long,
        default_value = "http://127.0.0.1:8080/oauth/callback",
        env = "OAUTH2_GRANT_REDIRECT_URI",
        global = true
    )]
    pub redirect_uri: String,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load the configuration and validate every client
    Check,

    /// Print the authorization URL for an authorization code client
    Authorize {
        /// Client identifier
        client: String,
    },

    /// Exchange an authorization code received on the callback
    Exchange {
        /// Client identifier
        client: String,

        /// Authorization code
        #[arg(long)]
        code: String,

        /// `state` returned on the callback
        #[arg(long)]
        state: String,

        /// `state` printed by `authorize`
        #[arg(long)]
        expected_state: String,

        /// PKCE verifier printed by `authorize`
        #[arg(long)]
        verifier: String,
    },

    /// Print a valid access token, running the client's grant if needed
    Token {
        /// Client identifier
        client: String,
    },

    /// Refresh the stored token
    Refresh {
        /// Client identifier
        client: String,
    },

    /// Show the stored token (access and refresh tokens redacted)
    Show {
        /// Client identifier
        client: String,
    },

    /// Delete the stored token
    Clear {
        /// Client identifier
        client: String,
    },
}
