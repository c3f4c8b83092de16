//! oauth2-grant - OAuth2 client grant engine CLI

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;

use oauth2_grant::{
    Result,
    cli::{Cli, Command},
    client::ClientRegistry,
    collaborator::CollaboratorRegistry,
    config::Config,
    grant::{GrantService, PendingAuthorization},
    redirect::{CurrentRouteRedirect, InboundRequest},
    service::TokenService,
    setup_tracing,
    token::AccessToken,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let clients = Arc::new(config.client_registry(&CollaboratorRegistry::with_defaults())?);

    let grant_service = || -> Result<GrantService> {
        let request = InboundRequest::parse(&cli.redirect_uri)?;
        Ok(GrantService::new(
            clients.clone(),
            config.token_storage.open()?,
            Arc::new(CurrentRouteRedirect::new(Arc::new(request))),
        ))
    };

    match cli.command {
        Command::Check => check(&clients)?,
        Command::Authorize { client } => {
            let request = grant_service()?.authorization_request(&client)?;
            println!("Open this URL to authorize '{client}':\n\n{}\n", request.url);
            println!("state:    {}", request.pending.state);
            println!("verifier: {}", request.pending.code_verifier);
        }
        Command::Exchange {
            client,
            code,
            state,
            expected_state,
            verifier,
        } => {
            let pending = PendingAuthorization {
                state: expected_state,
                code_verifier: verifier,
            };
            let token = grant_service()?
                .request_access_token(&client, &code, &state, &pending)
                .await?;
            print_token(&client, &token);
        }
        Command::Token { client } => {
            let token = TokenService::new(grant_service()?).access_token(&client).await?;
            println!("{}", token.access_token);
        }
        Command::Refresh { client } => {
            let token = grant_service()?.refresh_access_token(&client).await?;
            print_token(&client, &token);
        }
        Command::Show { client } => {
            let grants = grant_service()?;
            grants.client(&client)?;
            match grants.retrieve_access_token(&client)? {
                Some(token) => print_token(&client, &token),
                None => println!("No token stored for '{client}'"),
            }
        }
        Command::Clear { client } => {
            let grants = grant_service()?;
            grants.client(&client)?;
            grants.clear_access_token(&client)?;
            println!("✅ Cleared token for '{client}'");
        }
    }

    Ok(())
}

fn check(clients: &ClientRegistry) -> Result<()> {
    println!("✅ Configuration valid: {} client(s)", clients.len());
    for id in clients.ids() {
        println!("  • {id}");
    }
    Ok(())
}

fn print_token(client: &str, token: &AccessToken) {
    println!("Token for '{client}':");
    println!("  type:    {}", token.token_type);
    println!("  access:  {}", redact(&token.access_token));
    if let Some(refresh) = &token.refresh_token {
        println!("  refresh: {}", redact(refresh));
    }
    if let Some(scope) = &token.scope {
        println!("  scope:   {scope}");
    }
    match token.time_until_expiry() {
        Some(remaining) => println!("  expires: in {}s", remaining.as_secs()),
        None if token.expires_at.is_some() => println!("  expires: expired"),
        None => println!("  expires: never"),
    }
}

/// Keep the first few characters so tokens can be told apart
fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(6).collect();
    format!("{prefix}…")
}
