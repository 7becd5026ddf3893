#![allow(clippy::expect_used, clippy::doc_markdown, clippy::uninlined_format_args)]
//! Example: delegated consent with the authorization code grant
//!
//! 1. Build the consent URL (with PKCE) and open it
//! 2. Paste the redirect URL back into the terminal
//! 3. The token is stored and refreshed on later runs
//!
//! ## Prerequisites
//!
//! Register an application in Entra ID with redirect URI
//! `http://localhost:8400/callback` and a client secret, then:
//!
//! ```bash
//! export GRAPHMAIL_TENANT_ID="contoso.onmicrosoft.com"
//! export GRAPHMAIL_CLIENT_ID="your-client-id"
//! export GRAPHMAIL_CLIENT_SECRET="your-secret"
//! cargo run --package graphmail-oauth --example authorization_code
//! ```

use std::env;
use std::io::{self, BufRead};
use std::sync::Arc;

use graphmail_oauth::{
    FileTokenStore, GrantType, OAuthClient, Provider, RedirectParams, TokenManager,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let tenant = env::var("GRAPHMAIL_TENANT_ID").expect("GRAPHMAIL_TENANT_ID not set");
    let client_id = env::var("GRAPHMAIL_CLIENT_ID").expect("GRAPHMAIL_CLIENT_ID not set");
    let secret = env::var("GRAPHMAIL_CLIENT_SECRET").expect("GRAPHMAIL_CLIENT_SECRET not set");

    let provider = Provider::microsoft(&tenant)?;
    println!("Authorize endpoint: {}", provider.auth_url);
    println!("Token endpoint:     {}\n", provider.token_url);

    let client = OAuthClient::new(client_id, secret, provider)?
        .with_redirect_uri("http://localhost:8400/callback")
        .with_scope("offline_access https://graph.microsoft.com/Mail.Send");
    let store = Arc::new(FileTokenStore::new("oauth_tokens.json"));
    let manager =
        TokenManager::new(&tenant, client, GrantType::AuthorizationCode, store).with_pkce(true);

    // A stored refresh token from an earlier run is enough
    if let Ok(token) = manager.access_token().await {
        println!("Reused stored credential ({} chars)", token.len());
        println!("{:#?}", manager.token_info().await);
        return Ok(());
    }

    let pending = manager.authorization_url(None)?;
    println!("Visit:\n\n  {}\n", pending.url);
    if opener::open(pending.url.as_str()).is_err() {
        println!("(open the URL manually)");
    }

    println!("Paste the redirect URL:");
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;

    let redirect = RedirectParams::parse(&line)?;
    let credential = manager
        .exchange_code_for_token(&pending, &redirect.code, &redirect.state)
        .await?;

    println!("\nToken stored, expires at {}", credential.expires_at);
    println!("Refresh token: {}", credential.refresh_token.is_some());
    Ok(())
}
