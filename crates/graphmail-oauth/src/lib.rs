//! # graphmail-oauth
//!
//! `OAuth2` token lifecycle for the Microsoft identity platform.
//!
//! ## Features
//!
//! - **Grant types**: Authorization Code (optionally with PKCE) and Client Credentials
//! - **Token management**: Cached tokens, refresh 5 minutes before expiry,
//!   fallback to interactive authorization when refresh is impossible
//! - **Token stores**: JSON file (atomic replace) or `SQLite`, behind one trait
//!
//! ## Quick Start
//!
//! ### Client Credentials (daemons, services)
//!
//! ```ignore
//! use std::sync::Arc;
//! use graphmail_oauth::{FileTokenStore, GrantType, OAuthClient, Provider, TokenManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = Provider::microsoft("contoso.onmicrosoft.com")?;
//!     let client = OAuthClient::new("client_id", "client_secret", provider)?;
//!     let store = Arc::new(FileTokenStore::new("tokens/oauth_tokens.json"));
//!
//!     let manager = TokenManager::new(
//!         "contoso.onmicrosoft.com",
//!         client,
//!         GrantType::ClientCredentials,
//!         store,
//!     );
//!
//!     // Acquired on first use, then served from cache until near expiry
//!     let token = manager.access_token().await?;
//!     Ok(())
//! }
//! ```
//!
//! ### Authorization Code (delegated, user consent)
//!
//! ```ignore
//! use graphmail_oauth::RedirectParams;
//!
//! // Keep `pending` in the caller's session until the redirect comes back
//! let pending = manager.authorization_url(None)?;
//! println!("Visit: {}", pending.url);
//!
//! let redirect = RedirectParams::parse(&redirect_url)?;
//! manager
//!     .exchange_code_for_token(&pending, &redirect.code, &redirect.state)
//!     .await?;
//!
//! // Refreshed transparently with the stored refresh token
//! let token = manager.access_token().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod flow;
mod manager;
pub mod provider;
pub mod store;
pub mod token;

pub use error::{Error, Result, StoreError, StoreResult};
pub use flow::{
    AuthorizationCodeFlow, AuthorizationRequest, OAuthClient, PkceChallenge, RedirectParams,
    REQUEST_TIMEOUT, http_client,
};
pub use manager::TokenManager;
pub use provider::Provider;
pub use store::{FileTokenStore, SqliteTokenStore, TokenStore, TokenStoreKind};
pub use token::{Credential, GrantType, TokenInfo};
