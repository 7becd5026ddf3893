//! Authorization Code Flow implementation.

use chrono::Utc;

use super::pending::{AuthorizationRequest, generate_state};
use super::pkce::{PkceChallenge, S256};
use super::OAuthClient;
use crate::error::Result;
use crate::token::Credential;

/// Authorization Code Flow for `OAuth2`.
///
/// Suitable for applications that can send the user to a browser and
/// receive the authorization code on the redirect URI.
#[derive(Debug)]
pub struct AuthorizationCodeFlow<'a> {
    client: &'a OAuthClient,
    pkce: bool,
}

impl<'a> AuthorizationCodeFlow<'a> {
    /// Creates a new authorization code flow.
    #[must_use]
    pub const fn new(client: &'a OAuthClient) -> Self {
        Self {
            client,
            pkce: false,
        }
    }

    /// Adds a PKCE challenge to every authorization request.
    #[must_use]
    pub const fn with_pkce(mut self, enabled: bool) -> Self {
        self.pkce = enabled;
        self
    }

    /// Builds the consent URL and the binding needed to redeem its code.
    ///
    /// A random `state` is generated when none is supplied.
    #[must_use]
    pub fn authorize(&self, state: Option<&str>) -> AuthorizationRequest {
        let state = state.map_or_else(generate_state, str::to_string);
        let pkce = self.pkce.then(PkceChallenge::generate);

        let mut url = self.client.provider.auth_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("client_id", &self.client.client_id)
                .append_pair("response_type", "code");

            if let Some(redirect_uri) = &self.client.redirect_uri {
                pairs.append_pair("redirect_uri", redirect_uri);
            }

            if !self.client.scope.is_empty() {
                pairs.append_pair("scope", &self.client.scope);
            }

            pairs
                .append_pair("state", &state)
                .append_pair("response_mode", "query");

            if let Some(pkce) = &pkce {
                pairs
                    .append_pair("code_challenge", pkce.challenge())
                    .append_pair("code_challenge_method", S256);
            }
        }

        AuthorizationRequest {
            url,
            state,
            pkce_verifier: pkce.map(|p| p.verifier().to_string()),
            issued_at: Utc::now(),
        }
    }

    /// Verifies the returned `state` and exchanges the code for a credential.
    ///
    /// # Errors
    ///
    /// Returns `StateMismatch`/`AuthorizationExpired` before any network
    /// call, or `TokenAcquisitionFailed` if the exchange fails.
    pub async fn exchange_code(
        &self,
        pending: &AuthorizationRequest,
        code: &str,
        state: &str,
    ) -> Result<Credential> {
        pending.verify(state, Utc::now())?;
        self.client
            .exchange_code(code, pending.pkce_verifier.as_deref())
            .await
    }
}
