//! `OAuth2` token endpoint client and authorization flows.

mod code;
mod pending;
mod pkce;

pub use code::AuthorizationCodeFlow;
pub use pending::{AUTHORIZATION_TTL_SECS, AuthorizationRequest, RedirectParams};
pub use pkce::PkceChallenge;

use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use tracing::debug;

use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::token::{Credential, ErrorResponse, GrantType, TokenResponse};

/// Timeout applied to every network call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds an HTTP client with the shared request timeout.
///
/// # Errors
///
/// Returns `HttpClient` if the TLS backend or proxy settings cannot be
/// initialised.
pub fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(Error::HttpClient)
}

/// Confidential `OAuth2` client registered with the identity platform.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// Client ID (application id).
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
    /// Redirect URI for authorization code flow.
    pub redirect_uri: Option<String>,
    /// Space separated scope string.
    pub scope: String,
    /// Provider configuration.
    pub provider: Provider,
    /// HTTP client.
    http_client: Client,
}

impl OAuthClient {
    /// Creates a new OAuth client.
    ///
    /// The scope defaults to the provider's default scopes.
    ///
    /// # Errors
    ///
    /// Returns `HttpClient` if the HTTP client cannot be built.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        provider: Provider,
    ) -> Result<Self> {
        let scope = provider.default_scopes.join(" ");
        Ok(Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: None,
            scope,
            provider,
            http_client: http_client()?,
        })
    }

    /// Sets the redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    /// Sets the scope string.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Replaces the HTTP client.
    #[must_use]
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }

    /// Acquires an application token with the client credentials grant.
    ///
    /// # Errors
    ///
    /// Returns `TokenAcquisitionFailed` if the token endpoint rejects the request.
    pub async fn client_credentials_token(&self) -> Result<Credential> {
        let params = self.base_params(GrantType::ClientCredentials.as_str());
        self.request_token(&params, GrantType::ClientCredentials)
            .await
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns `TokenAcquisitionFailed` if the exchange fails.
    pub async fn exchange_code(&self, code: &str, code_verifier: Option<&str>) -> Result<Credential> {
        let mut params = self.base_params(GrantType::AuthorizationCode.as_str());
        params.push(("code", code));
        if let Some(uri) = self.redirect_uri.as_deref() {
            params.push(("redirect_uri", uri));
        }
        if let Some(verifier) = code_verifier {
            params.push(("code_verifier", verifier));
        }

        self.request_token(&params, GrantType::AuthorizationCode)
            .await
    }

    /// Redeems a refresh token for a new credential.
    ///
    /// The previous refresh token is kept when the endpoint does not rotate it.
    ///
    /// # Errors
    ///
    /// Returns `TokenAcquisitionFailed` if the refresh fails.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Credential> {
        let mut params = self.base_params("refresh_token");
        params.push(("refresh_token", refresh_token));

        let mut credential = self
            .request_token(&params, GrantType::AuthorizationCode)
            .await?;
        if credential.refresh_token.is_none() {
            credential.refresh_token = Some(refresh_token.to_string());
        }
        Ok(credential)
    }

    fn base_params<'a>(&'a self, grant_type: &'a str) -> Vec<(&'a str, &'a str)> {
        vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", grant_type),
            ("scope", self.scope.as_str()),
        ]
    }

    async fn request_token(&self, params: &[(&str, &str)], grant: GrantType) -> Result<Credential> {
        debug!(grant = %grant, url = %self.provider.token_url, "Requesting token");

        let response = self
            .http_client
            .post(self.provider.token_url.clone())
            .form(params)
            .send()
            .await
            .map_err(|e| Error::transport(&e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| Error::transport(&e))?;

        if !status.is_success() {
            return Err(serde_json::from_str::<ErrorResponse>(&body).map_or_else(
                |_| Error::acquisition(format!("http_{}", status.as_u16()), body.clone()),
                ErrorResponse::into_error,
            ));
        }

        let token_response: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| Error::acquisition("invalid_response", e.to_string()))?;
        Ok(Credential::from_response(token_response, grant, Utc::now()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard) -> OAuthClient {
        let provider = Provider::microsoft_at(&server.url(), "tenant").unwrap();
        OAuthClient::new("client-1", "secret-1", provider)
            .unwrap()
            .with_redirect_uri("http://localhost/callback")
    }

    #[test]
    fn test_oauth_client_defaults() {
        let provider = Provider::microsoft("tenant").unwrap();
        let client = OAuthClient::new("test_client_id", "secret", provider).unwrap();
        assert_eq!(client.client_id, "test_client_id");
        assert_eq!(client.scope, crate::provider::DEFAULT_SCOPE);
        assert!(client.redirect_uri.is_none());
    }

    #[test]
    fn test_http_client_builds() {
        assert!(http_client().is_ok());
    }

    #[tokio::test]
    async fn test_client_credentials_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/tenant/oauth2/v2.0/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("client_id".into(), "client-1".into()),
                Matcher::UrlEncoded("client_secret".into(), "secret-1".into()),
                Matcher::UrlEncoded(
                    "scope".into(),
                    "https://graph.microsoft.com/Mail.Send".into(),
                ),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"app-token","token_type":"Bearer","expires_in":3599}"#)
            .create_async()
            .await;

        let credential = client_for(&server).client_credentials_token().await.unwrap();
        assert_eq!(credential.access_token, "app-token");
        assert_eq!(credential.grant_type, GrantType::ClientCredentials);
        assert!(credential.refresh_token.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_exchange_code_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/tenant/oauth2/v2.0/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "the-code".into()),
                Matcher::UrlEncoded("redirect_uri".into(), "http://localhost/callback".into()),
                Matcher::UrlEncoded("code_verifier".into(), "verifier".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"user-token","refresh_token":"r1","expires_in":3600}"#)
            .create_async()
            .await;

        let credential = client_for(&server)
            .exchange_code("the-code", Some("verifier"))
            .await
            .unwrap();
        assert_eq!(credential.access_token, "user-token");
        assert_eq!(credential.refresh_token.as_deref(), Some("r1"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_keeps_refresh_token_when_not_rotated() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/tenant/oauth2/v2.0/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "old-refresh".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"new-token","expires_in":3600}"#)
            .create_async()
            .await;

        let credential = client_for(&server).refresh("old-refresh").await.unwrap();
        assert_eq!(credential.access_token, "new-token");
        assert_eq!(credential.refresh_token.as_deref(), Some("old-refresh"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upstream_error_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/tenant/oauth2/v2.0/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"AADSTS70008: expired"}"#)
            .create_async()
            .await;

        let err = client_for(&server).refresh("stale").await.unwrap_err();
        match err {
            Error::TokenAcquisitionFailed { error, description } => {
                assert_eq!(error, "invalid_grant");
                assert!(description.starts_with("AADSTS70008"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_error_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/tenant/oauth2/v2.0/token")
            .with_status(503)
            .with_body("Service Unavailable")
            .create_async()
            .await;

        let err = client_for(&server).client_credentials_token().await.unwrap_err();
        match err {
            Error::TokenAcquisitionFailed { error, description } => {
                assert_eq!(error, "http_503");
                assert_eq!(description, "Service Unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
