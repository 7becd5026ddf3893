//! `OAuth2` credential records and token endpoint payloads.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Tokens are refreshed this many seconds before they actually expire.
pub const REFRESH_MARGIN_SECS: i64 = 300;

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// `OAuth2` grant used to obtain tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Delegated, user-consented flow; yields a refresh token.
    AuthorizationCode,
    /// Application-only flow; re-acquired instead of refreshed.
    #[default]
    ClientCredentials,
}

impl GrantType {
    /// Wire name of the grant (`grant_type` form value).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::ClientCredentials => "client_credentials",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "client_credentials" => Ok(Self::ClientCredentials),
            other => Err(Error::InvalidConfig(format!("unknown grant type `{other}`"))),
        }
    }
}

/// Persisted credential for one client identifier.
///
/// A `ClientCredentials` record never carries a refresh token; every
/// constructor and [`Credential::normalized`] enforce this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque bearer token.
    pub access_token: String,
    /// Refresh token (authorization code grant only).
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Absolute expiry instant.
    pub expires_at: DateTime<Utc>,
    /// Grant the token was obtained with.
    pub grant_type: GrantType,
}

impl Credential {
    /// Creates a credential without a refresh token.
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        expires_at: DateTime<Utc>,
        grant_type: GrantType,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at,
            grant_type,
        }
    }

    /// Sets the refresh token. Ignored for client credentials.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self.normalized()
    }

    /// Builds a credential from a token endpoint response received at `now`.
    #[must_use]
    pub fn from_response(response: TokenResponse, grant_type: GrantType, now: DateTime<Utc>) -> Self {
        let lifetime = response
            .expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS);

        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: now + Duration::seconds(lifetime),
            grant_type,
        }
        .normalized()
    }

    /// Drops a refresh token that the grant type cannot carry.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.grant_type == GrantType::ClientCredentials {
            self.refresh_token = None;
        }
        self
    }

    /// True while `now` is before the expiry minus the refresh margin.
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - Duration::seconds(REFRESH_MARGIN_SECS)
    }

    /// True if the token must be refreshed before use.
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        !self.is_fresh_at(Utc::now())
    }

    /// Snapshot of this credential for diagnostics.
    #[must_use]
    pub fn info_at(&self, now: DateTime<Utc>) -> TokenInfo {
        TokenInfo {
            has_access_token: !self.access_token.is_empty(),
            has_refresh_token: self.refresh_token.as_deref().is_some_and(|t| !t.is_empty()),
            expires_at: Some(self.expires_at),
            expires_in: (self.expires_at - now).num_seconds().max(0),
            grant_type: self.grant_type,
            is_expired: now >= self.expires_at,
        }
    }
}

/// Read-only view of the token state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
    /// An access token is cached.
    pub has_access_token: bool,
    /// A refresh token is cached.
    pub has_refresh_token: bool,
    /// Expiry of the cached token.
    pub expires_at: Option<DateTime<Utc>>,
    /// Seconds until expiry, clamped at zero.
    pub expires_in: i64,
    /// Grant type in effect.
    pub grant_type: GrantType,
    /// The cached token is past its expiry (or there is none).
    pub is_expired: bool,
}

impl TokenInfo {
    /// Info for a manager that holds no credential.
    #[must_use]
    pub const fn empty(grant_type: GrantType) -> Self {
        Self {
            has_access_token: false,
            has_refresh_token: false,
            expires_at: None,
            expires_in: 0,
            grant_type,
            is_expired: true,
        }
    }
}

/// Token response from the token endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Token type.
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Expires in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Refresh token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Error response from the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    /// Error code.
    pub error: String,
    /// Error description.
    #[serde(default)]
    pub error_description: String,
}

impl ErrorResponse {
    /// Converts to an Error.
    #[must_use]
    pub fn into_error(self) -> Error {
        Error::acquisition(self.error, self.error_description)
    }
}
