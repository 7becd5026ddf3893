//! Short-lived binding between an authorization redirect and its callback.
//!
//! The `state` (and PKCE verifier, when enabled) issued with the
//! authorization URL travel with the caller's request context instead of a
//! process-wide session. The caller hands the [`AuthorizationRequest`] back
//! when the redirect arrives.

use std::fmt::Write as _;

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Seconds an issued authorization request stays redeemable.
pub const AUTHORIZATION_TTL_SECS: i64 = 600;

/// An issued authorization URL plus the values needed to redeem its code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    /// URL the user must visit.
    pub url: Url,
    /// CSRF `state` embedded in the URL.
    pub state: String,
    /// PKCE verifier, if the request used PKCE.
    pub pkce_verifier: Option<String>,
    /// When the request was issued.
    pub issued_at: DateTime<Utc>,
}

impl AuthorizationRequest {
    /// True once the request is older than [`AUTHORIZATION_TTL_SECS`].
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.issued_at + Duration::seconds(AUTHORIZATION_TTL_SECS)
    }

    /// Checks a returned `state` against the issued one.
    ///
    /// # Errors
    ///
    /// Returns `StateMismatch` if they differ and `AuthorizationExpired` if
    /// the request is past its TTL.
    pub fn verify(&self, state: &str, now: DateTime<Utc>) -> Result<()> {
        if !constant_time_eq(self.state.as_bytes(), state.as_bytes()) {
            return Err(Error::StateMismatch);
        }
        if self.is_expired_at(now) {
            return Err(Error::AuthorizationExpired);
        }
        Ok(())
    }
}

/// `code` and `state` extracted from a redirect URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectParams {
    /// Authorization code.
    pub code: String,
    /// Returned state.
    pub state: String,
}

impl RedirectParams {
    /// Parses the query of the URL the identity platform redirected to.
    ///
    /// # Errors
    ///
    /// Returns `TokenAcquisitionFailed` when the redirect carries an `error`
    /// or lacks a `code`, and a URL error when it does not parse.
    pub fn parse(redirect_url: &str) -> Result<Self> {
        let url = Url::parse(redirect_url.trim())?;
        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut description = String::new();

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                "error_description" => description = value.into_owned(),
                _ => {}
            }
        }

        if let Some(error) = error {
            return Err(Error::acquisition(error, description));
        }

        let code = code
            .ok_or_else(|| Error::acquisition("invalid_request", "redirect has no `code` parameter"))?;
        Ok(Self {
            code,
            state: state.unwrap_or_default(),
        })
    }
}

/// Random 128-bit state, hex encoded.
pub(crate) fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().fold(String::with_capacity(32), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

// Folds over every byte so the comparison time does not depend on where
// the first mismatch is. Length is not secret.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
