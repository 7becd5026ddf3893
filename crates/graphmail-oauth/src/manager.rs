//! Token lifecycle: acquisition, caching, refresh and fallback.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::flow::{AuthorizationCodeFlow, AuthorizationRequest, OAuthClient};
use crate::store::TokenStore;
use crate::token::{Credential, GrantType, TokenInfo};

#[derive(Debug, Default)]
struct Cache {
    credential: Option<Credential>,
    loaded: bool,
}

/// Hands out non-expired access tokens for one client identifier.
///
/// The cached credential sits behind an async mutex that stays locked for
/// the whole refresh, so concurrent callers wait for the in-flight refresh
/// and reuse its result. Store failures are logged and treated as "no
/// cached token".
pub struct TokenManager {
    tenant_id: String,
    client: OAuthClient,
    grant: GrantType,
    use_pkce: bool,
    store: Arc<dyn TokenStore>,
    cache: Mutex<Cache>,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client.client_id)
            .field("grant", &self.grant)
            .field("use_pkce", &self.use_pkce)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Creates a manager. Nothing is loaded until the first token request.
    #[must_use]
    pub fn new(
        tenant_id: impl Into<String>,
        client: OAuthClient,
        grant: GrantType,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client,
            grant,
            use_pkce: false,
            store,
            cache: Mutex::new(Cache::default()),
        }
    }

    /// Adds PKCE to authorization code requests.
    #[must_use]
    pub const fn with_pkce(mut self, enabled: bool) -> Self {
        self.use_pkce = enabled;
        self
    }

    /// True iff tenant id, client id and client secret are all set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.tenant_id.is_empty()
            && !self.client.client_id.is_empty()
            && !self.client.client_secret.is_empty()
    }

    /// Grant type this manager acquires tokens with.
    #[must_use]
    pub const fn grant_type(&self) -> GrantType {
        self.grant
    }

    /// Client identifier the credential is stored under.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client.client_id
    }

    /// Builds the consent URL for the authorization code grant.
    ///
    /// The returned request must be kept by the caller and passed back to
    /// [`exchange_code_for_token`](Self::exchange_code_for_token).
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedGrantType` under the client credentials grant.
    pub fn authorization_url(&self, state: Option<&str>) -> Result<AuthorizationRequest> {
        self.require_grant(GrantType::AuthorizationCode, "authorization_url")?;
        Ok(self.flow().authorize(state))
    }

    /// Redeems the code from the authorization redirect and stores the result.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedGrantType`, `StateMismatch`, `AuthorizationExpired`
    /// or `TokenAcquisitionFailed`. Nothing is stored on failure.
    pub async fn exchange_code_for_token(
        &self,
        pending: &AuthorizationRequest,
        code: &str,
        state: &str,
    ) -> Result<Credential> {
        self.require_grant(GrantType::AuthorizationCode, "exchange_code_for_token")?;
        let credential = self.flow().exchange_code(pending, code, state).await?;

        let mut cache = self.cache.lock().await;
        self.persist(&credential).await;
        cache.credential = Some(credential.clone());
        cache.loaded = true;

        info!(client_id = %self.client.client_id, "Authorization code exchanged");
        Ok(credential)
    }

    /// Returns a token that is valid for at least the refresh margin.
    ///
    /// # Errors
    ///
    /// Returns `AuthRequired` when the authorization code grant has no usable
    /// refresh token or the refresh is rejected, and `TokenAcquisitionFailed`
    /// when the token endpoint cannot be reached or fails with a server
    /// error. In that case the stored credential is kept.
    pub async fn access_token(&self) -> Result<String> {
        if !self.is_configured() {
            return Err(Error::InvalidConfig(
                "tenant id, client id and client secret are required".into(),
            ));
        }

        let mut cache = self.cache.lock().await;
        self.ensure_loaded(&mut cache).await;

        if let Some(credential) = cache
            .credential
            .as_ref()
            .filter(|c| c.is_fresh_at(Utc::now()))
        {
            debug!("Serving cached access token");
            return Ok(credential.access_token.clone());
        }

        let credential = match self.grant {
            GrantType::ClientCredentials => {
                info!(client_id = %self.client.client_id, "Acquiring client credentials token");
                self.client.client_credentials_token().await?
            }
            GrantType::AuthorizationCode => {
                let Some(current) = cache.credential.as_ref() else {
                    debug!("No stored credential, authorization required");
                    return Err(Error::AuthRequired);
                };
                let Some(refresh_token) = current.refresh_token.clone() else {
                    debug!("No refresh token available");
                    self.forget(&mut cache).await;
                    return Err(Error::AuthRequired);
                };

                info!(client_id = %self.client.client_id, "Refreshing access token");
                match self.client.refresh(&refresh_token).await {
                    Ok(credential) => credential,
                    // Credential stays cached and stored for the next attempt.
                    Err(e) if e.is_transient() => {
                        warn!("Token refresh failed, keeping stored credential: {e}");
                        return Err(e);
                    }
                    Err(e) => {
                        warn!("Token refresh failed, interactive authorization required: {e}");
                        self.forget(&mut cache).await;
                        return Err(Error::AuthRequired);
                    }
                }
            }
        };

        self.persist(&credential).await;
        let token = credential.access_token.clone();
        cache.credential = Some(credential);
        Ok(token)
    }

    /// Snapshot of the cached credential.
    pub async fn token_info(&self) -> TokenInfo {
        let mut cache = self.cache.lock().await;
        self.ensure_loaded(&mut cache).await;
        cache.credential.as_ref().map_or_else(
            || TokenInfo::empty(self.grant),
            |c| c.info_at(Utc::now()),
        )
    }

    /// Drops the credential from memory and from the store.
    pub async fn clear_tokens(&self) {
        let mut cache = self.cache.lock().await;
        self.forget(&mut cache).await;
        info!(client_id = %self.client.client_id, "Cleared stored tokens");
    }

    fn flow(&self) -> AuthorizationCodeFlow<'_> {
        AuthorizationCodeFlow::new(&self.client).with_pkce(self.use_pkce)
    }

    fn require_grant(&self, required: GrantType, operation: &'static str) -> Result<()> {
        if self.grant == required {
            Ok(())
        } else {
            Err(Error::UnsupportedGrantType {
                operation,
                grant: self.grant,
            })
        }
    }

    async fn ensure_loaded(&self, cache: &mut Cache) {
        if cache.loaded {
            return;
        }
        cache.loaded = true;

        cache.credential = match self.store.load(&self.client.client_id).await {
            Ok(Some(credential)) if credential.grant_type == self.grant => {
                debug!("Loaded stored token, expires at {}", credential.expires_at);
                Some(credential)
            }
            Ok(Some(credential)) => {
                debug!(
                    "Ignoring stored {} token, configured grant is {}",
                    credential.grant_type, self.grant
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to load stored token, continuing without it: {e}");
                None
            }
        };
    }

    async fn persist(&self, credential: &Credential) {
        if let Err(e) = self.store.save(&self.client.client_id, credential).await {
            warn!("Failed to persist token: {e}");
        }
    }

    async fn forget(&self, cache: &mut Cache) {
        cache.credential = None;
        cache.loaded = true;
        if let Err(e) = self.store.delete(&self.client.client_id).await {
            warn!("Failed to delete stored token: {e}");
        }
    }
}
