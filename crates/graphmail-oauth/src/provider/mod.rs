//! Microsoft identity platform endpoint configuration.

use crate::error::{Error, Result};
use url::Url;

/// Public-cloud authority host.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Scope requested when none is configured.
pub const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/Mail.Send";

/// `OAuth2` provider configuration.
#[derive(Debug, Clone)]
pub struct Provider {
    /// Provider name (e.g., "Microsoft").
    pub name: String,
    /// Authorization endpoint URL.
    pub auth_url: Url,
    /// Token endpoint URL.
    pub token_url: Url,
    /// Default scopes.
    pub default_scopes: Vec<String>,
}

impl Provider {
    /// Creates a new provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if URLs are invalid.
    pub fn new(
        name: impl Into<String>,
        auth_url: impl AsRef<str>,
        token_url: impl AsRef<str>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            auth_url: Url::parse(auth_url.as_ref())?,
            token_url: Url::parse(token_url.as_ref())?,
            default_scopes: Vec::new(),
        })
    }

    /// Sets the default scopes.
    #[must_use]
    pub fn with_default_scopes(mut self, scopes: Vec<String>) -> Self {
        self.default_scopes = scopes;
        self
    }

    /// Microsoft identity platform (v2.0 endpoints) for a tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if URL parsing fails.
    pub fn microsoft(tenant: &str) -> Result<Self> {
        Self::microsoft_at(DEFAULT_AUTHORITY, tenant)
    }

    /// Microsoft identity platform rooted at a custom authority host
    /// (sovereign clouds, local test servers).
    ///
    /// # Errors
    ///
    /// Returns an error if the authority is not a valid base URL.
    pub fn microsoft_at(authority: &str, tenant: &str) -> Result<Self> {
        let base = Url::parse(authority.trim_end_matches('/'))?;
        let endpoint = |leaf: &str| -> Result<Url> {
            let mut url = base.clone();
            url.path_segments_mut()
                .map_err(|()| Error::InvalidConfig(format!("{authority} cannot be a base URL")))?
                .pop_if_empty()
                .extend([tenant, "oauth2", "v2.0", leaf]);
            Ok(url)
        };

        Ok(Self {
            name: "Microsoft".to_string(),
            auth_url: endpoint("authorize")?,
            token_url: endpoint("token")?,
            default_scopes: vec![DEFAULT_SCOPE.to_string()],
        })
    }

    /// Validates that required URLs are set.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.auth_url.as_str().is_empty() {
            return Err(Error::InvalidConfig("auth_url is empty".into()));
        }
        if self.token_url.as_str().is_empty() {
            return Err(Error::InvalidConfig("token_url is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_microsoft_provider() {
        let provider = Provider::microsoft("contoso.onmicrosoft.com").unwrap();
        assert_eq!(provider.name, "Microsoft");
        assert_eq!(
            provider.auth_url.as_str(),
            "https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/v2.0/authorize"
        );
        assert_eq!(
            provider.token_url.as_str(),
            "https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/v2.0/token"
        );
        assert_eq!(provider.default_scopes, vec![DEFAULT_SCOPE.to_string()]);
        provider.validate().unwrap();
    }

    #[test]
    fn test_custom_authority() {
        let provider = Provider::microsoft_at("http://127.0.0.1:4010/", "tenant-1").unwrap();
        assert_eq!(
            provider.token_url.as_str(),
            "http://127.0.0.1:4010/tenant-1/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_tenant_is_path_encoded() {
        let provider = Provider::microsoft("a b").unwrap();
        assert!(provider.token_url.as_str().contains("/a%20b/oauth2/"));
    }

    #[test]
    fn test_custom_provider() {
        let provider = Provider::new(
            "Custom",
            "https://auth.example.com/authorize",
            "https://auth.example.com/token",
        )
        .unwrap()
        .with_default_scopes(vec!["email".to_string()]);

        assert_eq!(provider.name, "Custom");
        assert_eq!(provider.default_scopes.len(), 1);
        provider.validate().unwrap();
    }

    #[test]
    fn test_invalid_authority() {
        assert!(Provider::microsoft_at("not a url", "t").is_err());
    }
}
