//! Service configuration.
//!
//! Values come from explicit builders or from `GRAPHMAIL_*` environment
//! variables; every input is optional and falls back to a default.

use std::fmt;
use std::path::PathBuf;

use graphmail_oauth::provider::{DEFAULT_AUTHORITY, DEFAULT_SCOPE};
use graphmail_oauth::{GrantType, TokenStoreKind};

use crate::error::{Error, Result};
use crate::graph::DEFAULT_GRAPH_BASE_URL;

/// Environment variable names.
pub mod env {
    /// Directory (tenant) id.
    pub const TENANT_ID: &str = "GRAPHMAIL_TENANT_ID";
    /// Application (client) id.
    pub const CLIENT_ID: &str = "GRAPHMAIL_CLIENT_ID";
    /// Client secret.
    pub const CLIENT_SECRET: &str = "GRAPHMAIL_CLIENT_SECRET";
    /// Redirect URI registered for the authorization code grant.
    pub const REDIRECT_URI: &str = "GRAPHMAIL_REDIRECT_URI";
    /// Space separated scopes.
    pub const SCOPE: &str = "GRAPHMAIL_SCOPE";
    /// `client_credentials` or `authorization_code`.
    pub const GRANT_TYPE: &str = "GRAPHMAIL_GRANT_TYPE";
    /// Enables PKCE on authorization requests.
    pub const USE_PKCE: &str = "GRAPHMAIL_USE_PKCE";
    /// Default sender address.
    pub const FROM_ADDRESS: &str = "GRAPHMAIL_FROM_ADDRESS";
    /// Default sender display name.
    pub const FROM_NAME: &str = "GRAPHMAIL_FROM_NAME";
    /// `file` or `sqlite`.
    pub const TOKEN_STORE: &str = "GRAPHMAIL_TOKEN_STORE";
    /// Token store location.
    pub const TOKEN_PATH: &str = "GRAPHMAIL_TOKEN_PATH";
    /// Identity platform authority host.
    pub const AUTHORITY_HOST: &str = "GRAPHMAIL_AUTHORITY_HOST";
    /// Microsoft Graph base URL.
    pub const GRAPH_BASE_URL: &str = "GRAPHMAIL_GRAPH_BASE_URL";
}

/// Immutable service configuration.
#[derive(Clone)]
pub struct Config {
    /// Directory (tenant) id.
    pub tenant_id: String,
    /// Application (client) id.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
    /// Redirect URI for the authorization code grant.
    pub redirect_uri: Option<String>,
    /// Space separated scope string.
    pub scope: String,
    /// Grant used to obtain tokens.
    pub grant_type: GrantType,
    /// Add PKCE to authorization requests.
    pub use_pkce: bool,
    /// Default sender address.
    pub from_address: Option<String>,
    /// Default sender display name.
    pub from_name: Option<String>,
    /// Token store backend.
    pub token_store: TokenStoreKind,
    /// Token store location.
    pub token_path: PathBuf,
    /// Identity platform authority host.
    pub authority_host: String,
    /// Microsoft Graph base URL (including version segment).
    pub graph_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: None,
            scope: DEFAULT_SCOPE.to_string(),
            grant_type: GrantType::default(),
            use_pkce: false,
            from_address: None,
            from_name: None,
            token_store: TokenStoreKind::default(),
            token_path: default_token_path(TokenStoreKind::default()),
            authority_host: DEFAULT_AUTHORITY.to_string(),
            graph_base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &if self.client_secret.is_empty() { "" } else { "***" })
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .field("grant_type", &self.grant_type)
            .field("use_pkce", &self.use_pkce)
            .field("from_address", &self.from_address)
            .field("from_name", &self.from_name)
            .field("token_store", &self.token_store)
            .field("token_path", &self.token_path)
            .field("authority_host", &self.authority_host)
            .field("graph_base_url", &self.graph_base_url)
            .finish()
    }
}

impl Config {
    /// Creates a configuration with the three required credentials.
    #[must_use]
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from `GRAPHMAIL_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown grant type or token store kind.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown grant type or token store kind.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let grant_type = get(env::GRANT_TYPE)
            .map(|v| v.parse::<GrantType>())
            .transpose()
            .map_err(|e| Error::Config(e.to_string()))?
            .unwrap_or(defaults.grant_type);

        let token_store = get(env::TOKEN_STORE)
            .map(|v| v.parse::<TokenStoreKind>())
            .transpose()
            .map_err(|e| Error::Config(e.to_string()))?
            .unwrap_or(defaults.token_store);

        Ok(Self {
            tenant_id: get(env::TENANT_ID).unwrap_or_default(),
            client_id: get(env::CLIENT_ID).unwrap_or_default(),
            client_secret: get(env::CLIENT_SECRET).unwrap_or_default(),
            redirect_uri: get(env::REDIRECT_URI),
            scope: get(env::SCOPE).unwrap_or(defaults.scope),
            grant_type,
            use_pkce: get(env::USE_PKCE).is_some_and(|v| parse_flag(&v)),
            from_address: get(env::FROM_ADDRESS),
            from_name: get(env::FROM_NAME),
            token_store,
            token_path: get(env::TOKEN_PATH)
                .map_or_else(|| default_token_path(token_store), PathBuf::from),
            authority_host: get(env::AUTHORITY_HOST).unwrap_or(defaults.authority_host),
            graph_base_url: get(env::GRAPH_BASE_URL).unwrap_or(defaults.graph_base_url),
        })
    }

    /// True iff tenant id, client id and client secret are all non-empty.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.tenant_id.is_empty() && !self.client_id.is_empty() && !self.client_secret.is_empty()
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

    /// Sets the grant type.
    #[must_use]
    pub const fn with_grant_type(mut self, grant_type: GrantType) -> Self {
        self.grant_type = grant_type;
        self
    }

    /// Enables or disables PKCE.
    #[must_use]
    pub const fn with_pkce(mut self, enabled: bool) -> Self {
        self.use_pkce = enabled;
        self
    }

    /// Sets the default sender.
    #[must_use]
    pub fn with_sender(mut self, address: impl Into<String>, name: Option<String>) -> Self {
        self.from_address = Some(address.into());
        self.from_name = name;
        self
    }

    /// Selects the token store backend and location.
    #[must_use]
    pub fn with_token_store(mut self, kind: TokenStoreKind, path: impl Into<PathBuf>) -> Self {
        self.token_store = kind;
        self.token_path = path.into();
        self
    }

    /// Overrides the identity platform authority host.
    #[must_use]
    pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
        self.authority_host = host.into();
        self
    }

    /// Overrides the Microsoft Graph base URL.
    #[must_use]
    pub fn with_graph_base_url(mut self, url: impl Into<String>) -> Self {
        self.graph_base_url = url.into();
        self
    }
}

/// Default store location under the platform data directory.
#[must_use]
pub fn default_token_path(kind: TokenStoreKind) -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("graphmail")
        .join(kind.default_file_name())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
