//! Durable credential storage.
//!
//! One [`Credential`] is kept per client identifier. Backends are selected
//! by configuration through [`TokenStoreKind`] and used behind
//! `Arc<dyn TokenStore>`.

mod file;
mod sqlite;

pub use file::FileTokenStore;
pub use sqlite::SqliteTokenStore;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, StoreResult};
use crate::token::Credential;

/// Key-value persistence of one credential per client identifier.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Loads the credential for `client_id`, if any.
    async fn load(&self, client_id: &str) -> StoreResult<Option<Credential>>;

    /// Inserts or replaces the credential for `client_id`.
    async fn save(&self, client_id: &str, credential: &Credential) -> StoreResult<()>;

    /// Removes the credential for `client_id`. Missing entries are not an error.
    async fn delete(&self, client_id: &str) -> StoreResult<()>;
}

/// Token store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenStoreKind {
    /// JSON file with atomic replace.
    #[default]
    File,
    /// `SQLite` table.
    Sqlite,
}

impl TokenStoreKind {
    /// Default file name for the backend.
    #[must_use]
    pub const fn default_file_name(self) -> &'static str {
        match self {
            Self::File => "oauth_tokens.json",
            Self::Sqlite => "oauth_tokens.db",
        }
    }

    /// Opens the backend at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the `SQLite` database cannot be opened.
    pub async fn open(self, path: impl Into<PathBuf>) -> StoreResult<Arc<dyn TokenStore>> {
        Ok(match self {
            Self::File => Arc::new(FileTokenStore::new(path)),
            Self::Sqlite => Arc::new(SqliteTokenStore::open(path.into()).await?),
        })
    }
}

impl fmt::Display for TokenStoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::File => "file",
            Self::Sqlite => "sqlite",
        })
    }
}

impl FromStr for TokenStoreKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" | "json" => Ok(Self::File),
            "sqlite" | "database" | "db" => Ok(Self::Sqlite),
            other => Err(Error::InvalidConfig(format!("unknown token store `{other}`"))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_store_kind_parse() {
        assert_eq!("file".parse::<TokenStoreKind>().unwrap(), TokenStoreKind::File);
        assert_eq!("SQLite".parse::<TokenStoreKind>().unwrap(), TokenStoreKind::Sqlite);
        assert!("redis".parse::<TokenStoreKind>().is_err());
        assert_eq!(TokenStoreKind::default(), TokenStoreKind::File);
    }

    #[tokio::test]
    async fn test_open_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStoreKind::File
            .open(dir.path().join(TokenStoreKind::File.default_file_name()))
            .await
            .unwrap();
        assert!(store.load("anyone").await.unwrap().is_none());
    }
}
