//! `SQLite` token store.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::debug;

use super::TokenStore;
use crate::error::StoreResult;
use crate::token::{Credential, GrantType};

/// Service name recorded alongside each row.
pub const DEFAULT_SERVICE: &str = "microsoft_graph";

/// Token store backed by an `oauth_tokens` table.
#[derive(Debug, Clone)]
pub struct SqliteTokenStore {
    pool: SqlitePool,
    service: String,
}

impl SqliteTokenStore {
    /// Opens (creating if needed) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn open(path: PathBuf) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            service: DEFAULT_SERVICE.to_string(),
        };
        store.initialize().await?;
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self {
            pool,
            service: DEFAULT_SERVICE.to_string(),
        };
        store.initialize().await?;
        Ok(store)
    }

    /// Scopes rows to a different service name.
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    async fn initialize(&self) -> StoreResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_tokens (
                service TEXT NOT NULL,
                client_id TEXT NOT NULL,
                access_token TEXT NOT NULL,
                refresh_token TEXT,
                expires_at TEXT NOT NULL,
                grant_type TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (service, client_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl TokenStore for SqliteTokenStore {
    async fn load(&self, client_id: &str) -> StoreResult<Option<Credential>> {
        let row = sqlx::query(
            r"
            SELECT access_token, refresh_token, expires_at, grant_type
            FROM oauth_tokens
            WHERE service = ? AND client_id = ?
            ",
        )
        .bind(&self.service)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_credential).transpose()?)
    }

    async fn save(&self, client_id: &str, credential: &Credential) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO oauth_tokens
                (service, client_id, access_token, refresh_token, expires_at, grant_type)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (service, client_id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                grant_type = excluded.grant_type,
                updated_at = CURRENT_TIMESTAMP
            ",
        )
        .bind(&self.service)
        .bind(client_id)
        .bind(&credential.access_token)
        .bind(credential.refresh_token.as_deref())
        .bind(credential.expires_at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .bind(credential.grant_type.as_str())
        .execute(&self.pool)
        .await?;

        debug!(service = %self.service, "Saved token for client {client_id}");
        Ok(())
    }

    async fn delete(&self, client_id: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM oauth_tokens WHERE service = ? AND client_id = ?")
            .bind(&self.service)
            .bind(client_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            debug!(service = %self.service, "Deleted token for client {client_id}");
        }
        Ok(())
    }
}

fn row_to_credential(row: &SqliteRow) -> Result<Credential, sqlx::Error> {
    let expires_at: String = row.try_get("expires_at")?;
    let expires_at = DateTime::parse_from_rfc3339(&expires_at)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
        .with_timezone(&Utc);

    let grant_type: String = row.try_get("grant_type")?;
    let grant_type = match grant_type.as_str() {
        "authorization_code" => GrantType::AuthorizationCode,
        "client_credentials" => GrantType::ClientCredentials,
        other => return Err(sqlx::Error::Decode(format!("unknown grant type `{other}`").into())),
    };

    Ok(Credential {
        access_token: row.try_get("access_token")?,
        refresh_token: row.try_get("refresh_token")?,
        expires_at,
        grant_type,
    }
    .normalized())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn credential() -> Credential {
        Credential::new(
            "access",
            Utc::now() + Duration::seconds(3600),
            GrantType::AuthorizationCode,
        )
        .with_refresh_token("refresh")
    }

    #[tokio::test]
    async fn test_round_trip() {
        let store = SqliteTokenStore::in_memory().await.unwrap();
        let cred = credential();

        store.save("client-a", &cred).await.unwrap();
        assert_eq!(store.load("client-a").await.unwrap(), Some(cred));
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let store = SqliteTokenStore::in_memory().await.unwrap();
        store.save("client-a", &credential()).await.unwrap();

        let replacement = Credential::new(
            "app-token",
            Utc::now() + Duration::seconds(60),
            GrantType::ClientCredentials,
        );
        store.save("client-a", &replacement).await.unwrap();

        let loaded = store.load("client-a").await.unwrap().unwrap();
        assert_eq!(loaded, replacement);
        assert!(loaded.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = SqliteTokenStore::in_memory().await.unwrap();
        store.save("client-a", &credential()).await.unwrap();

        store.delete("client-a").await.unwrap();
        store.delete("client-a").await.unwrap();
        assert!(store.load("client-a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_services_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.db");

        let graph = SqliteTokenStore::open(path.clone()).await.unwrap();
        let other = SqliteTokenStore::open(path.clone())
            .await
            .unwrap()
            .with_service("other");

        graph.save("client-a", &credential()).await.unwrap();
        assert!(other.load("client-a").await.unwrap().is_none());

        drop(graph);
        let reopened = SqliteTokenStore::open(path).await.unwrap();
        assert!(reopened.load("client-a").await.unwrap().is_some());
    }
}
