//! JSON file token store.
//!
//! Layout: `{ "<client_id>": { access_token, refresh_token, expires_at,
//! grant_type, updated_at }, ... }`. Every write replaces the whole file via
//! a temp file in the same directory and a rename, so readers never see a
//! partial document.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::TokenStore;
use crate::error::{StoreError, StoreResult};
use crate::token::Credential;

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    #[serde(flatten)]
    credential: Credential,
    updated_at: DateTime<Utc>,
}

type Document = BTreeMap<String, Entry>;

/// Token store backed by a single JSON file.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    /// Creates a store at `path`. The file is created on first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the token file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> StoreResult<Document> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Document::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Document::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Like `read_document`, but an unparsable file reads as empty so the
    /// next write replaces it. The flag reports whether that happened.
    async fn read_document_for_write(&self) -> StoreResult<(Document, bool)> {
        match self.read_document().await {
            Ok(document) => Ok((document, false)),
            Err(StoreError::Json(e)) => {
                warn!(path = %self.path.display(), "Token file is corrupt, replacing it: {e}");
                Ok((Document::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    async fn write_document(&self, document: &Document) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(document)?;
        let tmp = self.temp_path();

        let written: std::io::Result<()> = async {
            let mut options = tokio::fs::OpenOptions::new();
            options.write(true).create(true).truncate(true);
            #[cfg(unix)]
            options.mode(0o600);

            let mut file = options.open(&tmp).await?;
            file.write_all(&json).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, &self.path).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| "tokens".into(), |n| n.to_string_lossy().into_owned());
        let suffix: u32 = rand::thread_rng().r#gen();
        self.path
            .with_file_name(format!(".{name}.{}.{suffix:08x}.tmp", std::process::id()))
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self, client_id: &str) -> StoreResult<Option<Credential>> {
        let mut document = self.read_document().await?;
        Ok(document
            .remove(client_id)
            .map(|entry| entry.credential.normalized()))
    }

    async fn save(&self, client_id: &str, credential: &Credential) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let (mut document, _) = self.read_document_for_write().await?;
        document.insert(
            client_id.to_string(),
            Entry {
                credential: credential.clone(),
                updated_at: Utc::now(),
            },
        );
        self.write_document(&document).await?;
        debug!(path = %self.path.display(), "Saved token for client {client_id}");
        Ok(())
    }

    async fn delete(&self, client_id: &str) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let (mut document, repaired) = self.read_document_for_write().await?;
        if document.remove(client_id).is_none() && !repaired {
            return Ok(());
        }
        self.write_document(&document).await?;
        debug!(path = %self.path.display(), "Deleted token for client {client_id}");
        Ok(())
    }
}
