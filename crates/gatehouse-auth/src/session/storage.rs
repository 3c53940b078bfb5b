//! Session store backends

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::id::SessionId;
use crate::traits::{SessionRecord, SessionStore};
use crate::utils::CryptoUtils;
use crate::{AuthError, AuthResult};

/// In-memory session store
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, expired ones included
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> AuthResult<Option<SessionRecord>> {
        let record = self.sessions.read().await.get(id).cloned();
        match record {
            Some(record) if record.is_expired() => {
                let mut sessions = self.sessions.write().await;
                if sessions.get(id).is_some_and(SessionRecord::is_expired) {
                    sessions.remove(id);
                }
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn save(&self, id: &str, record: SessionRecord) -> AuthResult<()> {
        self.sessions.write().await.insert(id.to_string(), record);
        Ok(())
    }

    async fn destroy(&self, id: &str) -> AuthResult<()> {
        self.sessions.write().await.remove(id);
        Ok(())
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, record| !record.is_expired_at(now));
        Ok((before - sessions.len()) as u64)
    }
}

/// One JSON file per session inside a directory. Unreadable session files
/// are treated as absent rather than retried.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self, id: &str) -> AuthResult<PathBuf> {
        if !SessionId::is_valid(id) {
            return Err(AuthError::session_error("Malformed session id"));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }

    async fn read_record(path: &Path) -> AuthResult<Option<SessionRecord>> {
        let data = match fs::read_to_string(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AuthError::session_error(format!(
                    "Failed to read session {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        match serde_json::from_str(&data) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable session file");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, id: &str) -> AuthResult<Option<SessionRecord>> {
        let path = self.session_path(id)?;
        match Self::read_record(&path).await? {
            Some(record) if record.is_expired() => {
                if let Err(e) = fs::remove_file(&path).await {
                    if e.kind() != ErrorKind::NotFound {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to remove expired session");
                    }
                }
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn save(&self, id: &str, record: SessionRecord) -> AuthResult<()> {
        let path = self.session_path(id)?;
        let data = serde_json::to_vec(&record)
            .map_err(|e| AuthError::session_error(format!("Failed to encode session: {}", e)))?;

        let tmp_path = self
            .dir
            .join(format!(".{}.{}.tmp", id, CryptoUtils::generate_random_string(8)));

        let result = async {
            fs::create_dir_all(&self.dir).await?;
            let mut file = fs::File::create(&tmp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&tmp_path, &path).await
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(AuthError::session_error(format!("Failed to write session: {}", e)));
        }
        Ok(())
    }

    async fn destroy(&self, id: &str) -> AuthResult<()> {
        let path = self.session_path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::session_error(format!("Failed to destroy session: {}", e))),
        }
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(AuthError::session_error(e.to_string())),
        };

        let now = Utc::now();
        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AuthError::session_error(e.to_string()))?
        {
            let path = entry.path();
            let is_session = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(SessionId::is_valid)
                .unwrap_or(false)
                && path.extension().and_then(|ext| ext.to_str()) == Some("json");
            if !is_session {
                continue;
            }

            let expired = match Self::read_record(&path).await? {
                Some(record) => record.is_expired_at(now),
                None => true,
            };
            if expired && fs::remove_file(&path).await.is_ok() {
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::debug!(removed, "Removed expired sessions");
        }
        Ok(removed)
    }
}
