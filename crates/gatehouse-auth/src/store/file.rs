//! File-backed user store

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::{hash_off_thread, validate_registration};
use crate::user::{User, UserFile, UserId};
use crate::utils::{CryptoUtils, PasswordPolicy};
use crate::{AuthError, AuthResult, PasswordHasher, UserRepository};

/// User store persisted as a single JSON document.
///
/// Every operation re-reads the file, so the file stays the single source of
/// truth. A missing file is an empty store.
pub struct FileUserStore {
    path: PathBuf,
    hasher: Arc<dyn PasswordHasher>,
    policy: PasswordPolicy,
    lock: Arc<RwLock<()>>,
}

impl FileUserStore {
    /// Create a store over `path` using the default password policy
    pub fn new(path: impl Into<PathBuf>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self::with_policy(path, hasher, PasswordPolicy::default())
    }

    pub fn with_policy(
        path: impl Into<PathBuf>,
        hasher: Arc<dyn PasswordHasher>,
        policy: PasswordPolicy,
    ) -> Self {
        Self {
            path: path.into(),
            hasher,
            policy,
            lock: Arc::new(RwLock::new(())),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn snapshot(&self) -> AuthResult<UserFile> {
        let _guard = self.lock.read().await;
        read_user_file(&self.path).await
    }
}

async fn read_user_file(path: &Path) -> AuthResult<UserFile> {
    match fs::read_to_string(path).await {
        Ok(data) => Ok(UserFile::parse(&data)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(UserFile::default()),
        Err(e) => Err(AuthError::store_unavailable(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Write to a sibling temporary file, sync it and rename it over the target
/// so readers see either the old or the new collection, never a torn one.
async fn write_user_file(path: &Path, users: &UserFile) -> AuthResult<()> {
    let data = users.to_json()?;

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).await?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "users".to_string());
    let tmp_path = parent.join(format!(".{}.{}.tmp", file_name, CryptoUtils::generate_random_string(8)));

    let result = async {
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(data.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp_path, path).await
    }
    .await;

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path).await;
        tracing::error!(path = %path.display(), error = %e, "Failed to persist user store");
        return Err(AuthError::store_unavailable(format!(
            "Failed to write {}: {}",
            path.display(),
            e
        )));
    }

    Ok(())
}

#[async_trait]
impl UserRepository for FileUserStore {
    async fn list_users(&self) -> AuthResult<Vec<User>> {
        Ok(self.snapshot().await?.users)
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        Ok(self.snapshot().await?.find_by_username(username).cloned())
    }

    async fn find_by_id(&self, id: UserId) -> AuthResult<Option<User>> {
        Ok(self.snapshot().await?.find_by_id(id).cloned())
    }

    async fn add_user_with_role(
        &self,
        username: &str,
        password: &str,
        role: Option<String>,
    ) -> AuthResult<User> {
        validate_registration(&self.policy, username, password)?;

        if self.find_by_username(username).await?.is_some() {
            return Err(AuthError::duplicate_username(username));
        }

        let password_hash = hash_off_thread(self.hasher.clone(), password).await?;

        // The read-modify-write runs as its own task holding an owned guard:
        // if the caller is dropped mid-way the write still finishes and the
        // lock is only released afterwards.
        let guard = self.lock.clone().write_owned().await;
        let path = self.path.clone();
        let username = username.to_string();
        let user = tokio::spawn(async move {
            let _guard = guard;
            let mut users = read_user_file(&path).await?;
            if users.find_by_username(&username).is_some() {
                return Err(AuthError::duplicate_username(username));
            }
            let user = users.push(username, password_hash, role)?;
            write_user_file(&path, &users).await?;
            Ok::<User, AuthError>(user)
        })
        .await??;

        tracing::info!(user_id = user.id, username = %user.username, "Registered user");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Argon2Hasher;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FileUserStore {
        FileUserStore::new(dir.path().join(".users"), Arc::new(Argon2Hasher::development()))
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.list_users().await.unwrap().is_empty());
        assert!(store.find_by_username("alice").await.unwrap().is_none());
        assert!(store.find_by_id(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_and_find() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let alice = store.add_user("alice", "secret1").await.unwrap();
        let bob = store.add_user_with_role("bob", "secret2", Some("admin".to_string())).await.unwrap();
        assert_eq!(alice.id, 1);
        assert_eq!(bob.id, 2);

        let found = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found, alice);
        assert_ne!(found.password_hash, "secret1");

        assert_eq!(store.find_by_id(2).await.unwrap().unwrap().role(), Some("admin"));
        assert!(store.find_by_username("Alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_keeps_one_record() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.add_user("alice", "secret1").await.unwrap();
        let err = store.add_user("alice", "another1").await.unwrap_err();
        assert_eq!(err, AuthError::duplicate_username("alice"));

        let users = store.list_users().await.unwrap();
        assert_eq!(users.iter().filter(|u| u.username == "alice").count(), 1);
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        store(&dir).add_user("alice", "secret1").await.unwrap();

        let reopened = store(&dir);
        let alice = reopened.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(alice.id, 1);
        assert_eq!(reopened.add_user("bob", "secret2").await.unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_external_removal() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.add_user("alice", "secret1").await.unwrap();
        store.add_user("bob", "secret2").await.unwrap();

        let mut users = read_user_file(store.path()).await.unwrap();
        users.users.retain(|u| u.username != "alice");
        write_user_file(store.path(), &users).await.unwrap();

        let carol = store.add_user("carol", "secret3").await.unwrap();
        assert_eq!(carol.id, 3);
    }

    #[tokio::test]
    async fn test_reads_legacy_file() {
        let dir = TempDir::new().unwrap();
        let legacy_hash = Argon2Hasher::development().hash_password("secret1").unwrap();
        let legacy = serde_json::json!([
            { "id": 1, "username": "alice", "password": legacy_hash }
        ]);
        std::fs::write(dir.path().join(".users"), legacy.to_string()).unwrap();

        let store = store(&dir);
        let alice = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(alice.password_hash, legacy_hash);
        assert_eq!(store.add_user("bob", "secret2").await.unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_store_unavailable() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".users"), "{ definitely not json").unwrap();

        let store = store(&dir);
        let err = store.list_users().await.unwrap_err();
        assert_eq!(err.error_code(), "STORE_UNAVAILABLE");

        let err = store.add_user("alice", "secret1").await.unwrap_err();
        assert_eq!(err.error_code(), "STORE_UNAVAILABLE");
        let contents = std::fs::read_to_string(dir.path().join(".users")).unwrap();
        assert_eq!(contents, "{ definitely not json");
    }

    #[tokio::test]
    async fn test_rejects_invalid_registration() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert_eq!(store.add_user("", "secret1").await.unwrap_err().error_code(), "INVALID_USERNAME");
        assert_eq!(store.add_user("alice", "").await.unwrap_err().error_code(), "INVALID_PASSWORD");
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.add_user("alice", "secret1").await.unwrap();
        store.add_user("bob", "secret2").await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec![".users".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_existing_records() {
        let dir = TempDir::new().unwrap();
        // The target name fits the filesystem limit but its temporary sibling
        // does not, so every write fails after the read succeeds
        let path = dir.path().join("u".repeat(245));
        let hasher = Arc::new(Argon2Hasher::development());
        let seeded = serde_json::json!({
            "next_id": 2,
            "users": [
                { "id": 1, "username": "alice", "password_hash": hasher.hash_password("secret1").unwrap() }
            ]
        })
        .to_string();
        std::fs::write(&path, &seeded).unwrap();

        let store = FileUserStore::new(&path, hasher);
        let err = store.add_user("bob", "secret2").await.unwrap_err();
        assert_eq!(err.error_code(), "STORE_UNAVAILABLE");

        assert_eq!(std::fs::read_to_string(&path).unwrap(), seeded);
        let users = store.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "alice");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_registration_is_all_or_nothing() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(store(&dir));
        store.add_user("alice", "secret1").await.unwrap();

        for (i, delay_ms) in [0u64, 1, 2, 5, 10, 20, 50].into_iter().enumerate() {
            let username = format!("user{}", i);
            let handle = {
                let store = store.clone();
                let username = username.clone();
                tokio::spawn(async move { store.add_user(&username, "secret1").await })
            };
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            handle.abort();
            let finished = handle.await;

            // Waits for any in-flight write, then must parse cleanly
            let users = store.list_users().await.unwrap();
            let present = users.iter().filter(|u| u.username == username).count();
            assert!(present <= 1);
            if let Ok(Ok(user)) = finished {
                assert_eq!(present, 1);
                assert!(users.contains(&user));
            }

            let mut ids: Vec<_> = users.iter().map(|u| u.id).collect();
            ids.dedup();
            assert_eq!(ids.len(), users.len());
        }

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec![".users".to_string()]);

        let after = store.add_user("zoe", "secret1").await.unwrap();
        assert!(store.find_by_id(after.id).await.unwrap().is_some());
    }
}
