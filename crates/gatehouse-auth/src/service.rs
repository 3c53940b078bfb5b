//! Wiring of the authentication components from configuration
//!
//! Construct one [`AuthService`] at process start and pass it (or the parts
//! it exposes) to whatever needs it.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::AuthConfig;
use crate::middleware::{SessionBinder, SessionBinderBuilder};
use crate::providers::LocalStrategy;
use crate::session::{FileSessionStore, MemorySessionStore};
use crate::store::FileUserStore;
use crate::traits::{CredentialStrategy, SessionStore};
use crate::user::User;
use crate::utils::{PasswordHasherFactory, PasswordPolicy};
use crate::{AuthError, AuthResult, PasswordHasher, UserRepository};

/// The assembled authentication subsystem
pub struct AuthService {
    config: AuthConfig,
    hasher: Arc<dyn PasswordHasher>,
    users: Arc<dyn UserRepository>,
    strategy: Arc<dyn CredentialStrategy>,
    binder: SessionBinder,
}

impl AuthService {
    /// Build the file-backed user store, the configured session store and the
    /// local strategy from `config`
    pub fn from_config(config: AuthConfig) -> AuthResult<Self> {
        config.validate()?;

        let hasher = PasswordHasherFactory::from_config(&config.password)?;
        let users: Arc<dyn UserRepository> = Arc::new(FileUserStore::with_policy(
            config.store.path.clone(),
            hasher.clone(),
            PasswordPolicy::from_config(&config.password),
        ));

        let sessions: Arc<dyn SessionStore> = match config.session.storage.as_str() {
            "memory" => Arc::new(MemorySessionStore::new()),
            "file" => Arc::new(FileSessionStore::new(config.session.path.clone())),
            other => {
                return Err(AuthError::config_error(format!(
                    "Invalid session storage backend: {}",
                    other
                )))
            }
        };

        tracing::debug!(
            users = %config.store.path.display(),
            sessions = %config.session.storage,
            hasher = hasher.hasher_name(),
            "Authentication service configured"
        );

        Self::with_components(config, hasher, users, sessions)
    }

    /// Assemble the service around an existing user store and session store
    pub fn with_components(
        config: AuthConfig,
        hasher: Arc<dyn PasswordHasher>,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionStore>,
    ) -> AuthResult<Self> {
        let strategy: Arc<dyn CredentialStrategy> =
            Arc::new(LocalStrategy::new(users.clone(), hasher.clone()));

        let binder = SessionBinderBuilder::new()
            .strategy(strategy.clone())
            .users(users.clone())
            .sessions(sessions)
            .config(&config.session)?
            .build()?;

        Ok(Self {
            config,
            hasher,
            users,
            strategy,
            binder,
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn hasher(&self) -> &Arc<dyn PasswordHasher> {
        &self.hasher
    }

    pub fn users(&self) -> &Arc<dyn UserRepository> {
        &self.users
    }

    pub fn strategy(&self) -> &Arc<dyn CredentialStrategy> {
        &self.strategy
    }

    pub fn binder(&self) -> &SessionBinder {
        &self.binder
    }

    /// Remove expired sessions from the session store once
    pub async fn reap_expired_sessions(&self) -> AuthResult<u64> {
        self.binder.sessions().cleanup_expired().await
    }

    /// Start a background task that removes expired sessions every
    /// `session.cleanup_interval` seconds. Returns `None` when the interval
    /// is 0. Must be called from within a tokio runtime; abort the handle to
    /// stop it.
    pub fn spawn_session_reaper(&self) -> Option<JoinHandle<()>> {
        let every = self.config.session.cleanup_interval;
        if every == 0 {
            return None;
        }

        let sessions = self.binder.sessions().clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(every));
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match sessions.cleanup_expired().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::debug!(removed, "Reaped expired sessions"),
                    Err(e) => tracing::warn!(error = %e, "Session cleanup failed"),
                }
            }
        }))
    }

    /// Register a new user
    pub async fn register(&self, username: &str, password: &str) -> AuthResult<User> {
        self.users.add_user(username, password).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{LoginOutcome, RequestSession};
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> AuthConfig {
        let mut config = AuthConfig::testing();
        config.store.path = dir.path().join(".users");
        config.session.storage = "file".to_string();
        config.session.path = dir.path().join("sessions");
        config
    }

    #[tokio::test]
    async fn test_from_config_wires_file_backends() {
        let dir = TempDir::new().unwrap();
        let service = AuthService::from_config(config(&dir)).unwrap();
        assert_eq!(service.hasher().hasher_name(), "argon2");
        assert_eq!(service.strategy().strategy_name(), "local");

        service.register("alice", "secret1").await.unwrap();
        assert!(dir.path().join(".users").exists());

        let mut session = service.binder().restore(None).await.unwrap();
        let outcome = service.binder().login(&mut session, "alice", "secret1").await.unwrap();
        assert!(matches!(outcome, LoginOutcome::LoggedIn { .. }));
        assert_eq!(std::fs::read_dir(dir.path().join("sessions")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_policy_from_config_applies() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.password.min_length = 10;
        let service = AuthService::from_config(config).unwrap();

        let err = service.register("alice", "secret1").await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PASSWORD");
    }

    async fn login_alice(service: &AuthService) {
        let mut session = RequestSession::anonymous();
        let outcome = service.binder().login(&mut session, "alice", "secret1").await.unwrap();
        assert!(matches!(outcome, LoginOutcome::LoggedIn { .. }));
    }

    fn session_files(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path().join("sessions")).unwrap().count()
    }

    #[tokio::test]
    async fn test_reap_expired_sessions() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.session.ttl = 1;
        let service = AuthService::from_config(config).unwrap();
        service.register("alice", "secret1").await.unwrap();

        for _ in 0..3 {
            login_alice(&service).await;
        }
        assert_eq!(session_files(&dir), 3);
        assert_eq!(service.reap_expired_sessions().await.unwrap(), 0);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(service.reap_expired_sessions().await.unwrap(), 3);
        assert_eq!(session_files(&dir), 0);
    }

    #[tokio::test]
    async fn test_session_reaper_task() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.session.ttl = 1;
        config.session.cleanup_interval = 1;
        let service = AuthService::from_config(config).unwrap();
        service.register("alice", "secret1").await.unwrap();

        login_alice(&service).await;
        login_alice(&service).await;
        assert_eq!(session_files(&dir), 2);

        let reaper = service.spawn_session_reaper().unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        reaper.abort();
        assert_eq!(session_files(&dir), 0);
    }

    #[test]
    fn test_reaper_disabled_with_zero_interval() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.session.cleanup_interval = 0;
        let service = AuthService::from_config(config).unwrap();
        assert!(service.spawn_session_reaper().is_none());
    }

    #[tokio::test]
    async fn test_bcrypt_registration_rejects_truncated_passwords() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.password.hash_algorithm = "bcrypt".to_string();
        config.password.bcrypt_cost = 4;
        let service = AuthService::from_config(config).unwrap();

        let long = format!("{}X", "a".repeat(72));
        let err = service.register("alice", &long).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PASSWORD");
        assert!(service.users().list_users().await.unwrap().is_empty());

        service.register("alice", &"a".repeat(72)).await.unwrap();
        let outcome = service
            .strategy()
            .authenticate("alice", &format!("{}Y", "a".repeat(72)))
            .await
            .unwrap();
        assert!(outcome.into_result().is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.session.storage = "redis".to_string();
        assert!(AuthService::from_config(config).is_err());
    }
}
