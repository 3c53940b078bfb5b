//! End-to-end authentication flow tests
//!
//! Drives the components the way a route layer would: raw `Cookie` headers
//! in, `Set-Cookie` values out, and a protected handler behind the gate.

use std::collections::HashSet;
use std::sync::Arc;

use gatehouse_auth::utils::Argon2Hasher;
use gatehouse_auth::{
    require_authenticated, AuthConfig, AuthError, AuthService, CredentialStrategy, FileUserStore,
    LoginOutcome,
    MemorySessionStore, PasswordHasher, RequestSession, UserRepository,
};
use tempfile::TempDir;

fn service(dir: &TempDir) -> AuthService {
    let mut config = AuthConfig::testing();
    config.store.path = dir.path().join(".users");
    config.session.storage = "file".to_string();
    config.session.path = dir.path().join("sessions");
    AuthService::from_config(config).unwrap()
}

/// What a client sends back after receiving `set_cookie`
fn cookie_header(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap().to_string()
}

/// A protected handler: gate first, no side effects on rejection
fn protected(session: &RequestSession) -> Result<String, u16> {
    match require_authenticated(session.state()) {
        Ok(user) => Ok(format!("Welcome {}! This is a protected route.", user.username)),
        Err(err) => Err(err.status_code()),
    }
}

#[tokio::test]
async fn test_register_login_protected_logout() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir);
    let binder = service.binder();

    let alice = service.register("alice", "secret1").await.unwrap();
    assert_ne!(alice.password_hash, "secret1");

    // Anonymous access is rejected
    let anonymous = binder.restore(None).await.unwrap();
    assert_eq!(protected(&anonymous), Err(401));

    // Wrong password leaves the session anonymous
    let mut session = binder.restore(None).await.unwrap();
    let outcome = binder.login(&mut session, "alice", "wrong").await.unwrap();
    assert!(matches!(outcome, LoginOutcome::Rejected(_)));
    assert!(!session.is_authenticated());
    assert_eq!(protected(&session), Err(401));

    // Correct password authenticates
    let LoginOutcome::LoggedIn { user, set_cookie } =
        binder.login(&mut session, "alice", "secret1").await.unwrap()
    else {
        panic!("expected alice to log in");
    };
    assert_eq!(user.id, alice.id);
    assert!(session.is_authenticated());

    // Next request carries the cookie
    let cookie = cookie_header(&set_cookie);
    let mut next = binder.restore(Some(&cookie)).await.unwrap();
    assert_eq!(
        protected(&next),
        Ok("Welcome alice! This is a protected route.".to_string())
    );

    // Logout, then the same cookie no longer works
    binder.logout(&mut next).await.unwrap();
    let after_logout = binder.restore(Some(&cookie)).await.unwrap();
    assert_eq!(protected(&after_logout), Err(401));
}

#[tokio::test]
async fn test_rejections_do_not_enumerate_users() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir);
    service.register("alice", "secret1").await.unwrap();

    let unknown = service.strategy().authenticate("bob", "secret1").await.unwrap();
    let wrong = service.strategy().authenticate("alice", "nope").await.unwrap();
    assert_eq!(unknown, wrong);

    let unknown_err = unknown.into_result().unwrap_err();
    let wrong_err = wrong.into_result().unwrap_err();
    assert_eq!(unknown_err.to_string(), wrong_err.to_string());
    assert_eq!(unknown_err, AuthError::InvalidCredentials);
}

#[tokio::test]
async fn test_sessions_survive_service_restart() {
    let dir = TempDir::new().unwrap();
    let cookie = {
        let service = service(&dir);
        service.register("alice", "secret1").await.unwrap();
        let mut session = RequestSession::anonymous();
        let LoginOutcome::LoggedIn { set_cookie, .. } =
            service.binder().login(&mut session, "alice", "secret1").await.unwrap()
        else {
            panic!("expected alice to log in");
        };
        cookie_header(&set_cookie)
    };

    let restarted = service(&dir);
    let session = restarted.binder().restore(Some(&cookie)).await.unwrap();
    assert_eq!(session.user().map(|u| u.username.as_str()), Some("alice"));
}

#[tokio::test]
async fn test_tampered_cookie_is_anonymous() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir);
    service.register("alice", "secret1").await.unwrap();

    let mut session = RequestSession::anonymous();
    let LoginOutcome::LoggedIn { set_cookie, .. } =
        service.binder().login(&mut session, "alice", "secret1").await.unwrap()
    else {
        panic!("expected alice to log in");
    };

    let cookie = cookie_header(&set_cookie);
    let tampered = format!("{}00", cookie);
    let restored = service.binder().restore(Some(&tampered)).await.unwrap();
    assert!(!restored.is_authenticated());
}

#[tokio::test]
async fn test_duplicate_registration() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir);

    service.register("alice", "secret1").await.unwrap();
    let err = service.register("alice", "secret2").await.unwrap_err();
    assert!(matches!(err, AuthError::DuplicateUsername { .. }));
    assert!(err.is_user_facing());

    let users = service.users().list_users().await.unwrap();
    assert_eq!(users.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registrations_get_unique_ids() {
    let dir = TempDir::new().unwrap();
    let hasher: Arc<dyn PasswordHasher> = Arc::new(Argon2Hasher::development());
    let store = Arc::new(FileUserStore::new(dir.path().join(".users"), hasher));

    let handles: Vec<_> = (0..12)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.add_user(&format!("user{}", i), "secret1").await })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        let user = handle.await.unwrap().unwrap();
        assert!(ids.insert(user.id), "duplicate id {}", user.id);
    }

    let users = store.list_users().await.unwrap();
    assert_eq!(users.len(), 12);
    assert_eq!(ids, (1..=12).collect::<HashSet<u64>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_username_only_one_wins() {
    let dir = TempDir::new().unwrap();
    let hasher: Arc<dyn PasswordHasher> = Arc::new(Argon2Hasher::development());
    let store = Arc::new(FileUserStore::new(dir.path().join(".users"), hasher));

    let (first, second) = tokio::join!(
        {
            let store = store.clone();
            tokio::spawn(async move { store.add_user("alice", "secret1").await })
        },
        {
            let store = store.clone();
            tokio::spawn(async move { store.add_user("alice", "secret2").await })
        }
    );

    let results = [first.unwrap(), second.unwrap()];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(store.list_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_memory_sessions_with_shared_store() {
    let dir = TempDir::new().unwrap();
    let config = AuthConfig::testing();
    let hasher: Arc<dyn PasswordHasher> = Arc::new(Argon2Hasher::development());
    let users: Arc<dyn UserRepository> =
        Arc::new(FileUserStore::new(dir.path().join(".users"), hasher.clone()));
    let sessions = Arc::new(MemorySessionStore::new());

    let service =
        AuthService::with_components(config, hasher, users, sessions.clone()).unwrap();
    service.register("alice", "secret1").await.unwrap();

    let mut session = RequestSession::anonymous();
    service.binder().login(&mut session, "alice", "secret1").await.unwrap();
    assert_eq!(sessions.len().await, 1);

    service.binder().logout(&mut session).await.unwrap();
    assert!(sessions.is_empty().await);
}
