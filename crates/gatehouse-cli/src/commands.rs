use std::io::{self, BufRead};

use anyhow::Context;
use gatehouse_auth::utils::CryptoUtils;
use gatehouse_auth::{AuthOutcome, AuthService, CredentialStrategy, UserProfile, UserRepository};

/// Use the flag value, or read one line from stdin
pub fn password_or_stdin(password: Option<String>) -> anyhow::Result<String> {
    match password {
        Some(password) => Ok(password),
        None => read_password(io::stdin().lock()),
    }
}

fn read_password<R: BufRead>(mut reader: R) -> anyhow::Result<String> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("No password given; pass --password or pipe it on stdin");
    }
    Ok(password)
}

pub async fn register(
    service: &AuthService,
    username: &str,
    password: &str,
    role: Option<String>,
) -> anyhow::Result<String> {
    let user = service
        .users()
        .add_user_with_role(username, password, role)
        .await
        .with_context(|| format!("Failed to register '{}'", username))?;

    tracing::info!(user_id = user.id, "Registered user");
    Ok(format!("✅ Registered '{}' with id {}", user.username, user.id))
}

pub async fn list_users(service: &AuthService, json: bool) -> anyhow::Result<String> {
    let profiles: Vec<UserProfile> = service
        .users()
        .list_users()
        .await?
        .iter()
        .map(|user| user.profile())
        .collect();

    if json {
        return Ok(serde_json::to_string_pretty(&profiles)?);
    }

    if profiles.is_empty() {
        return Ok("No users registered".to_string());
    }

    let lines: Vec<String> = profiles
        .iter()
        .map(|profile| match &profile.role {
            Some(role) => format!("{:>6}  {} ({})", profile.id, profile.username, role),
            None => format!("{:>6}  {}", profile.id, profile.username),
        })
        .collect();
    Ok(lines.join("\n"))
}

/// Returns the message to print and whether the credentials were accepted
pub async fn check(
    service: &AuthService,
    username: &str,
    password: &str,
) -> anyhow::Result<(String, bool)> {
    match service.strategy().authenticate(username, password).await? {
        AuthOutcome::Authenticated(user) => {
            Ok((format!("✅ Credentials valid for '{}' (id {})", user.username, user.id), true))
        }
        AuthOutcome::Rejected(rejection) => Ok((format!("❌ {}", rejection), false)),
    }
}

pub fn generate_secret() -> String {
    CryptoUtils::generate_session_secret()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_auth::AuthConfig;
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> AuthService {
        let mut config = AuthConfig::testing();
        config.store.path = dir.path().join(".users");
        AuthService::from_config(config).unwrap()
    }

    #[test]
    fn test_read_password_trims_newline() {
        assert_eq!(read_password("secret1\n".as_bytes()).unwrap(), "secret1");
        assert_eq!(read_password("secret1\r\n".as_bytes()).unwrap(), "secret1");
        assert_eq!(read_password(" spaced \n".as_bytes()).unwrap(), " spaced ");
        assert!(read_password("".as_bytes()).is_err());
        assert_eq!(password_or_stdin(Some("flag".to_string())).unwrap(), "flag");
    }

    #[tokio::test]
    async fn test_register_list_check() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        assert_eq!(list_users(&service, false).await.unwrap(), "No users registered");

        let message = register(&service, "alice", "secret1", Some("admin".to_string()))
            .await
            .unwrap();
        assert!(message.contains("alice"));
        assert!(register(&service, "alice", "secret1", None).await.is_err());

        let listing = list_users(&service, false).await.unwrap();
        assert!(listing.contains("alice (admin)"));

        let json = list_users(&service, true).await.unwrap();
        assert!(json.contains("\"username\": \"alice\""));
        assert!(!json.contains("argon2"));

        let (_, accepted) = check(&service, "alice", "secret1").await.unwrap();
        assert!(accepted);
        let (wrong, accepted) = check(&service, "alice", "nope").await.unwrap();
        assert!(!accepted);
        let (unknown, _) = check(&service, "bob", "secret1").await.unwrap();
        assert_eq!(wrong, unknown);
    }

    #[test]
    fn test_generate_secret() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 64);
        assert_ne!(secret, generate_secret());
    }
}
