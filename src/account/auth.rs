use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::backend::AccountBackend;
use crate::models::{LoginRequest, RegisterRequest, User};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

const MIN_NAME_CHARS: usize = 2;
const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid form: {0}")]
    Validation(FieldErrors),
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// Per-field messages for the login and registration forms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password.is_none()
    }

    fn into_result(self) -> Result<(), AuthError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AuthError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = [&self.name, &self.email, &self.password]
            .into_iter()
            .filter_map(|m| m.as_deref())
            .collect();
        f.write_str(&messages.join("; "))
    }
}

fn check_email(email: &str) -> Option<String> {
    if email.is_empty() {
        Some("Email is required".to_string())
    } else if !EMAIL_RE.is_match(email) {
        Some("Please enter a valid email address".to_string())
    } else {
        None
    }
}

fn check_password(password: &str) -> Option<String> {
    if password.is_empty() {
        Some("Password is required".to_string())
    } else if password.chars().count() < MIN_PASSWORD_CHARS {
        Some(format!(
            "Password must be at least {MIN_PASSWORD_CHARS} characters"
        ))
    } else {
        None
    }
}

fn check_name(name: &str) -> Option<String> {
    if name.is_empty() {
        Some("Name is required".to_string())
    } else if name.chars().count() < MIN_NAME_CHARS {
        Some(format!("Name must be at least {MIN_NAME_CHARS} characters"))
    } else {
        None
    }
}

pub fn validate_login(email: &str, password: &str) -> FieldErrors {
    FieldErrors {
        name: None,
        email: check_email(email),
        password: check_password(password),
    }
}

pub fn validate_registration(name: &str, email: &str, password: &str) -> FieldErrors {
    FieldErrors {
        name: check_name(name),
        email: check_email(email),
        password: check_password(password),
    }
}

/// Token plus profile, as persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

/// Process-wide auth state, injected into whatever needs the bearer token.
pub struct AuthContext {
    backend: Arc<dyn AccountBackend>,
    path: PathBuf,
    current: RwLock<Option<AuthSession>>,
}

impl AuthContext {
    pub fn new(backend: Arc<dyn AccountBackend>, path: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            path: path.into(),
            current: RwLock::new(None),
        }
    }

    /// Load a previously persisted session. A missing or unreadable file
    /// simply means nobody is logged in.
    pub fn init(&self) -> Option<User> {
        let loaded = std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|data| serde_json::from_str::<AuthSession>(&data).ok());

        if let Some(ref session) = loaded {
            tracing::info!("Restored session for {}", session.user.email);
        }
        let user = loaded.as_ref().map(|s| s.user.clone());
        *self.current.write() = loaded;
        user
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        validate_login(email, password).into_result()?;

        let auth = self
            .backend
            .login(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .await?;

        tracing::info!("Logged in as {}", auth.user.email);
        Ok(self.establish(AuthSession {
            token: auth.token,
            user: auth.user,
        }))
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User, AuthError> {
        validate_registration(name, email, password).into_result()?;

        let auth = self
            .backend
            .register(&RegisterRequest {
                name: name.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            })
            .await?;

        tracing::info!("Registered {}", auth.user.email);
        Ok(self.establish(AuthSession {
            token: auth.token,
            user: auth.user,
        }))
    }

    /// Forget the session in memory and on disk.
    pub fn logout(&self) {
        *self.current.write() = None;
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove {}: {e}", self.path.display());
            }
        }
    }

    pub fn token(&self) -> Option<String> {
        self.current.read().as_ref().map(|s| s.token.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.current.read().as_ref().map(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.read().is_some()
    }

    fn establish(&self, session: AuthSession) -> User {
        self.persist(&session);
        let user = session.user.clone();
        *self.current.write() = Some(session);
        user
    }

    /// Atomic write via temp file + rename.
    fn persist(&self, session: &AuthSession) {
        let Ok(data) = serde_json::to_string_pretty(session) else {
            return;
        };
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("Failed to create {}: {e}", parent.display());
                return;
            }
        }
        let tmp_path = self.path.with_extension("json.tmp");
        if std::fs::write(&tmp_path, &data).is_ok() {
            let _ = std::fs::rename(&tmp_path, &self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_requires_both_fields() {
        let errors = validate_login("", "");
        assert_eq!(errors.email.as_deref(), Some("Email is required"));
        assert_eq!(errors.password.as_deref(), Some("Password is required"));
        assert!(errors.name.is_none());
    }

    #[test]
    fn test_login_rejects_malformed_email() {
        let errors = validate_login("not-an-email", "secret1");
        assert_eq!(
            errors.email.as_deref(),
            Some("Please enter a valid email address")
        );
        assert!(errors.password.is_none());
    }

    #[test]
    fn test_email_with_whitespace_is_invalid() {
        assert!(validate_login("a b@c.io", "secret1").email.is_some());
    }

    #[test]
    fn test_short_password() {
        let errors = validate_login("a@b.io", "12345");
        assert_eq!(
            errors.password.as_deref(),
            Some("Password must be at least 6 characters")
        );
    }

    #[test]
    fn test_registration_name_rules() {
        assert_eq!(
            validate_registration("", "a@b.io", "secret1").name.as_deref(),
            Some("Name is required")
        );
        assert_eq!(
            validate_registration("A", "a@b.io", "secret1").name.as_deref(),
            Some("Name must be at least 2 characters")
        );
        assert!(validate_registration("Al", "a@b.io", "secret1").is_empty());
    }

    #[test]
    fn test_field_errors_display_joins_messages() {
        let errors = validate_login("", "1");
        assert_eq!(
            errors.to_string(),
            "Email is required; Password must be at least 6 characters"
        );
    }
}
