// Authentication Gate
//
// Password storage is "salt$hexdigest" where digest = SHA-256(salt || password).
// Sessions are server-side only: an opaque UUID token handed to the browser,
// mapped to a user id in an in-process store.

use crate::error::{AppError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Salted hash, never the plaintext.
    pub password: String,
}

// ============================================================================
// Password hashing
// ============================================================================

fn salted_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    let digest = salted_digest(&salt, password);
    format!("{salt}${digest}")
}

/// Verify a candidate password against a stored "salt$hexdigest" value.
pub fn verify_password(stored: &str, candidate: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, digest)) => salted_digest(salt, candidate) == digest,
        None => false,
    }
}

// ============================================================================
// User accounts
// ============================================================================

/// Provision an account. There is no default seeded password: credentials
/// always come from the operator.
pub fn create_user(conn: &Connection, username: &str, password: &str) -> Result<User> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "username and password must not be empty".to_string(),
        ));
    }

    let hashed = hash_password(password);
    let result = conn.execute(
        "INSERT INTO users (username, password) VALUES (?1, ?2)",
        params![username, hashed],
    );

    match result {
        Ok(_) => Ok(User {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            password: hashed,
        }),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(AppError::Validation(format!(
                "username '{username}' is already taken"
            )))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn find_user(conn: &Connection, username: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, username, password FROM users WHERE username = ?1",
            params![username],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password: row.get(2)?,
                })
            },
        )
        .optional()?;

    Ok(user)
}

/// Resolve a session's stored id back into a User for per-request identity.
pub fn load_user(conn: &Connection, id: i64) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, username, password FROM users WHERE id = ?1",
            params![id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password: row.get(2)?,
                })
            },
        )
        .optional()?;

    Ok(user)
}

// ============================================================================
// Sessions
// ============================================================================

/// In-process session registry: opaque token -> user id.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, i64>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a session bound to a user id and return the token.
    pub fn create(&self, user_id: i64) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        self.inner.write().unwrap().insert(token.clone(), user_id);
        token
    }

    pub fn resolve(&self, token: &str) -> Option<i64> {
        self.inner.read().unwrap().get(token).copied()
    }

    /// Invalidate a session. Unknown tokens are a no-op.
    pub fn remove(&self, token: &str) {
        self.inner.write().unwrap().remove(token);
    }
}

/// Check credentials and establish a session on success.
///
/// The error is the same whether the username or the password was wrong.
pub fn login(
    conn: &Connection,
    sessions: &SessionStore,
    username: &str,
    password: &str,
) -> Result<String> {
    match find_user(conn, username)? {
        Some(user) if verify_password(&user.password, password) => Ok(sessions.create(user.id)),
        _ => Err(AppError::Auth),
    }
}

pub fn logout(sessions: &SessionStore, token: &str) {
    sessions.remove(token);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_hash_and_verify_password() {
        let stored = hash_password("admin123");

        assert!(stored.contains('$'), "Stored form should be salt$digest");
        assert!(verify_password(&stored, "admin123"));
        assert!(!verify_password(&stored, "admin124"));
        assert!(!verify_password(&stored, ""));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("admin123");
        let b = hash_password("admin123");

        assert_ne!(a, b, "Same password should hash differently per salt");
        assert!(verify_password(&a, "admin123"));
        assert!(verify_password(&b, "admin123"));
    }

    #[test]
    fn test_create_user_rejects_duplicate_username() {
        let conn = test_conn();
        create_user(&conn, "admin", "admin123").unwrap();

        let err = create_user(&conn, "admin", "other").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_create_user_rejects_empty_fields() {
        let conn = test_conn();

        assert!(matches!(
            create_user(&conn, "", "secret").unwrap_err(),
            AppError::Validation(_)
        ));
        assert!(matches!(
            create_user(&conn, "admin", "").unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[test]
    fn test_login_establishes_session() {
        let conn = test_conn();
        let sessions = SessionStore::new();
        let user = create_user(&conn, "admin", "admin123").unwrap();

        let token = login(&conn, &sessions, "admin", "admin123").unwrap();

        assert_eq!(sessions.resolve(&token), Some(user.id));
        let loaded = load_user(&conn, user.id).unwrap().unwrap();
        assert_eq!(loaded.username, "admin");
    }

    #[test]
    fn test_login_rejects_bad_credentials() {
        let conn = test_conn();
        let sessions = SessionStore::new();
        create_user(&conn, "admin", "admin123").unwrap();

        let wrong_password = login(&conn, &sessions, "admin", "nope").unwrap_err();
        let wrong_username = login(&conn, &sessions, "nobody", "admin123").unwrap_err();

        // Same error either way - the caller cannot tell which field was wrong
        assert_eq!(wrong_password.to_string(), wrong_username.to_string());
        assert!(matches!(wrong_password, AppError::Auth));
    }

    #[test]
    fn test_logout_invalidates_session() {
        let conn = test_conn();
        let sessions = SessionStore::new();
        create_user(&conn, "admin", "admin123").unwrap();

        let token = login(&conn, &sessions, "admin", "admin123").unwrap();
        logout(&sessions, &token);

        assert_eq!(sessions.resolve(&token), None);

        // Logging out twice is fine
        logout(&sessions, &token);
    }
}
