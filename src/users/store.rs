//! SQLite-backed user and session storage.
//!
//! # Schema
//! ```sql
//! CREATE TABLE users (
//!     id INTEGER PRIMARY KEY,
//!     username TEXT NOT NULL UNIQUE,
//!     name TEXT NOT NULL,
//!     password_hash TEXT NOT NULL,     -- Iterated SHA-256, hex
//!     salt TEXT NOT NULL,              -- Per-user random salt, hex
//!     created_at TEXT NOT NULL         -- ISO 8601 timestamp
//! );
//! CREATE TABLE sessions (
//!     id INTEGER PRIMARY KEY,
//!     username TEXT NOT NULL,
//!     access_token TEXT NOT NULL,
//!     created_at TEXT NOT NULL         -- ISO 8601 timestamp
//! );
//! ```
//!
//! Sessions are an append-only audit of issued tokens. Tokens carry
//! their own signed expiry, so session rows are never consulted during
//! request authentication and never deleted.

use anyhow::{Context, Result};
use chrono::Utc;
use rand::RngCore;
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;

/// Salt byte length for password hashing.
const SALT_BYTES: usize = 16;

/// Number of SHA-256 iterations for password stretching.
const HASH_ITERATIONS: u32 = 100_000;

/// A registered application user.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub username: String,
    pub name: String,
    pub created_at: String,
}

/// User store errors
#[derive(Debug)]
pub enum UserStoreError {
    /// Username already registered
    UsernameTaken,
    /// Unknown user or wrong password (deliberately indistinguishable)
    InvalidCredentials,
    /// Underlying database failure
    Storage(anyhow::Error),
}

impl std::fmt::Display for UserStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserStoreError::UsernameTaken => write!(f, "Username is already taken"),
            UserStoreError::InvalidCredentials => write!(f, "Invalid username or password"),
            UserStoreError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for UserStoreError {}

impl From<rusqlite::Error> for UserStoreError {
    fn from(e: rusqlite::Error) -> Self {
        UserStoreError::Storage(e.into())
    }
}

/// SQLite-backed user and session store.
///
/// # Thread Safety
/// - Connection is wrapped in Mutex for safe concurrent access
/// - SQLite itself is thread-safe with serialized mode
pub struct UserStore {
    conn: Mutex<Connection>,
}

impl UserStore {
    /// Creates or opens a user store at the given path.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open user database")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                salt TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL,
                access_token TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_username ON sessions(username);
            "#,
        )
        .context("Failed to create user schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Registers a new user.
    ///
    /// The display name defaults to the username until a profile
    /// update changes it.
    ///
    /// # Errors
    /// * `UsernameTaken` - A user with this username already exists
    pub fn register(&self, username: &str, password: &str) -> Result<User, UserStoreError> {
        let salt = generate_salt();
        let password_hash = hash_password(password, &salt);
        let now = Utc::now().to_rfc3339();

        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO users (username, name, password_hash, salt, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![username, username, password_hash, salt, now],
        );

        match result {
            Ok(_) => Ok(User {
                username: username.to_string(),
                name: username.to_string(),
                created_at: now,
            }),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(UserStoreError::UsernameTaken)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Verifies a username/password pair, returning the user on success.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown user or wrong password
    pub fn verify_login(&self, username: &str, password: &str) -> Result<User, UserStoreError> {
        let conn = self.conn.lock().unwrap();
        let row: Result<(String, String, String, String), _> = conn.query_row(
            "SELECT name, password_hash, salt, created_at FROM users WHERE username = ?1",
            params![username],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        );

        match row {
            Ok((name, stored_hash, salt, created_at)) => {
                let attempt_hash = hash_password(password, &salt);
                if !constant_time_eq(stored_hash.as_bytes(), attempt_hash.as_bytes()) {
                    return Err(UserStoreError::InvalidCredentials);
                }
                Ok(User {
                    username: username.to_string(),
                    name,
                    created_at,
                })
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                // Dummy hash to level timing between the two failure paths
                let _ = hash_password(password, "0000000000000000");
                Err(UserStoreError::InvalidCredentials)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Looks up a user by username.
    pub fn find(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        let row = conn.query_row(
            "SELECT username, name, created_at FROM users WHERE username = ?1",
            params![username],
            |row| {
                Ok(User {
                    username: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            },
        );

        match row {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Appends a session audit record for an issued token.
    pub fn record_session(&self, username: &str, access_token: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO sessions (username, access_token, created_at) VALUES (?1, ?2, ?3)",
                params![username, access_token, now],
            )
            .context("Failed to record session")?;
        Ok(())
    }

    /// Counts sessions recorded for a user.
    pub fn session_count(&self, username: &str) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sessions WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .context("Failed to count sessions")?;
        Ok(count as u64)
    }
}

/// Generate a random salt (hex-encoded).
fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash a password with salt using iterated SHA-256.
fn hash_password(password: &str, salt: &str) -> String {
    let mut hash = Sha256::new();
    hash.update(salt.as_bytes());
    hash.update(password.as_bytes());
    let mut result = hash.finalize();

    // Iterated hashing for key stretching
    for _ in 1..HASH_ITERATIONS {
        let mut h = Sha256::new();
        h.update(result);
        h.update(salt.as_bytes());
        result = h.finalize();
    }

    hex::encode(result)
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
