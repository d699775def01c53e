//! Encrypted linked-account storage using SQLite.
//!
//! # Schema
//! ```sql
//! CREATE TABLE linked_accounts (
//!     id INTEGER PRIMARY KEY,
//!     owner TEXT NOT NULL,              -- Application username
//!     external_username TEXT NOT NULL,  -- Platform username
//!     userid INTEGER NOT NULL UNIQUE,   -- Platform user id
//!     avatar TEXT NOT NULL,
//!     cookies TEXT NOT NULL,            -- Encrypted JSON cookie bag
//!     cookies_nonce TEXT NOT NULL,      -- Nonce for cookies
//!     first_link INTEGER NOT NULL,
//!     login_time INTEGER NOT NULL,      -- Unix seconds
//!     status_today INTEGER NOT NULL,
//!     status_nexday INTEGER NOT NULL,
//!     coin_today INTEGER NOT NULL,
//!     ip TEXT NOT NULL,
//!     created_at TEXT NOT NULL,         -- ISO 8601 timestamp
//!     updated_at TEXT NOT NULL          -- ISO 8601 timestamp
//! );
//! ```
//!
//! The UNIQUE constraint on `userid` plus `INSERT .. ON CONFLICT`
//! makes link completion atomic: concurrent completions for the same
//! external account cannot produce duplicate rows.

use super::encryption;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

/// Outcome of a link completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinkOutcome {
    /// First link of this external account
    Linked,
    /// Account already existed; cookies/avatar/ip/login time refreshed
    Refreshed,
}

/// Full linked-account record, cookies decrypted.
///
/// Internal representation only — never serialized into API responses.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedAccount {
    pub owner: String,
    pub external_username: String,
    pub userid: i64,
    pub avatar: String,
    pub cookies: BTreeMap<String, String>,
    pub first_link: bool,
    pub login_time: i64,
    pub status_today: bool,
    pub status_nexday: bool,
    pub coin_today: i64,
    pub ip: String,
}

/// Public view of a linked account.
///
/// Deliberately has no cookie, ip, or owner fields, so those values
/// cannot leak through serialization.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LinkedAccountSummary {
    pub external_username: String,
    pub userid: i64,
    pub avatar: String,
    pub first_link: bool,
    pub login_time: i64,
    pub status_today: bool,
    pub status_nexday: bool,
    pub coin_today: i64,
}

/// Encrypted linked-account storage backed by SQLite.
///
/// # Thread Safety
/// - Connection is wrapped in Mutex for safe concurrent access
/// - SQLite itself is thread-safe with serialized mode
pub struct LinkedAccountStore {
    conn: Mutex<Connection>,
    encryption_key: Vec<u8>,
}

impl LinkedAccountStore {
    /// Creates or opens a linked-account store.
    ///
    /// # Arguments
    /// * `db_path` - Path to SQLite database file
    /// * `encryption_key` - Base64-encoded 32-byte master key
    pub fn new<P: AsRef<Path>>(db_path: P, encryption_key: &str) -> Result<Self> {
        let key_bytes =
            encryption::validate_key(encryption_key).context("Invalid encryption key")?;

        let conn = Connection::open(db_path).context("Failed to open linked-account database")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS linked_accounts (
                id INTEGER PRIMARY KEY,
                owner TEXT NOT NULL,
                external_username TEXT NOT NULL,
                userid INTEGER NOT NULL UNIQUE,
                avatar TEXT NOT NULL,
                cookies TEXT NOT NULL,
                cookies_nonce TEXT NOT NULL,
                first_link INTEGER NOT NULL,
                login_time INTEGER NOT NULL,
                status_today INTEGER NOT NULL,
                status_nexday INTEGER NOT NULL,
                coin_today INTEGER NOT NULL,
                ip TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_linked_owner ON linked_accounts(owner);
            "#,
        )
        .context("Failed to create linked_accounts schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
            encryption_key: key_bytes,
        })
    }

    /// Records a completed QR login.
    ///
    /// First completion inserts a new record owned by `owner` with
    /// default status fields. A later completion for the same external
    /// userid — by any owner — refreshes avatar, cookies, login time,
    /// and source ip, but never reassigns ownership or resets the
    /// daily status fields.
    pub fn upsert_login(
        &self,
        owner: &str,
        userid: i64,
        external_username: &str,
        avatar: &str,
        cookies: &BTreeMap<String, String>,
        ip: &str,
    ) -> Result<LinkOutcome> {
        let (cookies_encrypted, cookies_nonce) =
            encryption::encrypt_cookies(cookies, &self.encryption_key)
                .context("Failed to encrypt cookies")?;

        let now = Utc::now();
        let now_iso = now.to_rfc3339();
        let login_time = now.timestamp();

        let conn = self.conn.lock().unwrap();

        // Existence check and upsert run under the same lock; the
        // UNIQUE constraint guards against duplicates regardless.
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM linked_accounts WHERE userid = ?1)",
                params![userid],
                |row| row.get(0),
            )
            .context("Failed to check for existing account")?;

        conn.execute(
            r#"
            INSERT INTO linked_accounts (
                owner, external_username, userid, avatar,
                cookies, cookies_nonce,
                first_link, login_time,
                status_today, status_nexday, coin_today,
                ip, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, 0, 0, 0, ?8, ?9, ?9)
            ON CONFLICT(userid) DO UPDATE SET
                avatar = excluded.avatar,
                cookies = excluded.cookies,
                cookies_nonce = excluded.cookies_nonce,
                login_time = excluded.login_time,
                ip = excluded.ip,
                updated_at = excluded.updated_at
            "#,
            params![
                owner,
                external_username,
                userid,
                avatar,
                cookies_encrypted,
                cookies_nonce,
                login_time,
                ip,
                now_iso,
            ],
        )
        .context("Failed to upsert linked account")?;

        Ok(if exists {
            LinkOutcome::Refreshed
        } else {
            LinkOutcome::Linked
        })
    }

    /// Lists linked-account summaries for an owner.
    ///
    /// Cookies, ip, and owner never appear in the returned type.
    pub fn list_for_owner(&self, owner: &str) -> Result<Vec<LinkedAccountSummary>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT external_username, userid, avatar,
                       first_link, login_time,
                       status_today, status_nexday, coin_today
                FROM linked_accounts
                WHERE owner = ?1
                ORDER BY login_time DESC
                "#,
            )
            .context("Failed to prepare query")?;

        let accounts = stmt
            .query_map(params![owner], |row| {
                Ok(LinkedAccountSummary {
                    external_username: row.get(0)?,
                    userid: row.get(1)?,
                    avatar: row.get(2)?,
                    first_link: row.get(3)?,
                    login_time: row.get(4)?,
                    status_today: row.get(5)?,
                    status_nexday: row.get(6)?,
                    coin_today: row.get(7)?,
                })
            })
            .context("Failed to execute query")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read results")?;

        Ok(accounts)
    }

    /// Sets the next-day status flag on one of the owner's accounts.
    ///
    /// Scoped to `(owner, userid)`, so a caller cannot flip flags on
    /// accounts linked by someone else. Returns the number of rows
    /// changed; 0 means no matching record (treated as success by the
    /// API layer).
    pub fn set_next_day_status(&self, owner: &str, userid: i64, flag: bool) -> Result<u64> {
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE linked_accounts
                 SET status_nexday = ?1, updated_at = ?2
                 WHERE owner = ?3 AND userid = ?4",
                params![flag, now, owner, userid],
            )
            .context("Failed to update next-day status")?;
        Ok(changed as u64)
    }

    /// Retrieves the full record for an external userid, cookies
    /// decrypted. Internal use and tests only.
    pub fn get(&self, userid: i64) -> Result<Option<LinkedAccount>> {
        let conn = self.conn.lock().unwrap();
        let row = conn.query_row(
            r#"
            SELECT owner, external_username, userid, avatar,
                   cookies, cookies_nonce,
                   first_link, login_time,
                   status_today, status_nexday, coin_today, ip
            FROM linked_accounts
            WHERE userid = ?1
            "#,
            params![userid],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, bool>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, bool>(8)?,
                    row.get::<_, bool>(9)?,
                    row.get::<_, i64>(10)?,
                    row.get::<_, String>(11)?,
                ))
            },
        );

        let (
            owner,
            external_username,
            userid,
            avatar,
            cookies_encrypted,
            cookies_nonce,
            first_link,
            login_time,
            status_today,
            status_nexday,
            coin_today,
            ip,
        ) = match row {
            Ok(values) => values,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let cookies =
            encryption::decrypt_cookies(&cookies_encrypted, &cookies_nonce, &self.encryption_key)
                .context("Failed to decrypt cookies")?;

        Ok(Some(LinkedAccount {
            owner,
            external_username,
            userid,
            avatar,
            cookies,
            first_link,
            login_time,
            status_today,
            status_nexday,
            coin_today,
            ip,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    fn create_test_store() -> LinkedAccountStore {
        let key = BASE64.encode([0u8; 32]);
        LinkedAccountStore::new(":memory:", &key).expect("Failed to create test store")
    }

    fn sample_cookies() -> BTreeMap<String, String> {
        let mut cookies = BTreeMap::new();
        cookies.insert("SPC_ST".to_string(), "session-token".to_string());
        cookies
    }

    #[test]
    fn first_login_inserts_with_defaults() {
        let store = create_test_store();

        let outcome = store
            .upsert_login("alice", 9001, "shop_alice", "avatar.jpg", &sample_cookies(), "1.2.3.4")
            .unwrap();
        assert_eq!(outcome, LinkOutcome::Linked);

        let account = store.get(9001).unwrap().unwrap();
        assert_eq!(account.owner, "alice");
        assert_eq!(account.external_username, "shop_alice");
        assert!(account.first_link);
        assert!(!account.status_today);
        assert!(!account.status_nexday);
        assert_eq!(account.coin_today, 0);
        assert_eq!(account.ip, "1.2.3.4");
        assert_eq!(account.cookies, sample_cookies());
    }

    #[test]
    fn relink_refreshes_instead_of_duplicating() {
        let store = create_test_store();

        store
            .upsert_login("alice", 9001, "shop_alice", "old.jpg", &sample_cookies(), "1.2.3.4")
            .unwrap();

        let mut new_cookies = BTreeMap::new();
        new_cookies.insert("SPC_ST".to_string(), "fresh-token".to_string());

        let outcome = store
            .upsert_login("alice", 9001, "shop_alice", "new.jpg", &new_cookies, "5.6.7.8")
            .unwrap();
        assert_eq!(outcome, LinkOutcome::Refreshed);

        // Still a single record, with refreshed mutable fields
        let accounts = store.list_for_owner("alice").unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].avatar, "new.jpg");

        let account = store.get(9001).unwrap().unwrap();
        assert_eq!(account.cookies, new_cookies);
        assert_eq!(account.ip, "5.6.7.8");
    }

    #[test]
    fn relink_by_other_owner_keeps_original_owner() {
        let store = create_test_store();

        store
            .upsert_login("alice", 9001, "shop_alice", "a.jpg", &sample_cookies(), "1.2.3.4")
            .unwrap();
        let outcome = store
            .upsert_login("bob", 9001, "shop_alice", "b.jpg", &sample_cookies(), "9.9.9.9")
            .unwrap();
        assert_eq!(outcome, LinkOutcome::Refreshed);

        let account = store.get(9001).unwrap().unwrap();
        assert_eq!(account.owner, "alice");
        assert_eq!(account.avatar, "b.jpg");

        // Bob's listing stays empty — he never owned the record
        assert!(store.list_for_owner("bob").unwrap().is_empty());
    }

    #[test]
    fn list_is_scoped_to_owner() {
        let store = create_test_store();

        store
            .upsert_login("alice", 1, "shop_a", "a.jpg", &sample_cookies(), "1.1.1.1")
            .unwrap();
        store
            .upsert_login("alice", 2, "shop_b", "b.jpg", &sample_cookies(), "1.1.1.1")
            .unwrap();
        store
            .upsert_login("bob", 3, "shop_c", "c.jpg", &sample_cookies(), "2.2.2.2")
            .unwrap();

        assert_eq!(store.list_for_owner("alice").unwrap().len(), 2);
        assert_eq!(store.list_for_owner("bob").unwrap().len(), 1);
        assert!(store.list_for_owner("carol").unwrap().is_empty());
    }

    #[test]
    fn summary_serialization_strips_secrets() {
        let store = create_test_store();
        store
            .upsert_login("alice", 9001, "shop_alice", "a.jpg", &sample_cookies(), "1.2.3.4")
            .unwrap();

        let accounts = store.list_for_owner("alice").unwrap();
        let json = serde_json::to_value(&accounts).unwrap();
        let obj = json[0].as_object().unwrap();

        assert!(!obj.contains_key("cookies"));
        assert!(!obj.contains_key("ip"));
        assert!(!obj.contains_key("owner"));
        assert_eq!(obj["userid"], 9001);
    }

    #[test]
    fn set_next_day_status_scoped_to_owner() {
        let store = create_test_store();
        store
            .upsert_login("alice", 9001, "shop_alice", "a.jpg", &sample_cookies(), "1.2.3.4")
            .unwrap();

        // Owner can flip the flag
        assert_eq!(store.set_next_day_status("alice", 9001, true).unwrap(), 1);
        assert!(store.get(9001).unwrap().unwrap().status_nexday);

        // Someone else cannot
        assert_eq!(store.set_next_day_status("bob", 9001, false).unwrap(), 0);
        assert!(store.get(9001).unwrap().unwrap().status_nexday);
    }

    #[test]
    fn set_next_day_status_unknown_userid_is_noop() {
        let store = create_test_store();
        assert_eq!(store.set_next_day_status("alice", 404, true).unwrap(), 0);
    }

    #[test]
    fn get_nonexistent_returns_none() {
        let store = create_test_store();
        assert!(store.get(123).unwrap().is_none());
    }

    #[test]
    fn invalid_encryption_key_rejected() {
        assert!(LinkedAccountStore::new(":memory:", "short").is_err());
        assert!(LinkedAccountStore::new(":memory:", "not-valid-base64!@#$").is_err());
    }
}
