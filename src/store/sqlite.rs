use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, params};

use crate::domain::chat::{ChatId, Profile};
use crate::error::StoreError;
use crate::store::repo::{UserDirectory, UserRecord};

pub struct SqliteUserStore {
    conn: Mutex<Connection>,
    password: String,
}

fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl SqliteUserStore {
    pub fn open(path: &std::path::Path, password: impl Into<String>) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?, password)
    }

    pub fn open_in_memory(password: impl Into<String>) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, password)
    }

    fn with_connection(conn: Connection, password: impl Into<String>) -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(conn),
            password: password.into(),
        };
        store.migrate()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn().execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS users (
                user_id        TEXT PRIMARY KEY,
                name           TEXT NOT NULL,
                firstname      TEXT,
                username       TEXT,
                is_registered  INTEGER NOT NULL DEFAULT 0,
                created_at     INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS users_username ON users(username);
            "#,
        )?;
        Ok(())
    }
}

fn row_to_user(r: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        user_id: r.get(0)?,
        name: r.get(1)?,
        firstname: r.get(2)?,
        username: r.get(3)?,
        is_registered: r.get(4)?,
        created_at: r.get(5)?,
    })
}

fn display_name(profile: &Profile) -> &str {
    if profile.name.is_empty() {
        "User"
    } else {
        &profile.name
    }
}

impl UserDirectory for SqliteUserStore {
    fn get_user(&self, chat: &ChatId) -> Result<Option<UserRecord>, StoreError> {
        let conn = self.conn();
        let user = conn
            .query_row(
                r#"
                SELECT user_id, name, firstname, username, is_registered, created_at
                FROM users WHERE user_id=?1
                "#,
                params![chat.as_str()],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    fn register(&self, chat: &ChatId, profile: &Profile) -> Result<(), StoreError> {
        self.conn().execute(
            r#"
            INSERT INTO users (user_id, name, firstname, username, is_registered, created_at)
            VALUES (?1, ?2, ?3, ?4, 1, ?5)
            ON CONFLICT(user_id) DO UPDATE SET
              name=excluded.name,
              firstname=excluded.firstname,
              username=excluded.username,
              is_registered=1
            "#,
            params![
                chat.as_str(),
                display_name(profile),
                profile.firstname,
                profile.username,
                now_epoch()
            ],
        )?;
        Ok(())
    }

    fn create_unregistered(&self, chat: &ChatId, profile: &Profile) -> Result<(), StoreError> {
        self.conn().execute(
            r#"
            INSERT INTO users (user_id, name, firstname, username, is_registered, created_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5)
            ON CONFLICT(user_id) DO NOTHING
            "#,
            params![
                chat.as_str(),
                display_name(profile),
                profile.firstname,
                profile.username,
                now_epoch()
            ],
        )?;
        Ok(())
    }

    fn check_password(&self, candidate: &str) -> bool {
        candidate.trim() == self.password
    }

    fn registered_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT user_id, name, firstname, username, is_registered, created_at
            FROM users WHERE is_registered=1
            ORDER BY created_at, user_id
            "#,
        )?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }
}
