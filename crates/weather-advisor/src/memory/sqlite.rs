use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::MemoryStore;
use crate::error::{AdvisorError, Result};
use crate::model::{MemoryContext, MemoryEntry, User};

/// SQLite-backed users and memories
#[derive(Debug)]
pub struct SqliteMemoryStore {
    connection: Mutex<Connection>,
}

impl SqliteMemoryStore {
    /// Open (or create) the database file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|error| {
                AdvisorError::Storage(format!("failed to create database directory: {error}"))
            })?;
        }

        Self::initialize(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(connection: Connection) -> Result<Self> {
        connection.busy_timeout(Duration::from_secs(5))?;
        connection.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS memories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                context TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (user_id, key)
            );

            CREATE INDEX IF NOT EXISTS idx_memories_user_key
            ON memories(user_id, key);
            ",
        )?;

        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| AdvisorError::Storage("sqlite store lock poisoned".into()))
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|error| AdvisorError::Storage(format!("bad timestamp {raw:?}: {error}")))
}

/// Row as stored, before timestamps and context are decoded
struct RawMemory {
    key: String,
    value: String,
    context: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawMemory {
    const COLUMNS: &'static str = "key, value, context, created_at, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            value: row.get(1)?,
            context: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    fn decode(self) -> Result<MemoryEntry> {
        let context = match self.context {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };
        Ok(MemoryEntry {
            key: self.key,
            value: self.value,
            context,
            recorded_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn select_user(conn: &Connection, name: &str) -> Result<Option<User>> {
    let raw = conn
        .query_row(
            "SELECT id, name, created_at, updated_at FROM users WHERE name = ?1",
            params![name],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    raw.map(|(id, name, created_at, updated_at)| {
        Ok(User {
            id,
            name,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    })
    .transpose()
}

impl MemoryStore for SqliteMemoryStore {
    fn find_user(&self, name: &str) -> Result<Option<User>> {
        let conn = self.connection()?;
        select_user(&conn, name)
    }

    fn find_or_create_user(&self, name: &str) -> Result<(User, bool)> {
        let conn = self.connection()?;
        let now = timestamp(Utc::now());
        let inserted = conn.execute(
            "
            INSERT INTO users (name, created_at, updated_at)
            VALUES (?1, ?2, ?2)
            ON CONFLICT(name) DO NOTHING
            ",
            params![name, now],
        )?;

        let user = select_user(&conn, name)?
            .ok_or_else(|| AdvisorError::Storage(format!("user {name} vanished after insert")))?;
        Ok((user, inserted > 0))
    }

    fn list(&self, user: &User) -> Result<Vec<MemoryEntry>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM memories WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
            RawMemory::COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![user.id], RawMemory::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RawMemory::decode).collect()
    }

    fn upsert(
        &self,
        user: &User,
        key: &str,
        value: &str,
        context: &MemoryContext,
    ) -> Result<MemoryEntry> {
        let conn = self.connection()?;
        let now = timestamp(Utc::now());
        let context = serde_json::to_string(context)?;

        conn.execute(
            "
            INSERT INTO memories (user_id, key, value, context, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT(user_id, key) DO UPDATE SET
                value = excluded.value,
                context = excluded.context,
                updated_at = excluded.updated_at
            ",
            params![user.id, key, value, context, now],
        )?;

        let raw = conn.query_row(
            &format!(
                "SELECT {} FROM memories WHERE user_id = ?1 AND key = ?2",
                RawMemory::COLUMNS
            ),
            params![user.id, key],
            RawMemory::from_row,
        )?;
        raw.decode()
    }

    fn count(&self, user: &User) -> Result<usize> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM memories WHERE user_id = ?1",
            params![user.id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
