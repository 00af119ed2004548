use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

use crate::error::PersistenceError;
use crate::local_store::KeyValueStore;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub gemini_api_key: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// SQLite-backed device storage: a namespaced key-value table plus settings
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            -- Browser-style local storage
            CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Single-row user settings
            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY,
                gemini_api_key TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "
        )?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0))?;

        if count == 0 {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO settings (id, gemini_api_key, created_at, updated_at) VALUES (1, NULL, ?1, ?2)",
                params![now, now]
            )?;
        }

        Ok(Self { conn: Mutex::new(conn) })
    }

    fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&conn)
    }

    // ============ Local Storage ============

    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                params![key],
                |row| row.get(0)
            ).optional()
        })
    }

    pub fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.with_connection(|conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO local_storage (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now]
            )?;
            Ok(())
        })
    }

    pub fn remove_value(&self, key: &str) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute("DELETE FROM local_storage WHERE key = ?1", params![key])?;
            Ok(())
        })
    }

    // ============ Settings ============

    pub fn get_settings(&self) -> Result<Settings> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT gemini_api_key, created_at, updated_at FROM settings WHERE id = 1",
                [],
                |row| Ok(Settings {
                    gemini_api_key: row.get(0)?,
                    created_at: row.get(1)?,
                    updated_at: row.get(2)?,
                })
            )
        })
    }

    pub fn update_api_key(&self, api_key: &str) -> Result<()> {
        self.with_connection(|conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "UPDATE settings SET gemini_api_key = ?1, updated_at = ?2 WHERE id = 1",
                params![api_key, now]
            )?;
            Ok(())
        })
    }

    pub fn clear_api_key(&self) -> Result<()> {
        self.with_connection(|conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "UPDATE settings SET gemini_api_key = NULL, updated_at = ?1 WHERE id = 1",
                params![now]
            )?;
            Ok(())
        })
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.get_value(key)?)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        Ok(self.set_value(key, value)?)
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        Ok(self.remove_value(key)?)
    }
}
