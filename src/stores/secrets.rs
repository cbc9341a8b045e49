use crate::errors::ToolError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS secrets (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL
);
";

/// Persists ciphertext only. Encryption happens above this layer, so a
/// copy of the database never leaks plaintext secrets.
pub struct SecretStore {
    conn: Mutex<Connection>,
}

impl SecretStore {
    pub fn open(path: &Path) -> Result<Self, ToolError> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, ToolError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn put(&self, key: &str, ciphertext: &str) -> Result<(), ToolError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO secrets (key, value, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, ciphertext, now],
        )?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, ToolError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT value FROM secrets WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(ToolError::from)
    }

    pub fn delete(&self, key: &str) -> Result<bool, ToolError> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM secrets WHERE key = ?1", params![key])?;
        Ok(changed > 0)
    }

    /// Key names only, sorted. Values never leave this store unencrypted
    /// so listing stays safe to expose.
    pub fn list(&self) -> Result<Vec<String>, ToolError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key FROM secrets ORDER BY key")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, ToolError> {
        self.conn
            .lock()
            .map_err(|_| ToolError::internal("Secret store lock poisoned"))
    }
}
