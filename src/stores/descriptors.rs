use crate::errors::ToolError;
use crate::model::{AuthSpec, ExecutorConfig, ParameterSpec, ToolDescriptor};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tools (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL UNIQUE,
  description TEXT NOT NULL,
  enabled INTEGER NOT NULL DEFAULT 1,
  config TEXT NOT NULL,
  parameters TEXT NOT NULL,
  auth TEXT NOT NULL,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tools_enabled ON tools(enabled);
";

/// Read surface consumed by the engine: descriptors are authored by an
/// external editor, the engine only looks them up. The UNIQUE name
/// constraint is what prevents two tools from reaching registration
/// under one name.
pub struct DescriptorStore {
    conn: Mutex<Connection>,
}

impl DescriptorStore {
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

    pub fn insert(&self, tool: &ToolDescriptor) -> Result<(), ToolError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tools (id, name, description, enabled, config, parameters, auth, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                tool.id,
                tool.name,
                tool.description,
                tool.enabled as i64,
                encode(&tool.config)?,
                encode(&tool.parameters)?,
                encode(&tool.auth)?,
                tool.created_at.to_rfc3339(),
                tool.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|err| match err {
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                ToolError::conflict(format!("Tool name already exists: {}", tool.name))
            }
            other => other.into(),
        })?;
        Ok(())
    }

    pub fn update(&self, tool: &ToolDescriptor) -> Result<(), ToolError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE tools SET name = ?2, description = ?3, enabled = ?4, config = ?5,
             parameters = ?6, auth = ?7, updated_at = ?8 WHERE id = ?1",
            params![
                tool.id,
                tool.name,
                tool.description,
                tool.enabled as i64,
                encode(&tool.config)?,
                encode(&tool.parameters)?,
                encode(&tool.auth)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        if changed == 0 {
            return Err(ToolError::not_found(format!("Tool not found: {}", tool.id)));
        }
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<bool, ToolError> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM tools WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    pub fn get(&self, id: &str) -> Result<Option<ToolDescriptor>, ToolError> {
        let conn = self.lock()?;
        conn.query_row("SELECT * FROM tools WHERE id = ?1", params![id], row_to_tool)
            .optional()
            .map_err(ToolError::from)
    }

    pub fn list(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        self.select("SELECT * FROM tools ORDER BY name")
    }

    pub fn list_enabled(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        self.select("SELECT * FROM tools WHERE enabled = 1 ORDER BY name")
    }

    fn select(&self, sql: &str) -> Result<Vec<ToolDescriptor>, ToolError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], row_to_tool)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, ToolError> {
        self.conn
            .lock()
            .map_err(|_| ToolError::internal("Descriptor store lock poisoned"))
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, ToolError> {
    serde_json::to_string(value).map_err(|err| ToolError::internal(err.to_string()))
}

fn row_to_tool(row: &Row<'_>) -> rusqlite::Result<ToolDescriptor> {
    let config: String = row.get("config")?;
    let parameters: String = row.get("parameters")?;
    let auth: String = row.get("auth")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    Ok(ToolDescriptor {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        enabled: row.get::<_, i64>("enabled")? != 0,
        config: decode_column(&config, "config")?,
        parameters: decode_column::<Vec<ParameterSpec>>(&parameters, "parameters")?,
        auth: decode_column::<AuthSpec>(&auth, "auth")?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn decode_column<T: serde::de::DeserializeOwned>(raw: &str, column: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("{}: {}", column, err),
            )),
        )
    })
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
