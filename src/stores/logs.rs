use crate::errors::ToolError;
use crate::model::ExecutionLogRecord;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Mutex;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS execution_logs (
  id TEXT PRIMARY KEY,
  tool_id TEXT NOT NULL,
  tool_name TEXT NOT NULL,
  kind TEXT NOT NULL,
  source TEXT NOT NULL,
  timestamp TEXT NOT NULL,
  success INTEGER NOT NULL,
  duration_ms INTEGER NOT NULL,
  request TEXT NOT NULL,
  response TEXT NOT NULL,
  error TEXT
);
CREATE INDEX IF NOT EXISTS idx_logs_timestamp ON execution_logs(timestamp);
CREATE INDEX IF NOT EXISTS idx_logs_tool ON execution_logs(tool_id);
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogStats {
    pub total: usize,
    pub failures: usize,
}

/// Append-only execution history with a bounded tail. Every append
/// prunes past the retention limit so the table never grows unbounded.
pub struct LogStore {
    conn: Mutex<Connection>,
    retention: usize,
}

impl LogStore {
    pub fn open(path: &Path, retention: usize) -> Result<Self, ToolError> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            retention,
        })
    }

    pub fn in_memory(retention: usize) -> Result<Self, ToolError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            retention,
        })
    }

    pub fn append(&self, record: &ExecutionLogRecord) -> Result<(), ToolError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO execution_logs
             (id, tool_id, tool_name, kind, source, timestamp, success, duration_ms, request, response, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.id,
                record.tool_id,
                record.tool_name,
                record.kind.as_str(),
                record.source.as_str(),
                record.timestamp.to_rfc3339(),
                record.success as i64,
                record.duration_ms as i64,
                record.request.to_string(),
                record.response.to_string(),
                record.error,
            ],
        )?;
        // rowid tiebreak keeps the order stable when timestamps collide
        conn.execute(
            "DELETE FROM execution_logs WHERE id NOT IN (
               SELECT id FROM execution_logs ORDER BY timestamp DESC, rowid DESC LIMIT ?1
             )",
            params![self.retention as i64],
        )?;
        Ok(())
    }

    pub fn recent(&self, limit: usize) -> Result<Vec<ExecutionLogRecord>, ToolError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM execution_logs ORDER BY timestamp DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], row_to_record)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn count(&self) -> Result<usize, ToolError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM execution_logs", [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }

    pub fn stats(&self) -> Result<LogStats, ToolError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(success = 0), 0) FROM execution_logs",
            [],
            |row| {
                Ok(LogStats {
                    total: row.get::<_, i64>(0)? as usize,
                    failures: row.get::<_, i64>(1)? as usize,
                })
            },
        )
        .map_err(ToolError::from)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, ToolError> {
        self.conn
            .lock()
            .map_err(|_| ToolError::internal("Log store lock poisoned"))
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ExecutionLogRecord> {
    let kind: String = row.get("kind")?;
    let source: String = row.get("source")?;
    let timestamp: String = row.get("timestamp")?;
    let request: String = row.get("request")?;
    let response: String = row.get("response")?;
    Ok(ExecutionLogRecord {
        id: row.get("id")?,
        tool_id: row.get("tool_id")?,
        tool_name: row.get("tool_name")?,
        kind: parse_kind(&kind),
        source: parse_source(&source),
        timestamp: chrono::DateTime::parse_from_rfc3339(&timestamp)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        success: row.get::<_, i64>("success")? != 0,
        duration_ms: row.get::<_, i64>("duration_ms")? as u64,
        request: serde_json::from_str(&request).unwrap_or(serde_json::Value::Null),
        response: serde_json::from_str(&response).unwrap_or(serde_json::Value::Null),
        error: row.get("error")?,
    })
}

fn parse_kind(raw: &str) -> crate::model::ExecutorKind {
    match raw {
        "http" => crate::model::ExecutorKind::Http,
        _ => crate::model::ExecutorKind::Cli,
    }
}

fn parse_source(raw: &str) -> crate::model::LogSource {
    match raw {
        "live" => crate::model::LogSource::Live,
        _ => crate::model::LogSource::Test,
    }
}
