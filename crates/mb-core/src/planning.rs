use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::Connection;

/// Rows returned by every `list_*` call.
pub const LIST_LIMIT: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database: {0}")]
    Database(#[from] tokio_rusqlite::Error),
    #[error("invalid row: {0}")]
    InvalidRow(String),
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub message: String,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub status: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub description: String,
    pub steps: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub snapshot: String,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLog {
    pub message: String,
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPlan {
    pub description: String,
    #[serde(default)]
    pub steps: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSnapshot {
    pub snapshot: String,
}

fn default_level() -> String {
    "INFO".into()
}
fn default_status() -> String {
    "pending".into()
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Async SQLite-backed store for planning logs, tasks, plans and context
/// snapshots.
pub struct PlanningStore {
    conn: Connection,
}

fn ts_to_sql(ts: DateTime<Utc>) -> String {
    // Fixed width so lexical order is chronological order.
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ts_from_sql(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidRow(format!("timestamp '{raw}': {e}")))
}

impl PlanningStore {
    /// Open (or create) a database at the given file path.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref()).await?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create a purely in-memory database (useful for tests).
    pub async fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(
                    "
                    PRAGMA journal_mode=WAL;
                    PRAGMA synchronous=NORMAL;
                    PRAGMA busy_timeout=5000;

                    CREATE TABLE IF NOT EXISTS logs (
                        id        INTEGER PRIMARY KEY AUTOINCREMENT,
                        timestamp TEXT NOT NULL,
                        level     TEXT NOT NULL DEFAULT 'INFO',
                        message   TEXT NOT NULL,
                        context   TEXT NOT NULL DEFAULT ''
                    );

                    CREATE TABLE IF NOT EXISTS tasks (
                        id         INTEGER PRIMARY KEY AUTOINCREMENT,
                        created_at TEXT NOT NULL,
                        updated_at TEXT NOT NULL,
                        title      TEXT NOT NULL,
                        status     TEXT NOT NULL DEFAULT 'pending',
                        details    TEXT NOT NULL DEFAULT ''
                    );

                    CREATE TABLE IF NOT EXISTS plans (
                        id          INTEGER PRIMARY KEY AUTOINCREMENT,
                        created_at  TEXT NOT NULL,
                        description TEXT NOT NULL,
                        steps       TEXT NOT NULL DEFAULT ''
                    );

                    CREATE TABLE IF NOT EXISTS context_snapshots (
                        id        INTEGER PRIMARY KEY AUTOINCREMENT,
                        timestamp TEXT NOT NULL,
                        snapshot  TEXT NOT NULL
                    );

                    CREATE INDEX IF NOT EXISTS idx_logs_ts      ON logs(timestamp);
                    CREATE INDEX IF NOT EXISTS idx_tasks_ts     ON tasks(created_at);
                    CREATE INDEX IF NOT EXISTS idx_plans_ts     ON plans(created_at);
                    CREATE INDEX IF NOT EXISTS idx_snapshots_ts ON context_snapshots(timestamp);
                    ",
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Logs
    // -----------------------------------------------------------------------

    pub async fn create_log(&self, input: NewLog) -> Result<i64, StoreError> {
        let ts = ts_to_sql(Utc::now());
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO logs (timestamp, level, message, context) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![ts, input.level, input.message, input.context],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn list_logs(&self) -> Result<Vec<LogEntry>, StoreError> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, timestamp, level, message, context FROM logs
                     ORDER BY timestamp DESC, id DESC LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map([LIST_LIMIT as i64], |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(id, ts, level, message, context)| {
                Ok(LogEntry {
                    id,
                    timestamp: ts_from_sql(&ts)?,
                    level,
                    message,
                    context,
                })
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    pub async fn create_task(&self, input: NewTask) -> Result<i64, StoreError> {
        let now = ts_to_sql(Utc::now());
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO tasks (created_at, updated_at, title, status, details)
                     VALUES (?1, ?1, ?2, ?3, ?4)",
                    rusqlite::params![now, input.title, input.status, input.details],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, created_at, updated_at, title, status, details FROM tasks
                     ORDER BY created_at DESC, id DESC LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map([LIST_LIMIT as i64], |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, String>(5)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(id, created, updated, title, status, details)| {
                Ok(Task {
                    id,
                    created_at: ts_from_sql(&created)?,
                    updated_at: ts_from_sql(&updated)?,
                    title,
                    status,
                    details,
                })
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Plans
    // -----------------------------------------------------------------------

    pub async fn create_plan(&self, input: NewPlan) -> Result<i64, StoreError> {
        let now = ts_to_sql(Utc::now());
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO plans (created_at, description, steps) VALUES (?1, ?2, ?3)",
                    rusqlite::params![now, input.description, input.steps],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn list_plans(&self) -> Result<Vec<Plan>, StoreError> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, created_at, description, steps FROM plans
                     ORDER BY created_at DESC, id DESC LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map([LIST_LIMIT as i64], |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(id, created, description, steps)| {
                Ok(Plan {
                    id,
                    created_at: ts_from_sql(&created)?,
                    description,
                    steps,
                })
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Context snapshots
    // -----------------------------------------------------------------------

    pub async fn create_snapshot(&self, input: NewSnapshot) -> Result<i64, StoreError> {
        let ts = ts_to_sql(Utc::now());
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO context_snapshots (timestamp, snapshot) VALUES (?1, ?2)",
                    rusqlite::params![ts, input.snapshot],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn list_snapshots(&self) -> Result<Vec<ContextSnapshot>, StoreError> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, timestamp, snapshot FROM context_snapshots
                     ORDER BY timestamp DESC, id DESC LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map([LIST_LIMIT as i64], |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(id, ts, snapshot)| {
                Ok(ContextSnapshot {
                    id,
                    timestamp: ts_from_sql(&ts)?,
                    snapshot,
                })
            })
            .collect()
    }
}
