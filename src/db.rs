use crate::error::{PlotError, PlotResult};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    username      TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS stored_files (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    owner         TEXT NOT NULL,
    path          TEXT NOT NULL,
    original_name TEXT NOT NULL,
    uploaded_at   TEXT NOT NULL,
    detached      INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS stored_files_owner ON stored_files (owner, uploaded_at);
CREATE TABLE IF NOT EXISTS saved_charts (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    owner    TEXT NOT NULL,
    title    TEXT NOT NULL,
    kind     TEXT NOT NULL,
    spec     TEXT NOT NULL,
    saved_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS saved_charts_owner ON saved_charts (owner, saved_at);
";

/// The relational side of persistence: users, uploaded file records and saved
/// charts, all in one SQLite database.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> PlotResult<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> PlotResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> PlotResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection. Callers must not hold the guard across an await.
    pub fn lock(&self) -> PlotResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| PlotError::Poisoned("database"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.lock().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'stored_files', 'saved_charts')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }
}
