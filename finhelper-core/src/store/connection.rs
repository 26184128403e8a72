//! SQLite connection setup.

use super::migrations::run_migrations;
use super::StoreError;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// Bound on how long one gateway call waits for a locked database.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(15);

/// Open (or create) the store at `path` and bring its schema up to date.
pub fn open_store(path: &Path, busy_timeout: Duration) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    run_migrations(&conn)?;
    tracing::info!(path = %path.display(), "document store opened");
    Ok(conn)
}

/// Fresh in-memory store with the full schema.
pub fn open_in_memory() -> Result<Connection, StoreError> {
    let conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    run_migrations(&conn)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        drop(open_store(&path, DEFAULT_BUSY_TIMEOUT).unwrap());
        let conn = open_store(&path, DEFAULT_BUSY_TIMEOUT).unwrap();
        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, 2);
    }
}
