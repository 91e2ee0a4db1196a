//! Schema migrations for the message buffer.
//!
//! The `messages` layout is a compatibility contract with existing buffer
//! files and must not change. Migrations are tracked in the `migrations`
//! table and applied in order.

use crate::StorageResult;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version.
pub const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> StorageResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM migrations",
        [],
        |row| row.get(0),
    )?;

    debug!(current_version, target_version = CURRENT_VERSION, "Running migrations");

    if current_version < 1 {
        migrate_v1_messages(conn)?;
    }

    Ok(())
}

fn record_migration(conn: &Connection, version: i32, name: &str) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![version, name],
    )?;
    debug!(version, name, "Migration applied");
    Ok(())
}

/// V1: messages table and pending-scan index.
///
/// `IF NOT EXISTS` keeps buffers created before migration tracking intact.
fn migrate_v1_messages(conn: &Connection) -> StorageResult<()> {
    info!("Applying migration v1: messages");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            payload BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            sent INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_messages_sent ON messages(sent);
        ",
    )?;

    record_migration(conn, 1, "messages")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_run_successfully() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"messages".to_string()));
        assert!(tables.contains(&"migrations".to_string()));
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_messages_schema_layout() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let columns: Vec<(String, String)> = conn
            .prepare("PRAGMA table_info(messages)")
            .unwrap()
            .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert_eq!(
            columns,
            vec![
                ("id".to_string(), "INTEGER".to_string()),
                ("payload".to_string(), "BLOB".to_string()),
                ("created_at".to_string(), "INTEGER".to_string()),
                ("sent".to_string(), "INTEGER".to_string()),
            ]
        );

        let index: String = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type='index' AND tbl_name='messages' AND name='idx_messages_sent'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(index, "idx_messages_sent");
    }

    #[test]
    fn test_migrations_adopt_existing_buffer() {
        let conn = Connection::open_in_memory().unwrap();

        // Buffer file written before migration tracking existed
        conn.execute_batch(
            "
            CREATE TABLE messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                payload BLOB NOT NULL,
                created_at INTEGER NOT NULL,
                sent INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX idx_messages_sent ON messages(sent);
            INSERT INTO messages (payload, created_at, sent) VALUES (x'6869', 1700000000, 0);
            ",
        )
        .unwrap();

        run_migrations(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM messages WHERE sent = 0", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
