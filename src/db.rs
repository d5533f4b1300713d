use crate::Result;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::Duration;

pub fn open(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
    )?;

    conn.busy_timeout(Duration::from_secs(10))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;

    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS meta (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pins (
  id INTEGER PRIMARY KEY,
  pin INTEGER UNIQUE NOT NULL,
  timestamp_ms INTEGER
);

CREATE UNIQUE INDEX IF NOT EXISTS pin_index ON pins(pin);
"#,
    )?;

    // Ledgers written by the older tool stored a text `timestamp` column only.
    if !has_column(conn, "pins", "timestamp_ms")? {
        conn.execute("ALTER TABLE pins ADD COLUMN timestamp_ms INTEGER", [])?;
    }

    let current_schema_version = 1;
    let existing: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key='schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match existing {
        Some(v) if v == current_schema_version.to_string() => {}
        _ => {
            conn.execute(
                "INSERT INTO meta(key, value) VALUES('schema_version', ?)
                 ON CONFLICT(key) DO UPDATE SET value=excluded.value",
                [current_schema_version.to_string()],
            )?;
        }
    }

    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub(crate) trait OptionalRowExt<T> {
    fn optional(self) -> rusqlite::Result<Option<T>>;
}

impl<T> OptionalRowExt<T> for rusqlite::Result<T> {
    fn optional(self) -> rusqlite::Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_adds_timestamp_ms_for_legacy_pins_table() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("db").join("pins.sqlite");
        std::fs::create_dir_all(db_path.parent().expect("parent")).expect("mkdir");

        {
            let conn = Connection::open(&db_path).expect("open");
            conn.execute_batch(
                r#"
CREATE TABLE IF NOT EXISTS pins (
  id INTEGER PRIMARY KEY,
  pin INTEGER UNIQUE NOT NULL,
  timestamp timestamp
);
INSERT INTO pins VALUES (NULL, 4242, '2018-01-01 10:00:00');
"#,
            )
            .expect("create legacy pins table");
        }

        let conn = open(&db_path).expect("open migrated");
        migrate(&conn).expect("migrate");

        assert!(has_column(&conn, "pins", "timestamp_ms").expect("table_info"));
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM pins WHERE pin=4242", [], |row| {
                row.get(0)
            })
            .expect("count");
        assert_eq!(count, 1, "legacy rows must survive migration");
    }

    #[test]
    fn migrate_is_repeatable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = open(&dir.path().join("pins.sqlite")).expect("open");
        migrate(&conn).expect("first migrate");
        migrate(&conn).expect("second migrate");
        let version: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key='schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .expect("query");
        assert_eq!(version.as_deref(), Some("1"));
    }
}
