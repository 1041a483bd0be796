use std::collections::HashSet;
use std::path::Path;

use rusqlite::Connection;

use crate::error::{AppError, ErrorKind};

const MIGRATION_0001: (&str, &str) = (
    "0001_init.sql",
    include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../migrations/0001_init.sql"
    )),
);

fn migrations() -> Vec<(&'static str, &'static str)> {
    vec![MIGRATION_0001]
}

fn db_error(code: &str, message: impl Into<String>, e: impl std::fmt::Display) -> AppError {
    AppError::new(ErrorKind::Storage, code, message).with_details(e.to_string())
}

pub fn open(path: &Path) -> Result<Connection, AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            db_error(
                "DB_OPEN_FAILED",
                "Failed to create database directory",
                format!("path={}; err={e}", parent.display()),
            )
        })?;
    }
    Connection::open(path).map_err(|e| db_error("DB_OPEN_FAILED", "Failed to open SQLite database", e))
}

pub fn open_in_memory() -> Result<Connection, AppError> {
    Connection::open_in_memory().map_err(|e| {
        db_error(
            "DB_OPEN_FAILED",
            "Failed to open in-memory SQLite database",
            e,
        )
    })
}

/// Open (creating if needed) and bring the schema up to date.
pub fn open_and_migrate(path: &Path) -> Result<Connection, AppError> {
    let mut conn = open(path)?;
    migrate(&mut conn)?;
    Ok(conn)
}

pub fn migrate(conn: &mut Connection) -> Result<(), AppError> {
    // Track migrations by name, applying each exactly once, in deterministic order.
    conn.execute_batch(
        r#"
      CREATE TABLE IF NOT EXISTS _migrations (
        name TEXT PRIMARY KEY NOT NULL,
        applied_at TEXT NOT NULL
      );
    "#,
    )
    .map_err(|e| {
        db_error(
            "DB_MIGRATIONS_TABLE_FAILED",
            "Failed to ensure migrations table exists",
            e,
        )
    })?;

    let applied: HashSet<String> = {
        let mut stmt = conn.prepare("SELECT name FROM _migrations").map_err(|e| {
            db_error(
                "DB_MIGRATIONS_QUERY_FAILED",
                "Failed to query applied migrations",
                e,
            )
        })?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| {
                db_error(
                    "DB_MIGRATIONS_QUERY_FAILED",
                    "Failed to read applied migrations",
                    e,
                )
            })?;
        rows.collect::<Result<HashSet<_>, _>>().map_err(|e| {
            db_error(
                "DB_MIGRATIONS_QUERY_FAILED",
                "Failed to read applied migration row",
                e,
            )
        })?
    };

    for (name, sql) in migrations() {
        if applied.contains(name) {
            continue;
        }

        let tx = conn
            .transaction()
            .map_err(|e| db_error("DB_TX_FAILED", "Failed to start migration transaction", e))?;

        tx.execute_batch(sql)
            .map_err(|e| db_error("DB_MIGRATION_FAILED", format!("Migration {name} failed"), e))?;

        tx.execute(
            "INSERT INTO _migrations(name, applied_at) VALUES (?1, strftime('%Y-%m-%dT%H:%M:%fZ','now'))",
            [name],
        )
        .map_err(|e| {
            db_error(
                "DB_MIGRATION_FAILED",
                format!("Failed to record migration {name}"),
                e,
            )
        })?;

        tx.commit()
            .map_err(|e| db_error("DB_TX_FAILED", "Failed to commit migration transaction", e))?;
        tracing::debug!(migration = name, "applied migration");
    }

    Ok(())
}
