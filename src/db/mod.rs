pub mod models;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

use crate::error::AppError;
use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_initial",
        include_str!("../../migrations/001_initial.sql"),
    ),
    (
        "002_sessions",
        include_str!("../../migrations/002_sessions.sql"),
    ),
];

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // foreign_keys is per-connection, so every pooled connection gets it
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )
    });
    let pool = Pool::builder().max_size(8).build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;

    Ok(pool)
}

/// Single-connection in-memory pool. Each in-memory connection is its own
/// database, so the pool must never hold more than one.
pub fn memory_pool() -> anyhow::Result<DbPool> {
    let manager = SqliteConnectionManager::memory()
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = Pool::builder().max_size(1).build(manager)?;
    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    // Create migrations tracking table
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// Maps a UNIQUE violation to `Conflict`, everything else passes through.
pub fn conflict_on_unique(err: rusqlite::Error, message: &str) -> AppError {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            AppError::Conflict(message.to_string())
        }
        other => AppError::Database(other),
    }
}

#[cfg(test)]
pub(crate) fn test_pool() -> DbPool {
    let pool = memory_pool().unwrap();
    run_migrations(&pool).unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_pool_creates_db_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("sub/dir/test.db");
        let pool = create_pool(&db_path).unwrap();
        assert!(db_path.exists());

        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn every_pooled_connection_enforces_foreign_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = create_pool(&tmp.path().join("fk.db")).unwrap();

        let first = pool.get().unwrap();
        let second = pool.get().unwrap();
        for conn in [&first, &second] {
            let enabled: bool = conn
                .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
                .unwrap();
            assert!(enabled);
        }
    }

    #[test]
    fn migrations_run_successfully() {
        let pool = memory_pool().unwrap();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };
        for table in [
            "user",
            "user_profile",
            "post",
            "post_liked_by",
            "comment",
            "session",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let pool = memory_pool().unwrap();
        run_migrations(&pool).unwrap();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn foreign_keys_enforced() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let result = conn.execute(
            "INSERT INTO post (title, text, author_id, created_at, updated_at)
             VALUES ('t', 'x', 999, datetime('now'), datetime('now'))",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_email_maps_to_conflict() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let insert = "INSERT INTO user (email, password_hash) VALUES ('a@x.com', 'h')";
        conn.execute(insert, []).unwrap();
        let err = conn.execute(insert, []).unwrap_err();
        assert!(matches!(
            conflict_on_unique(err, "taken"),
            AppError::Conflict(_)
        ));
    }
}
