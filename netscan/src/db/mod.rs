use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

use crate::error::Result;

/// Embedded migrations, applied in order and tracked in `_migrations`.
const MIGRATIONS: &[(i64, &str, &str)] = &[(
    1,
    "001_vendor_cache.sql",
    include_str!("migrations/001_vendor_cache.sql"),
)];

/// Open (creating if needed) the vendor cache database and run migrations.
///
/// `":memory:"` gives a private in-memory database, used by tests.
pub async fn init(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(5));

    // An in-memory database exists per connection; keep exactly one.
    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    // Run migrations manually (avoids compile-time DATABASE_URL requirement).
    run_migrations(&pool).await?;
    info!("Vendor cache migrations applied");

    Ok(pool)
}

/// Apply pending migrations using a simple version-tracking table.
///
/// Each migration runs in its own transaction together with its version row.
pub(crate) async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _migrations (\
         version INTEGER PRIMARY KEY, \
         applied_at TEXT NOT NULL DEFAULT (datetime('now')))",
    )
    .execute(pool)
    .await?;

    for &(version, name, sql) in MIGRATIONS {
        let applied = sqlx::query("SELECT 1 FROM _migrations WHERE version = ?")
            .bind(version)
            .fetch_optional(pool)
            .await?
            .is_some();
        if applied {
            continue;
        }

        let mut tx = pool.begin().await?;
        for stmt in statements(sql) {
            sqlx::query(&stmt).execute(&mut *tx).await?;
        }
        sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
            .bind(version)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(migration = name, version, "Applied migration");
    }

    Ok(())
}

/// Split a migration file into statements, dropping `--` comment lines.
fn statements(sql: &str) -> Vec<String> {
    let code: String = sql
        .lines()
        .filter(|l| !l.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");
    code.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_apply_cleanly() {
        let pool = init(":memory:").await.expect("DB init failed");

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='vendor_cache'",
        )
        .fetch_one(&pool)
        .await
        .expect("Query failed");

        assert_eq!(count, 1, "vendor_cache should exist after migration");
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let pool = init(":memory:").await.expect("First init failed");
        run_migrations(&pool)
            .await
            .expect("Second migration run should succeed");

        let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _migrations")
            .fetch_one(&pool)
            .await
            .expect("Query failed");
        assert_eq!(versions, MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_statements_skip_comments() {
        let sql = "-- header\nCREATE TABLE a (x INTEGER);\n\n-- index\nCREATE INDEX i ON a (x);\n";
        assert_eq!(
            statements(sql),
            vec!["CREATE TABLE a (x INTEGER)", "CREATE INDEX i ON a (x)"]
        );
    }

    #[tokio::test]
    async fn test_file_database_is_created() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.db");
        let url = format!("sqlite://{}", path.display());

        let pool = init(&url).await.expect("file DB init failed");
        pool.close().await;
        assert!(path.exists());
    }
}
