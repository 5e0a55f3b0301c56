//! SQLite connection pool and schema bootstrap for bookshelf.
//!
//! Modules contribute [`Migration`]s; [`Database::apply_migrations`] runs them
//! in order at startup. Every migration must be idempotent (`IF NOT EXISTS`).

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default connection acquire timeout.
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while opening the pool or bootstrapping the schema.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration {module}/{id} failed: {source}")]
    Migration {
        module: String,
        id: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

/// Schema statement contributed by a module.
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

/// Shared database handle. Cheap to clone; clones share one pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Connect to a SQLite database, e.g. `sqlite:data/bookshelf.db?mode=rwc`
    /// or `sqlite::memory:`.
    ///
    /// In-memory databases live inside a single connection, so the pool is
    /// pinned to exactly one connection that is never recycled.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, DbError> {
        let in_memory = is_in_memory(url);

        let mut options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        if !in_memory {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options
            .acquire_timeout(DEFAULT_ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;

        tracing::info!(target: "bookshelf-db", in_memory, "database pool ready");

        Ok(Self { pool })
    }

    /// Underlying sqlx pool for query execution.
    #[inline]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run `(module, migration)` pairs in the given order.
    pub async fn apply_migrations(&self, migrations: &[(String, Migration)]) -> Result<(), DbError> {
        for (module, migration) in migrations {
            tracing::info!(
                target: "bookshelf-db",
                module = %module,
                migration = migration.id,
                "applying schema"
            );

            sqlx::raw_sql(migration.up)
                .execute(&self.pool)
                .await
                .map_err(|source| DbError::Migration {
                    module: module.clone(),
                    id: migration.id,
                    source,
                })?;
        }

        Ok(())
    }

    /// Round-trip a trivial statement; backs `GET /readyz`.
    pub async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_in_memory_urls() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite:file:shelf?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite:data/bookshelf.db?mode=rwc"));
    }

    #[tokio::test]
    async fn connect_in_memory_and_ping() {
        let db = Database::connect("sqlite::memory:", 5).await.unwrap();
        db.ping().await.unwrap();
        assert!(!db.is_closed());

        db.close().await;
        assert!(db.is_closed());
    }

    #[tokio::test]
    async fn migrations_run_in_order_and_are_repeatable() {
        let db = Database::connect("sqlite::memory:", 1).await.unwrap();
        let migrations = vec![
            (
                "test".to_string(),
                Migration {
                    id: "001_init",
                    up: "CREATE TABLE IF NOT EXISTS shelf (id TEXT PRIMARY KEY);",
                },
            ),
            (
                "test".to_string(),
                Migration {
                    id: "002_seed",
                    up: "INSERT OR IGNORE INTO shelf (id) VALUES ('a');",
                },
            ),
        ];

        db.apply_migrations(&migrations).await.unwrap();
        db.apply_migrations(&migrations).await.unwrap();

        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM shelf")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(row.0, 1);
    }

    #[tokio::test]
    async fn failing_migration_names_its_source() {
        let db = Database::connect("sqlite::memory:", 1).await.unwrap();
        let migrations = vec![(
            "broken".to_string(),
            Migration {
                id: "001_bad",
                up: "CREATE TABLE (",
            },
        )];

        let err = db.apply_migrations(&migrations).await.unwrap_err();
        assert!(err.to_string().contains("broken/001_bad"));
    }
}
