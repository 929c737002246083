//! Data access and outbound collaborators.
//!
//! `post_service` and `comment_service` own every SQL statement; handlers
//! only see entities in and entities out. `image_uploader` pushes files to
//! wherever post images are published.

pub mod comment_service;
pub mod image_uploader;
pub mod post_service;

use sqlx::SqlitePool;
use thiserror::Error;

const INIT_SQL: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("migration statement {index} failed: {source}")]
    Migration {
        index: usize,
        #[source]
        source: sqlx::Error,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Run the embedded schema statement by statement.
///
/// Every statement is `IF NOT EXISTS`, so running it twice is harmless.
pub async fn run_migrations(db: &SqlitePool) -> StoreResult<usize> {
    let statements = INIT_SQL
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for (index, stmt) in statements.iter().enumerate() {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt)
            .execute(db)
            .await
            .map_err(|source| StoreError::Migration { index, source })?;
    }

    Ok(statements.len())
}

/// Single-connection in-memory database with the schema applied.
#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");
    run_migrations(&pool).await.expect("apply schema");
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = memory_pool().await;
        let applied = run_migrations(&pool).await.unwrap();
        assert!(applied >= 6);

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        for expected in [
            "comment_likes",
            "comments",
            "post_comments",
            "post_images",
            "post_likes",
            "posts",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing {expected}");
        }
    }
}
