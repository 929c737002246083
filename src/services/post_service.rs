//! PostService: SQLite-backed reads and writes for posts, their image
//! lists and their like sets.
//!
//! Every mutation takes an id plus the change and hands back the resulting
//! `Post`, or `None` when the post does not exist.

use crate::{
    models::post::{NewPost, Post, PostPatch, PostRow},
    services::StoreResult,
};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct PostService {
    pub db: SqlitePool,
}

impl PostService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert a post and its image list in one transaction.
    pub async fn create_post(&self, new: NewPost) -> StoreResult<Post> {
        let now = Utc::now();
        let row = PostRow {
            id: Uuid::new_v4(),
            body: new.body,
            owner: new.owner,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.db.begin().await?;
        sqlx::query(
            "INSERT INTO posts (id, body, owner, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(row.id)
        .bind(&row.body)
        .bind(&row.owner)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *tx)
        .await?;
        replace_images(&mut tx, row.id, &new.images).await?;
        tx.commit().await?;

        debug!(post_id = %row.id, images = new.images.len(), "created post");
        Ok(row.into_post(new.images, Vec::new(), Vec::new()))
    }

    /// All posts in creation order.
    ///
    /// Relations are fetched table by table and grouped in memory, so the
    /// query count does not grow with the number of posts.
    pub async fn list_posts(&self) -> StoreResult<Vec<Post>> {
        let mut conn = self.db.acquire().await?;
        let rows = sqlx::query_as::<_, PostRow>(
            "SELECT id, body, owner, created_at, updated_at
             FROM posts ORDER BY created_at, rowid",
        )
        .fetch_all(&mut *conn)
        .await?;

        let mut images = group_by_post(
            sqlx::query_as::<_, (Uuid, String)>(
                "SELECT post_id, url FROM post_images ORDER BY post_id, position",
            )
            .fetch_all(&mut *conn)
            .await?,
        );
        let mut likes = group_by_post(
            sqlx::query_as::<_, (Uuid, String)>(
                "SELECT post_id, user_id FROM post_likes ORDER BY rowid",
            )
            .fetch_all(&mut *conn)
            .await?,
        );
        let mut comments = group_by_post(
            sqlx::query_as::<_, (Uuid, Uuid)>(
                "SELECT post_id, comment_id FROM post_comments ORDER BY post_id, position",
            )
            .fetch_all(&mut *conn)
            .await?,
        );

        Ok(rows
            .into_iter()
            .map(|row| {
                let id = row.id;
                row.into_post(
                    images.remove(&id).unwrap_or_default(),
                    likes.remove(&id).unwrap_or_default(),
                    comments.remove(&id).unwrap_or_default(),
                )
            })
            .collect())
    }

    pub async fn find_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        let mut conn = self.db.acquire().await?;
        load_post(&mut conn, id).await
    }

    /// Apply a partial update. The image list is replaced wholesale when
    /// the patch carries one.
    pub async fn update_post(&self, id: Uuid, patch: PostPatch) -> StoreResult<Option<Post>> {
        let mut tx = self.db.begin().await?;
        let result = sqlx::query(
            "UPDATE posts SET body = COALESCE(?, body), updated_at = ? WHERE id = ?",
        )
        .bind(patch.body)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        if let Some(images) = patch.images.as_deref() {
            replace_images(&mut tx, id, images).await?;
        }

        let post = load_post(&mut tx, id).await?;
        tx.commit().await?;
        Ok(post)
    }

    /// Delete a post. Images, likes and comments go with it.
    ///
    /// Returns false when nothing was deleted.
    pub async fn delete_post(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flip `user_id`'s membership in the post's like set.
    ///
    /// Removal and insertion run in one transaction, so concurrent toggles
    /// by the same user serialize instead of interleaving.
    pub async fn toggle_like(&self, id: Uuid, user_id: &str) -> StoreResult<Option<Post>> {
        let mut tx = self.db.begin().await?;

        let touched = sqlx::query("UPDATE posts SET updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Ok(None);
        }

        let removed = sqlx::query("DELETE FROM post_likes WHERE post_id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() == 0 {
            sqlx::query("INSERT INTO post_likes (post_id, user_id) VALUES (?, ?)")
                .bind(id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        let post = load_post(&mut tx, id).await?;
        tx.commit().await?;
        debug!(post_id = %id, user_id, liked = removed.rows_affected() == 0, "toggled post like");
        Ok(post)
    }
}

async fn replace_images(
    conn: &mut SqliteConnection,
    post_id: Uuid,
    images: &[String],
) -> StoreResult<()> {
    sqlx::query("DELETE FROM post_images WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *conn)
        .await?;
    for (position, url) in images.iter().enumerate() {
        sqlx::query("INSERT INTO post_images (post_id, position, url) VALUES (?, ?, ?)")
            .bind(post_id)
            .bind(position as i64)
            .bind(url)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn load_post(conn: &mut SqliteConnection, id: Uuid) -> StoreResult<Option<Post>> {
    let row = sqlx::query_as::<_, PostRow>(
        "SELECT id, body, owner, created_at, updated_at FROM posts WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(Some(hydrate(conn, row).await?)),
        None => Ok(None),
    }
}

/// Bucket `(post_id, value)` pairs by post, keeping their order.
fn group_by_post<T>(pairs: Vec<(Uuid, T)>) -> HashMap<Uuid, Vec<T>> {
    let mut grouped: HashMap<Uuid, Vec<T>> = HashMap::new();
    for (post_id, value) in pairs {
        grouped.entry(post_id).or_default().push(value);
    }
    grouped
}

/// Attach images, likes and comment references to a post row.
async fn hydrate(conn: &mut SqliteConnection, row: PostRow) -> StoreResult<Post> {
    let images = sqlx::query_scalar::<_, String>(
        "SELECT url FROM post_images WHERE post_id = ? ORDER BY position",
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await?;

    let likes = sqlx::query_scalar::<_, String>(
        "SELECT user_id FROM post_likes WHERE post_id = ? ORDER BY rowid",
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await?;

    let comments = sqlx::query_scalar::<_, Uuid>(
        "SELECT comment_id FROM post_comments WHERE post_id = ? ORDER BY position",
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(row.into_post(images, likes, comments))
}
