//! CommentService: comments and their like sets.

use crate::{
    models::comment::{Comment, CommentRow, NewComment},
    services::StoreResult,
};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct CommentService {
    pub db: SqlitePool,
}

impl CommentService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert a comment and append it to its post's comment list.
    ///
    /// Returns `None`, without writing anything, when the post is missing.
    pub async fn create_comment(&self, new: NewComment) -> StoreResult<Option<Comment>> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let touched = sqlx::query("UPDATE posts SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(new.post)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Ok(None);
        }

        let row = CommentRow {
            id: Uuid::new_v4(),
            post_id: new.post,
            body: new.body,
            owner: new.owner,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            "INSERT INTO comments (id, post_id, body, owner, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(row.id)
        .bind(row.post_id)
        .bind(&row.body)
        .bind(&row.owner)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO post_comments (post_id, comment_id, position)
             SELECT ?, ?, COALESCE(MAX(position), -1) + 1 FROM post_comments WHERE post_id = ?",
        )
        .bind(row.post_id)
        .bind(row.id)
        .bind(row.post_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(comment_id = %row.id, post_id = %row.post_id, "created comment");
        Ok(Some(row.into_comment(Vec::new())))
    }

    pub async fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        let mut conn = self.db.acquire().await?;
        load_comment(&mut conn, id).await
    }

    pub async fn update_body(&self, id: Uuid, body: &str) -> StoreResult<Option<Comment>> {
        let mut tx = self.db.begin().await?;
        let result = sqlx::query("UPDATE comments SET body = ?, updated_at = ? WHERE id = ?")
            .bind(body)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        let comment = load_comment(&mut tx, id).await?;
        tx.commit().await?;
        Ok(comment)
    }

    /// Delete a comment; its likes and its slot in the post's list go too.
    pub async fn delete_comment(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flip `user_id`'s membership in the comment's like set.
    pub async fn toggle_like(&self, id: Uuid, user_id: &str) -> StoreResult<Option<Comment>> {
        let mut tx = self.db.begin().await?;

        let touched = sqlx::query("UPDATE comments SET updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Ok(None);
        }

        let removed =
            sqlx::query("DELETE FROM comment_likes WHERE comment_id = ? AND user_id = ?")
                .bind(id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        if removed.rows_affected() == 0 {
            sqlx::query("INSERT INTO comment_likes (comment_id, user_id) VALUES (?, ?)")
                .bind(id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        let comment = load_comment(&mut tx, id).await?;
        tx.commit().await?;
        debug!(comment_id = %id, user_id, liked = removed.rows_affected() == 0, "toggled comment like");
        Ok(comment)
    }
}

async fn load_comment(conn: &mut SqliteConnection, id: Uuid) -> StoreResult<Option<Comment>> {
    let row = sqlx::query_as::<_, CommentRow>(
        "SELECT id, post_id, body, owner, created_at, updated_at FROM comments WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let likes = sqlx::query_scalar::<_, String>(
        "SELECT user_id FROM comment_likes WHERE comment_id = ? ORDER BY rowid",
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(row.into_comment(likes)))
}
