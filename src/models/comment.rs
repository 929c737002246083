use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A comment attached to a post.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub body: String,
    pub owner: String,
    /// The post this comment belongs to.
    pub post: Uuid,
    pub likes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, FromRow, Debug)]
pub struct CommentRow {
    pub id: Uuid,
    pub post_id: Uuid,
    pub body: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommentRow {
    pub fn into_comment(self, likes: Vec<String>) -> Comment {
        Comment {
            id: self.id,
            body: self.body,
            owner: self.owner,
            post: self.post_id,
            likes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post: Uuid,
    pub body: String,
    pub owner: String,
}

/// Request body for creating or editing a comment.
#[derive(Debug, Clone, Deserialize)]
pub struct CommentBody {
    pub body: String,
}
