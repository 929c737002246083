//! A post: text body, up to five image URLs, likes and comment references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Upper bound on images attached to one post.
pub const MAX_POST_IMAGES: usize = 5;

/// A post as returned to clients.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,

    pub body: String,

    /// Identity of the user who created the post.
    pub owner: String,

    /// Public image URLs, in upload order.
    pub images: Vec<String>,

    /// Identities that liked the post. Never contains duplicates.
    pub likes: Vec<String>,

    /// Comment ids in the order they were added.
    pub comments: Vec<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The `posts` table row, without the related lists.
#[derive(Clone, FromRow, Debug)]
pub struct PostRow {
    pub id: Uuid,
    pub body: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PostRow {
    pub fn into_post(self, images: Vec<String>, likes: Vec<String>, comments: Vec<Uuid>) -> Post {
        Post {
            id: self.id,
            body: self.body,
            owner: self.owner,
            images,
            likes,
            comments,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Input for creating a post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub body: String,
    pub owner: String,
    pub images: Vec<String>,
}

/// Partial update of a post. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostPatch {
    pub body: Option<String>,
    pub images: Option<Vec<String>>,
}
