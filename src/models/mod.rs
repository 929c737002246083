//! Core data models for posts, comments and likes.
//!
//! The public structs serialize as the JSON bodies handlers return. Row
//! structs map storage records via `sqlx::FromRow`; the services assemble
//! them with their image, like and comment lists.

pub mod comment;
pub mod post;
