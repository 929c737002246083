pub mod comment_handlers;
pub mod health_handlers;
pub mod media_handlers;
pub mod post_handlers;
pub mod uploads;
