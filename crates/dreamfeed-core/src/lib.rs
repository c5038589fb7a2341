pub mod action;
pub mod config;
pub mod error;
pub mod post;
pub mod types;

pub use action::ActionData;
pub use config::DreamfeedConfig;
pub use error::CoreError;
pub use post::{MediaKind, MediaRef, Post, PostStatus};
pub use types::{Platform, PostId, ScheduleId, UserId};
