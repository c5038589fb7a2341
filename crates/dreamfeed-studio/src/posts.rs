//! Collaborator seam for the content-library post store.
//!
//! The studio materializes completed generations into posts but never owns
//! their persistence; the embedding application supplies a [`PostStore`].

use async_trait::async_trait;
use thiserror::Error;

use dreamfeed_core::{Platform, Post, PostId, PostStatus, UserId};

/// Fields handed over when materializing a generation result into a post.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub owner_id: UserId,
    pub caption: Option<String>,
    /// URL of the generated media asset.
    pub media_url: String,
    /// Platforms the post is intended for, carried through to publish time.
    pub platforms: Vec<Platform>,
    pub nsfw: bool,
}

/// Persistence-layer failure from the post store.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PostStoreError(pub String);

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create_image_post(&self, draft: &PostDraft) -> Result<Post, PostStoreError>;

    async fn create_video_post(&self, draft: &PostDraft) -> Result<Post, PostStoreError>;

    /// Fetch an existing post; `None` when the id is unknown.
    async fn get_post(&self, id: &PostId) -> Result<Option<Post>, PostStoreError>;

    async fn update_status(&self, id: &PostId, status: PostStatus) -> Result<(), PostStoreError>;
}
