//! Post entity shared between the studio (which creates posts) and the publish
//! pipeline (which delivers them).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Platform, PostId, UserId};

/// Kind of generated media attached to a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// A single media asset, referenced by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    pub kind: MediaKind,
}

impl MediaRef {
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: MediaKind::Image,
        }
    }

    pub fn video(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: MediaKind::Video,
        }
    }
}

/// Lifecycle of a post in the content library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    #[default]
    Draft,
    Ready,
    Published,
    PublishFailed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Ready => "ready",
            PostStatus::Published => "published",
            PostStatus::PublishFailed => "publish_failed",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "ready" => Ok(PostStatus::Ready),
            "published" => Ok(PostStatus::Published),
            "publish_failed" => Ok(PostStatus::PublishFailed),
            other => Err(format!("unknown post status: {}", other)),
        }
    }
}

/// A content post: generated media plus publishing metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub owner_id: UserId,
    pub caption: Option<String>,
    pub media: Vec<MediaRef>,
    /// Platforms this post is intended for. May be narrowed further by the
    /// content policy at publish time.
    pub platforms: Vec<Platform>,
    pub nsfw: bool,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// First media URL, if any. Convenience for single-asset posts.
    pub fn primary_media_url(&self) -> Option<&str> {
        self.media.first().map(|m| m.url.as_str())
    }
}
