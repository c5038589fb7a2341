//! Collaborator seam for external social-platform delivery.
//!
//! The pipeline never talks HTTP itself; the embedding application supplies a
//! [`SocialTransport`] wrapping whatever aggregator or per-platform API it
//! uses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use dreamfeed_core::{Platform, UserId};

/// A linked social account the owner can publish through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub platform: Platform,
    /// Provider-side identifier of the linked account.
    pub connection_id: String,
}

/// The owner's social profile and its linked accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialProfile {
    pub profile_id: String,
    pub connections: Vec<Connection>,
}

impl SocialProfile {
    /// Platforms with at least one linked account.
    pub fn connected_platforms(&self) -> Vec<Platform> {
        self.connections.iter().map(|c| c.platform).collect()
    }

    /// Connection ids for the given platforms, in request order.
    pub fn connection_ids_for(&self, platforms: &[Platform]) -> Vec<String> {
        platforms
            .iter()
            .filter_map(|p| {
                self.connections
                    .iter()
                    .find(|c| c.platform == *p)
                    .map(|c| c.connection_id.clone())
            })
            .collect()
    }
}

/// One submission carrying the post's content for every target platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub caption: String,
    pub media_urls: Vec<String>,
    pub platforms: Vec<Platform>,
    pub connection_ids: Vec<String>,
}

/// Provider acknowledgement for a submitted post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReceipt {
    /// Provider-side id of the created post.
    pub remote_post_id: String,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Transport unavailable: {0}")]
    Unavailable(String),
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },
}

#[async_trait]
pub trait SocialTransport: Send + Sync {
    /// The owner's profile with linked accounts, or `None` when the owner has
    /// no social profile at all.
    async fn resolve_profile(
        &self,
        owner: &UserId,
    ) -> Result<Option<SocialProfile>, TransportError>;

    /// Submit a post. One call covers every platform in the request.
    async fn submit_post(&self, request: &SubmitRequest) -> Result<SubmitReceipt, TransportError>;
}
