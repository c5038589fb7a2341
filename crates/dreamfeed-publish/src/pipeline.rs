//! The publish pipeline: policy filtering, connection resolution, one
//! transport submission, then record keeping.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use dreamfeed_core::{Platform, Post, UserId};

use crate::policy;
use crate::records::PublishRecordStore;
use crate::transport::{SocialTransport, SubmitRequest};

/// Why a publish stopped before reaching the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoPlatforms,
    NoProfile,
    NsfwFiltered,
    NoConnections,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoPlatforms => "no_platforms",
            SkipReason::NoProfile => "no_profile",
            SkipReason::NsfwFiltered => "nsfw_filtered",
            SkipReason::NoConnections => "no_connections",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one publish attempt.
///
/// Skips are expected outcomes, not errors; only a transport-level problem is
/// `Failed`. Neither variant crosses the `publish` boundary as an `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published {
        remote_post_id: String,
        platforms: Vec<Platform>,
    },
    Skipped {
        reason: SkipReason,
    },
    Failed {
        error: String,
    },
}

pub struct Publisher {
    transport: Arc<dyn SocialTransport>,
    records: Arc<PublishRecordStore>,
}

impl Publisher {
    pub fn new(transport: Arc<dyn SocialTransport>, records: Arc<PublishRecordStore>) -> Self {
        Self { transport, records }
    }

    /// Publish `post` to its requested platforms on behalf of `owner`.
    ///
    /// Infallible by contract: the caller's lifecycle transition must not
    /// depend on publish health, so every path folds into a
    /// [`PublishOutcome`].
    #[instrument(skip(self, post), fields(post_id = %post.id, owner = %owner))]
    pub async fn publish(&self, post: &Post, owner: &UserId) -> PublishOutcome {
        if post.platforms.is_empty() {
            debug!("post declares no target platforms");
            return PublishOutcome::Skipped {
                reason: SkipReason::NoPlatforms,
            };
        }

        let profile = match self.transport.resolve_profile(owner).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                debug!("owner has no social profile");
                return PublishOutcome::Skipped {
                    reason: SkipReason::NoProfile,
                };
            }
            Err(e) => {
                warn!("profile resolution failed: {e}");
                return PublishOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        let allowed = policy::filter_for_content(&post.platforms, post.nsfw);
        if allowed.is_empty() {
            info!("every requested platform rejects this content rating");
            return PublishOutcome::Skipped {
                reason: SkipReason::NsfwFiltered,
            };
        }

        let connected = profile.connected_platforms();
        let targets: Vec<Platform> = allowed
            .iter()
            .copied()
            .filter(|p| connected.contains(p))
            .collect();
        if targets.is_empty() {
            info!("no connected account for any allowed platform");
            return PublishOutcome::Skipped {
                reason: SkipReason::NoConnections,
            };
        }

        let connection_ids = profile.connection_ids_for(&targets);
        let request = SubmitRequest {
            caption: post.caption.clone().unwrap_or_default(),
            media_urls: post.media.iter().map(|m| m.url.clone()).collect(),
            platforms: targets.clone(),
            connection_ids: connection_ids.clone(),
        };

        let receipt = match self.transport.submit_post(&request).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!("post submission failed: {e}");
                return PublishOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        // The post is already live at this point; a record-store failure is
        // logged, never surfaced as a publish failure.
        if let Err(e) = self.records.record(
            &post.id,
            owner,
            &targets,
            &connection_ids,
            &receipt.remote_post_id,
        ) {
            error!("publish record write failed: {e}");
        }

        info!(
            remote_post_id = %receipt.remote_post_id,
            platforms = targets.len(),
            "post published"
        );
        PublishOutcome::Published {
            remote_post_id: receipt.remote_post_id,
            platforms: targets,
        }
    }
}
