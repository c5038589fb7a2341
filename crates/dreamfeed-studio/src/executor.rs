//! The generation executor: per-action strategies behind the scheduler's
//! [`ActionExecutor`] seam.
//!
//! Image and video actions charge the ledger, resolve the effective prompt,
//! drive the provider (waiting out queued jobs), materialize a post, and
//! optionally auto-publish it. Publish actions skip generation and push an
//! existing post through the pipeline. Every internal error folds into a
//! failure outcome at the trait boundary so the dispatch loop's lifecycle
//! transition always happens.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use dreamfeed_core::config::StudioConfig;
use dreamfeed_core::{ActionData, MediaKind, Post, PostStatus, UserId};
use dreamfeed_publish::{PublishOutcome, Publisher};
use dreamfeed_scheduler::{
    ActionExecutor, ActionType, ExecutionData, ExecutionOutcome, ExecutionRequest, PublishSummary,
};

use crate::backend::{GenerationBackend, GenerationRequest, GenerationStart};
use crate::error::{Result, StudioError};
use crate::ledger::PointsLedger;
use crate::posts::{PostDraft, PostStore};
use crate::prompt;
use crate::waiter::{CompletionWaiter, WaitPolicy};

pub struct StudioExecutor {
    backend: Arc<dyn GenerationBackend>,
    posts: Arc<dyn PostStore>,
    ledger: Arc<dyn PointsLedger>,
    publisher: Arc<Publisher>,
    waiter: CompletionWaiter,
    config: StudioConfig,
}

impl StudioExecutor {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        posts: Arc<dyn PostStore>,
        ledger: Arc<dyn PointsLedger>,
        publisher: Arc<Publisher>,
        wait_policy: WaitPolicy,
        config: StudioConfig,
    ) -> Self {
        let waiter = CompletionWaiter::new(backend.clone(), wait_policy);
        Self {
            backend,
            posts,
            ledger,
            publisher,
            waiter,
            config,
        }
    }

    async fn try_execute(&self, request: &ExecutionRequest) -> Result<ExecutionData> {
        let action = ActionData::from_value(&request.action_data)
            .map_err(|e| StudioError::BadActionData(e.to_string()))?;
        match request.action_type {
            ActionType::GenerateImage => {
                self.generate(&request.owner_id, &action, MediaKind::Image)
                    .await
            }
            ActionType::GenerateVideo => {
                self.generate(&request.owner_id, &action, MediaKind::Video)
                    .await
            }
            ActionType::PublishPost => self.publish_existing(&request.owner_id, &action).await,
        }
    }

    /// Image/video strategy: deduct, resolve prompt, generate, materialize,
    /// optionally publish.
    async fn generate(
        &self,
        owner: &UserId,
        action: &ActionData,
        kind: MediaKind,
    ) -> Result<ExecutionData> {
        let (cost, reason) = match kind {
            MediaKind::Image => (self.config.image_cost, "image_generation"),
            MediaKind::Video => (self.config.video_cost, "video_generation"),
        };
        self.ledger.deduct(owner, cost, reason).await?;

        let prompt = prompt::resolve(action, &self.config.mutation_templates, &mut rand::thread_rng())?;

        let start = self
            .backend
            .start_generation(&GenerationRequest {
                owner_id: owner.clone(),
                prompt,
                model_id: action.model_id.clone(),
                kind,
                nsfw: action.nsfw,
            })
            .await
            .map_err(|e| StudioError::Generation(e.to_string()))?;

        let artifact_url = match start {
            GenerationStart::Immediate { artifact_url } => artifact_url,
            GenerationStart::Queued { job_id } => {
                debug!(job_id, "generation queued, waiting for completion");
                let job = self
                    .waiter
                    .await_completion(&job_id)
                    .await
                    .ok_or(StudioError::GenerationFailedOrTimedOut)?;
                job.artifacts.into_iter().next().ok_or_else(|| {
                    StudioError::Generation("completed job reported no artifact".to_string())
                })?
            }
        };

        let draft = PostDraft {
            owner_id: owner.clone(),
            caption: action.caption.clone(),
            media_url: artifact_url.clone(),
            platforms: action.platforms.clone(),
            nsfw: action.nsfw,
        };
        let post = match kind {
            MediaKind::Image => self.posts.create_image_post(&draft).await?,
            MediaKind::Video => self.posts.create_video_post(&draft).await?,
        };
        info!(post_id = %post.id, "generated post materialized");

        // A publish problem never invalidates the already-created post; the
        // summary records whatever happened.
        let publish = if action.auto_publish && !action.platforms.is_empty() {
            let outcome = self.publisher.publish(&post, owner).await;
            self.apply_post_status(&post, &outcome).await;
            Some(summarize(outcome))
        } else {
            None
        };

        Ok(ExecutionData {
            post_id: Some(post.id),
            artifact_url: Some(artifact_url),
            publish,
        })
    }

    /// Publish strategy: operate on an existing post, no generation involved.
    ///
    /// Pipeline skips (no platforms, no profile, policy filter, no
    /// connections) are expected outcomes recorded in the summary; only a
    /// transport-level failure fails the action.
    async fn publish_existing(&self, owner: &UserId, action: &ActionData) -> Result<ExecutionData> {
        let post_id = action.post_id.clone().ok_or_else(|| {
            StudioError::BadActionData("publish action requires post_id".to_string())
        })?;
        let mut post = self
            .posts
            .get_post(&post_id)
            .await?
            .ok_or_else(|| StudioError::MissingPost {
                id: post_id.to_string(),
            })?;

        // The action may override the post's own caption and targets.
        if let Some(caption) = &action.caption {
            post.caption = Some(caption.clone());
        }
        if !action.platforms.is_empty() {
            post.platforms = action.platforms.clone();
        }

        let outcome = self.publisher.publish(&post, owner).await;
        self.apply_post_status(&post, &outcome).await;

        if let PublishOutcome::Failed { error } = outcome {
            return Err(StudioError::Publish(error));
        }
        Ok(ExecutionData {
            post_id: Some(post.id.clone()),
            artifact_url: post.primary_media_url().map(String::from),
            publish: Some(summarize(outcome)),
        })
    }

    /// Reflect a publish outcome on the post's status. Skips leave the status
    /// alone; a write failure is logged, never surfaced.
    async fn apply_post_status(&self, post: &Post, outcome: &PublishOutcome) {
        let status = match outcome {
            PublishOutcome::Published { .. } => PostStatus::Published,
            PublishOutcome::Failed { .. } => PostStatus::PublishFailed,
            PublishOutcome::Skipped { .. } => return,
        };
        if let Err(e) = self.posts.update_status(&post.id, status).await {
            warn!(post_id = %post.id, "post status update failed: {e}");
        }
    }
}

#[async_trait]
impl ActionExecutor for StudioExecutor {
    #[instrument(skip(self, request), fields(owner = %request.owner_id, action = %request.action_type))]
    async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        match self.try_execute(request).await {
            Ok(data) => ExecutionOutcome::success(data),
            Err(e) => {
                warn!("execution failed: {e}");
                ExecutionOutcome::failure(e.to_string())
            }
        }
    }
}

fn summarize(outcome: PublishOutcome) -> PublishSummary {
    match outcome {
        PublishOutcome::Published {
            remote_post_id,
            platforms,
        } => PublishSummary {
            published: true,
            platforms,
            remote_post_id: Some(remote_post_id),
            detail: None,
        },
        PublishOutcome::Skipped { reason } => PublishSummary {
            published: false,
            platforms: Vec::new(),
            remote_post_id: None,
            detail: Some(reason.as_str().to_string()),
        },
        PublishOutcome::Failed { error } => PublishSummary {
            published: false,
            platforms: Vec::new(),
            remote_post_id: None,
            detail: Some(error),
        },
    }
}
