//! Collaborator seam for the generation provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use dreamfeed_core::{MediaKind, UserId};

/// What the executor asks the provider to produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub owner_id: UserId,
    pub prompt: String,
    /// Backend-specific model identifier; the provider picks its default when
    /// absent.
    pub model_id: Option<String>,
    pub kind: MediaKind,
    pub nsfw: bool,
}

/// Provider response to a start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationStart {
    /// The artifact was produced synchronously.
    Immediate { artifact_url: String },
    /// Work continues asynchronously under this job id.
    Queued { job_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Provider-side record of an asynchronous generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: String,
    pub state: JobState,
    /// URLs of produced artifacts, populated on completion.
    pub artifacts: Vec<String>,
    /// Set by a webhook side channel for providers that signal completion
    /// outside the polled state field.
    pub webhook_completed: bool,
}

impl GenerationJob {
    /// Completed with at least one artifact, or flagged complete by the
    /// webhook side channel.
    pub fn is_done(&self) -> bool {
        (self.state == JobState::Completed && !self.artifacts.is_empty()) || self.webhook_completed
    }
}

/// Transport-level provider error.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct GenerationError(pub String);

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn start_generation(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationStart, GenerationError>;

    /// Provider-side job record; `None` when the job id is not known (yet).
    async fn get_job(&self, job_id: &str) -> Result<Option<GenerationJob>, GenerationError>;
}
