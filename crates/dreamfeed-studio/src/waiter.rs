//! Polls an asynchronous generation job to completion.

use std::cmp;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use dreamfeed_core::config::{DEFAULT_MAX_WAIT_MS, DEFAULT_POLL_INTERVAL_MS};

use crate::backend::{GenerationBackend, GenerationJob, JobState};

/// Bounds for one wait: overall deadline and probe cadence.
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub max_wait_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            max_wait_ms: DEFAULT_MAX_WAIT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

pub struct CompletionWaiter {
    backend: Arc<dyn GenerationBackend>,
    policy: WaitPolicy,
}

impl CompletionWaiter {
    pub fn new(backend: Arc<dyn GenerationBackend>, policy: WaitPolicy) -> Self {
        Self { backend, policy }
    }

    /// Wait for `job_id` to finish. The first probe is immediate.
    ///
    /// Returns the job record once it completes with at least one artifact or
    /// the webhook completion flag is set. Returns `None` on explicit failure
    /// (without waiting further) and on deadline expiry. A missing record or
    /// a transient backend error keeps polling within the same deadline: a
    /// job id the provider has not materialised yet counts as still pending.
    pub async fn await_completion(&self, job_id: &str) -> Option<GenerationJob> {
        let deadline = Instant::now() + Duration::from_millis(self.policy.max_wait_ms);
        let poll = Duration::from_millis(self.policy.poll_interval_ms);

        loop {
            match self.backend.get_job(job_id).await {
                Ok(Some(job)) => {
                    if job.is_done() {
                        debug!(
                            job_id,
                            artifacts = job.artifacts.len(),
                            "generation job completed"
                        );
                        return Some(job);
                    }
                    if job.state == JobState::Failed {
                        warn!(job_id, "generation job failed");
                        return None;
                    }
                    debug!(job_id, state = ?job.state, "generation job still running");
                }
                Ok(None) => {
                    debug!(job_id, "generation job not visible yet");
                }
                Err(e) => {
                    warn!(job_id, "job status probe failed: {e}");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    job_id,
                    max_wait_ms = self.policy.max_wait_ms,
                    "generation wait deadline reached"
                );
                return None;
            }
            // The final sleep is clamped so the last probe lands exactly on
            // the deadline.
            tokio::time::sleep(cmp::min(poll, deadline - now)).await;
        }
    }
}
