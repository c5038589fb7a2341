//! `dreamfeed-studio` — the generation executor behind scheduled actions.
//!
//! Implements the scheduler's `ActionExecutor` seam: image and video actions
//! resolve an effective prompt, charge the points ledger, drive the
//! generation provider (polling queued jobs to completion via the
//! [`waiter::CompletionWaiter`]), materialize the result into a post, and
//! optionally hand it to the publish pipeline. The provider, post store, and
//! ledger are collaborator traits supplied by the embedding application.

pub mod backend;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod posts;
pub mod prompt;
pub mod waiter;

pub use backend::{
    GenerationBackend, GenerationError, GenerationJob, GenerationRequest, GenerationStart,
    JobState,
};
pub use error::{Result, StudioError};
pub use executor::StudioExecutor;
pub use ledger::{LedgerError, PointsLedger};
pub use posts::{PostDraft, PostStore, PostStoreError};
pub use waiter::{CompletionWaiter, WaitPolicy};
