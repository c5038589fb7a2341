//! `dreamfeed-publish` — delivery of posts to external social platforms.
//!
//! The [`pipeline::Publisher`] takes an already-materialized post, applies the
//! per-platform content policy, intersects the requested platforms with the
//! owner's linked accounts, and hands one submission to the
//! embedder-provided [`transport::SocialTransport`]. Completed deliveries are
//! recorded per platform in a SQLite `publish_records` table.

pub mod db;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod records;
pub mod transport;

pub use error::{PublishError, Result};
pub use pipeline::{PublishOutcome, Publisher, SkipReason};
pub use records::{PublishRecord, PublishRecordStore};
pub use transport::{
    Connection, SocialProfile, SocialTransport, SubmitReceipt, SubmitRequest, TransportError,
};
