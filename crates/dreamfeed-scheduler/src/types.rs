use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use dreamfeed_core::{Platform, PostId, ScheduleId, UserId};

/// Whether a schedule fires once or repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    /// Fires exactly once at `scheduled_for`.
    Single,
    /// Fires repeatedly according to its cron or calendar trigger.
    Recurring,
}

impl ScheduleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleKind::Single => "single",
            ScheduleKind::Recurring => "recurring",
        }
    }
}

impl std::fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScheduleKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "single" => Ok(ScheduleKind::Single),
            "recurring" => Ok(ScheduleKind::Recurring),
            other => Err(format!("unknown schedule kind: {}", other)),
        }
    }
}

/// What the executor should do when the schedule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    GenerateImage,
    GenerateVideo,
    PublishPost,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::GenerateImage => "generate_image",
            ActionType::GenerateVideo => "generate_video",
            ActionType::PublishPost => "publish_post",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "generate_image" => Ok(ActionType::GenerateImage),
            "generate_video" => Ok(ActionType::GenerateVideo),
            "publish_post" => Ok(ActionType::PublishPost),
            other => Err(format!("unknown action type: {}", other)),
        }
    }
}

/// Lifecycle state of a schedule.
///
/// Single schedules move `pending -> completed | failed | cancelled`.
/// Recurring schedules move `active -> active | paused | completed | failed |
/// cancelled`. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    /// Single: waiting for its `scheduled_for` time.
    Pending,
    /// Recurring: eligible for the due scan.
    Active,
    /// Recurring: suspended by the owner; never scanned.
    Paused,
    /// Fired and done, or recurrence exhausted.
    Completed,
    /// Last execution failed (terminal; see `last_error`).
    Failed,
    /// Cancelled by the owner before completion.
    Cancelled,
}

impl ScheduleStatus {
    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScheduleStatus::Completed | ScheduleStatus::Failed | ScheduleStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::Active => "active",
            ScheduleStatus::Paused => "paused",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Failed => "failed",
            ScheduleStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScheduleStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScheduleStatus::Pending),
            "active" => Ok(ScheduleStatus::Active),
            "paused" => Ok(ScheduleStatus::Paused),
            "completed" => Ok(ScheduleStatus::Completed),
            "failed" => Ok(ScheduleStatus::Failed),
            "cancelled" => Ok(ScheduleStatus::Cancelled),
            other => Err(format!("unknown schedule status: {}", other)),
        }
    }
}

/// A persisted schedule record.
///
/// Both kinds share one table, so kind-specific fields are optional:
/// `scheduled_for` / `executed_at` / `result` belong to single schedules,
/// the recurrence fields to recurring ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub owner_id: UserId,
    pub kind: ScheduleKind,
    /// Human-readable label.
    pub name: String,
    pub action_type: ActionType,
    /// Opaque JSON payload forwarded to the executor.
    pub action_data: Value,
    pub status: ScheduleStatus,
    /// Single: the UTC instant the schedule fires.
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Single: when the execution finished.
    pub executed_at: Option<DateTime<Utc>>,
    /// Single: JSON execution data recorded on success.
    pub result: Option<Value>,
    /// Recurring: five-field cron expression (mutually exclusive with
    /// `calendar_id`).
    pub cron_expression: Option<String>,
    /// Recurring: external calendar reference (mutually exclusive with
    /// `cron_expression`).
    pub calendar_id: Option<String>,
    /// Recurring: next planned fire time. `None` means the trigger currently
    /// yields no occurrence; the row is skipped by the due scan.
    pub next_execution_at: Option<DateTime<Utc>>,
    /// Recurring: when the most recent execution was recorded.
    pub last_executed_at: Option<DateTime<Utc>>,
    /// Recurring: number of recorded executions.
    pub execution_count: u32,
    /// Recurring: stop after this many executions. `None` means unlimited.
    pub max_executions: Option<u32>,
    /// Recurring: no executions at or after this instant.
    pub end_date: Option<DateTime<Utc>>,
    /// Recurring: posts produced by successful executions, oldest first.
    pub generated_post_ids: Vec<PostId>,
    /// Most recent execution error, cleared by a later success.
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating a schedule.
///
/// Kind-specific fields are validated by [`crate::manager::ScheduleManager::create`]:
/// single schedules need a future `scheduled_for`, recurring ones exactly one
/// of `cron_expression` / `calendar_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSchedule {
    pub owner_id: UserId,
    pub kind: ScheduleKind,
    pub name: String,
    pub action_type: ActionType,
    #[serde(default)]
    pub action_data: Value,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cron_expression: Option<String>,
    #[serde(default)]
    pub calendar_id: Option<String>,
    #[serde(default)]
    pub max_executions: Option<u32>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

/// Field updates applied by `ScheduleManager::update`.
///
/// `None` leaves a field unchanged. The cap fields are double-optional:
/// `Some(None)` clears the limit.
#[derive(Debug, Clone, Default)]
pub struct SchedulePatch {
    pub name: Option<String>,
    pub action_data: Option<Value>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub cron_expression: Option<String>,
    pub calendar_id: Option<String>,
    pub max_executions: Option<Option<u32>>,
    pub end_date: Option<Option<DateTime<Utc>>>,
}

/// Result of one execution, produced by the executor and applied to the
/// schedule by `mark_executed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ExecutionData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn success(data: ExecutionData) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Structured payload attached to a successful execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionData {
    /// Post created (or published) by this execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<PostId>,
    /// URL of the generated media asset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_url: Option<String>,
    /// Publishing result, when the action attempted a publish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishSummary>,
}

/// Publishing result carried inside [`ExecutionData`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishSummary {
    /// True when the post went out to at least one platform.
    pub published: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platforms: Vec<Platform>,
    /// Identifier assigned by the social transport, when published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_post_id: Option<String>,
    /// Skip reason or error text, when not published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Result of applying an execution outcome to a schedule.
#[derive(Debug, Clone)]
pub enum MarkOutcome {
    /// The transition was applied; the updated schedule is returned.
    Applied(Schedule),
    /// A concurrent writer changed the schedule's status first; nothing was
    /// written and the outcome was dropped.
    Superseded { current: ScheduleStatus },
}

/// Per-status schedule counts for one owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleStats {
    pub total: u32,
    pub pending: u32,
    pub active: u32,
    pub paused: u32,
    pub completed: u32,
    pub failed: u32,
    pub cancelled: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip_all_variants() {
        for status in [
            ScheduleStatus::Pending,
            ScheduleStatus::Active,
            ScheduleStatus::Paused,
            ScheduleStatus::Completed,
            ScheduleStatus::Failed,
            ScheduleStatus::Cancelled,
        ] {
            let parsed: ScheduleStatus = status.as_str().parse().expect("parse failed");
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(ScheduleStatus::Completed.is_terminal());
        assert!(ScheduleStatus::Failed.is_terminal());
        assert!(ScheduleStatus::Cancelled.is_terminal());
        assert!(!ScheduleStatus::Pending.is_terminal());
        assert!(!ScheduleStatus::Active.is_terminal());
        assert!(!ScheduleStatus::Paused.is_terminal());
    }

    #[test]
    fn parse_unknown_action_type_returns_err() {
        assert!("generate_audio".parse::<ActionType>().is_err());
    }

    #[test]
    fn outcome_constructors() {
        let ok = ExecutionOutcome::success(ExecutionData {
            post_id: Some("p-1".into()),
            ..Default::default()
        });
        assert!(ok.success);
        assert!(ok.error.is_none());

        let bad = ExecutionOutcome::failure("backend unavailable");
        assert!(!bad.success);
        assert_eq!(bad.error.as_deref(), Some("backend unavailable"));
    }
}
