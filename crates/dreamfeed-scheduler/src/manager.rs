//! Schedule lifecycle manager.
//!
//! Owns every status transition. Execution results arrive through
//! [`ScheduleManager::mark_executed`], which applies the transition with a
//! compare-and-swap against the status the executor observed: when a user
//! action (pause, cancel, delete) lands while an execution is in flight, the
//! user's write wins and the stale result is dropped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use dreamfeed_core::{ScheduleId, UserId};

use crate::error::{Result, SchedulerError};
use crate::store::ScheduleStore;
use crate::trigger::{Trigger, TriggerResolver};
use crate::types::{
    ExecutionOutcome, MarkOutcome, NewSchedule, Schedule, ScheduleKind, SchedulePatch,
    ScheduleStats, ScheduleStatus,
};

pub struct ScheduleManager {
    store: Arc<ScheduleStore>,
    resolver: TriggerResolver,
}

impl ScheduleManager {
    pub fn new(store: Arc<ScheduleStore>, resolver: TriggerResolver) -> Self {
        Self { store, resolver }
    }

    /// Validate and persist a new schedule.
    ///
    /// Single schedules require a strictly future fire time and take no
    /// trigger. Recurring schedules require exactly one trigger, validated
    /// eagerly, and start active with their first occurrence computed here.
    #[instrument(skip(self, new), fields(owner = %new.owner_id, kind = %new.kind))]
    pub async fn create(&self, new: NewSchedule) -> Result<Schedule> {
        let now = Utc::now();

        if new.name.trim().is_empty() {
            return Err(SchedulerError::Validation(
                "schedule name must not be empty".to_string(),
            ));
        }
        if !new.action_data.is_object() {
            return Err(SchedulerError::Validation(
                "action data must be a JSON object".to_string(),
            ));
        }
        if new.max_executions == Some(0) {
            return Err(SchedulerError::Validation(
                "max_executions must be at least 1".to_string(),
            ));
        }

        let (status, scheduled_for, next_execution_at) = match new.kind {
            ScheduleKind::Single => {
                if new.cron_expression.is_some() || new.calendar_id.is_some() {
                    return Err(SchedulerError::Validation(
                        "single schedules take a fire time, not a trigger".to_string(),
                    ));
                }
                let at = new.scheduled_for.ok_or_else(|| {
                    SchedulerError::Validation(
                        "scheduled_for is required for single schedules".to_string(),
                    )
                })?;
                if at <= now {
                    return Err(SchedulerError::Validation(
                        "scheduled_for must be in the future".to_string(),
                    ));
                }
                (ScheduleStatus::Pending, Some(at), None)
            }
            ScheduleKind::Recurring => {
                if new.scheduled_for.is_some() {
                    return Err(SchedulerError::Validation(
                        "recurring schedules take a trigger, not scheduled_for".to_string(),
                    ));
                }
                let trigger = match (&new.cron_expression, &new.calendar_id) {
                    (Some(expr), None) => Trigger::Cron(expr.clone()),
                    (None, Some(id)) => Trigger::Calendar(id.clone()),
                    _ => {
                        return Err(SchedulerError::Validation(
                            "recurring schedules require exactly one of cron_expression or \
                             calendar_id"
                                .to_string(),
                        ))
                    }
                };
                self.resolver.validate(&trigger)?;
                let next = self.resolver.next_occurrence(&trigger, now).await?;
                if next.is_none() {
                    warn!("trigger yields no future occurrence, schedule starts idle");
                }
                (ScheduleStatus::Active, None, next)
            }
        };

        let schedule = Schedule {
            id: ScheduleId::new(),
            owner_id: new.owner_id,
            kind: new.kind,
            name: new.name,
            action_type: new.action_type,
            action_data: new.action_data,
            status,
            scheduled_for,
            executed_at: None,
            result: None,
            cron_expression: new.cron_expression,
            calendar_id: new.calendar_id,
            next_execution_at,
            last_executed_at: None,
            execution_count: 0,
            max_executions: new.max_executions,
            end_date: new.end_date,
            generated_post_ids: Vec::new(),
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&schedule)?;
        info!(schedule_id = %schedule.id, status = %schedule.status, "schedule created");
        Ok(schedule)
    }

    /// Apply a partial update to a non-terminal schedule.
    ///
    /// Switching a recurring schedule's trigger clears the other trigger's
    /// column and recomputes the next occurrence from now.
    #[instrument(skip(self, patch), fields(schedule_id = %id, owner = %owner))]
    pub async fn update(
        &self,
        id: &ScheduleId,
        owner: &UserId,
        patch: SchedulePatch,
    ) -> Result<Schedule> {
        let mut schedule = self.store.get_owned(id, owner)?;
        if schedule.status.is_terminal() {
            return Err(SchedulerError::InvalidTransition {
                from: schedule.status,
                action: "update",
            });
        }
        let now = Utc::now();

        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(SchedulerError::Validation(
                    "schedule name must not be empty".to_string(),
                ));
            }
            schedule.name = name;
        }
        if let Some(data) = patch.action_data {
            if !data.is_object() {
                return Err(SchedulerError::Validation(
                    "action data must be a JSON object".to_string(),
                ));
            }
            schedule.action_data = data;
        }
        if let Some(max) = patch.max_executions {
            if max == Some(0) {
                return Err(SchedulerError::Validation(
                    "max_executions must be at least 1".to_string(),
                ));
            }
            schedule.max_executions = max;
        }
        if let Some(end) = patch.end_date {
            schedule.end_date = end;
        }

        match schedule.kind {
            ScheduleKind::Single => {
                if patch.cron_expression.is_some() || patch.calendar_id.is_some() {
                    return Err(SchedulerError::Validation(
                        "single schedules take a fire time, not a trigger".to_string(),
                    ));
                }
                if let Some(at) = patch.scheduled_for {
                    if at <= now {
                        return Err(SchedulerError::Validation(
                            "scheduled_for must be in the future".to_string(),
                        ));
                    }
                    schedule.scheduled_for = Some(at);
                }
            }
            ScheduleKind::Recurring => {
                if patch.scheduled_for.is_some() {
                    return Err(SchedulerError::Validation(
                        "recurring schedules take a trigger, not scheduled_for".to_string(),
                    ));
                }
                if patch.cron_expression.is_some() && patch.calendar_id.is_some() {
                    return Err(SchedulerError::Validation(
                        "cannot set both cron_expression and calendar_id".to_string(),
                    ));
                }
                let trigger_changed =
                    patch.cron_expression.is_some() || patch.calendar_id.is_some();
                if let Some(expr) = patch.cron_expression {
                    schedule.cron_expression = Some(expr);
                    schedule.calendar_id = None;
                }
                if let Some(calendar) = patch.calendar_id {
                    schedule.calendar_id = Some(calendar);
                    schedule.cron_expression = None;
                }
                if trigger_changed {
                    let trigger = self.trigger_for(&schedule)?;
                    self.resolver.validate(&trigger)?;
                    schedule.next_execution_at =
                        self.resolver.next_occurrence(&trigger, now).await?;
                }
            }
        }

        schedule.updated_at = now;
        self.store.update_definition(&schedule)?;
        info!("schedule updated");
        Ok(schedule)
    }

    /// Pause an active recurring schedule. The stale `next_execution_at` is
    /// kept but the due scan ignores paused rows.
    #[instrument(skip(self), fields(schedule_id = %id, owner = %owner))]
    pub fn pause(&self, id: &ScheduleId, owner: &UserId) -> Result<Schedule> {
        if !self.store.pause(id, owner, Utc::now())? {
            let current = self.store.get_owned(id, owner)?;
            return Err(SchedulerError::InvalidTransition {
                from: current.status,
                action: "pause",
            });
        }
        info!("schedule paused");
        self.store.get_owned(id, owner)
    }

    /// Resume a paused schedule, recomputing its next occurrence from now so
    /// missed slots are not replayed.
    ///
    /// A trigger that yields no further occurrence leaves the schedule active
    /// with no next occurrence; the expiry sweep or a later update resolves it.
    #[instrument(skip(self), fields(schedule_id = %id, owner = %owner))]
    pub async fn resume(&self, id: &ScheduleId, owner: &UserId) -> Result<Schedule> {
        let schedule = self.store.get_owned(id, owner)?;
        if schedule.status != ScheduleStatus::Paused {
            return Err(SchedulerError::InvalidTransition {
                from: schedule.status,
                action: "resume",
            });
        }
        let now = Utc::now();
        let trigger = self.trigger_for(&schedule)?;
        let next = self.resolver.next_occurrence(&trigger, now).await?;
        if next.is_none() {
            warn!("resumed schedule has no next occurrence");
        }
        if !self.store.resume(id, owner, next, now)? {
            let current = self.store.get_owned(id, owner)?;
            return Err(SchedulerError::InvalidTransition {
                from: current.status,
                action: "resume",
            });
        }
        info!(next = ?next, "schedule resumed");
        self.store.get_owned(id, owner)
    }

    /// Cancel a non-terminal schedule. Terminal states cannot be cancelled.
    #[instrument(skip(self), fields(schedule_id = %id, owner = %owner))]
    pub fn cancel(&self, id: &ScheduleId, owner: &UserId) -> Result<Schedule> {
        if !self.store.cancel(id, owner, Utc::now())? {
            let current = self.store.get_owned(id, owner)?;
            return Err(SchedulerError::InvalidTransition {
                from: current.status,
                action: "cancel",
            });
        }
        info!("schedule cancelled");
        self.store.get_owned(id, owner)
    }

    /// Permanently delete a schedule, regardless of status.
    #[instrument(skip(self), fields(schedule_id = %id, owner = %owner))]
    pub fn delete(&self, id: &ScheduleId, owner: &UserId) -> Result<()> {
        if !self.store.delete(id, owner)? {
            return Err(SchedulerError::NotFound { id: id.to_string() });
        }
        info!("schedule deleted");
        Ok(())
    }

    pub fn get(&self, id: &ScheduleId, owner: &UserId) -> Result<Schedule> {
        self.store.get_owned(id, owner)
    }

    pub fn list(&self, owner: &UserId, limit: usize) -> Result<Vec<Schedule>> {
        self.store.list_for_owner(owner, limit)
    }

    pub fn stats(&self, owner: &UserId) -> Result<ScheduleStats> {
        self.store.stats_for_owner(owner)
    }

    /// Record an execution result and advance the schedule's status.
    ///
    /// Single schedules finish on their first attempt: success completes,
    /// failure fails, either way terminal. Recurring schedules consume one
    /// occurrence per attempt: the count advances and the next occurrence is
    /// recomputed regardless of outcome, the schedule completes once its cap
    /// or end date is exhausted or the trigger runs dry, and an uncapped
    /// failure is terminal (no automatic retry).
    ///
    /// The status write is compare-and-swapped against the status observed at
    /// dispatch time; a concurrent user transition wins and the result is
    /// reported back as [`MarkOutcome::Superseded`].
    #[instrument(skip(self, outcome), fields(schedule_id = %id, success = outcome.success))]
    pub async fn mark_executed(
        &self,
        id: &ScheduleId,
        outcome: &ExecutionOutcome,
    ) -> Result<MarkOutcome> {
        let schedule = self
            .store
            .get(id)?
            .ok_or_else(|| SchedulerError::NotFound { id: id.to_string() })?;
        let now = Utc::now();

        let error = if outcome.success {
            None
        } else {
            outcome.error.as_deref().or(Some("execution failed"))
        };

        let applied = match schedule.kind {
            ScheduleKind::Single => {
                if schedule.status != ScheduleStatus::Pending {
                    return Ok(MarkOutcome::Superseded {
                        current: schedule.status,
                    });
                }
                let status = if outcome.success {
                    ScheduleStatus::Completed
                } else {
                    ScheduleStatus::Failed
                };
                let result = outcome
                    .data
                    .as_ref()
                    .map(serde_json::to_value)
                    .transpose()?;
                self.store
                    .finish_single(id, status, now, result.as_ref(), error)?
            }
            ScheduleKind::Recurring => {
                if schedule.status != ScheduleStatus::Active {
                    return Ok(MarkOutcome::Superseded {
                        current: schedule.status,
                    });
                }
                let count = schedule.execution_count + 1;
                let mut post_ids = schedule.generated_post_ids.clone();
                if let Some(post_id) = outcome.data.as_ref().and_then(|d| d.post_id.clone()) {
                    post_ids.push(post_id);
                }

                // The cap check uses the advanced count, so the run that hits
                // the cap is the one that completes the schedule, regardless
                // of how that run went.
                let exhausted = schedule.max_executions.is_some_and(|max| count >= max)
                    || schedule.end_date.is_some_and(|end| end < now);

                let (status, next) = if exhausted {
                    (ScheduleStatus::Completed, None)
                } else {
                    let trigger = self.trigger_for(&schedule)?;
                    let next = self.resolver.next_occurrence(&trigger, now).await?;
                    if !outcome.success {
                        (ScheduleStatus::Failed, next)
                    } else if next.is_none() {
                        (ScheduleStatus::Completed, None)
                    } else {
                        (ScheduleStatus::Active, next)
                    }
                };
                self.store
                    .finish_recurring(id, status, next, now, count, &post_ids, error)?
            }
        };

        if !applied {
            let current = self
                .store
                .get(id)?
                .ok_or_else(|| SchedulerError::NotFound { id: id.to_string() })?;
            warn!(current = %current.status, "execution result superseded by concurrent transition");
            return Ok(MarkOutcome::Superseded {
                current: current.status,
            });
        }

        let updated = self
            .store
            .get(id)?
            .ok_or_else(|| SchedulerError::NotFound { id: id.to_string() })?;
        info!(status = %updated.status, "execution recorded");
        Ok(MarkOutcome::Applied(updated))
    }

    fn trigger_for(&self, schedule: &Schedule) -> Result<Trigger> {
        Trigger::from_schedule(schedule).ok_or_else(|| SchedulerError::InvalidRecord {
            id: schedule.id.to_string(),
            reason: "recurring schedule has no trigger".to_string(),
        })
    }
}
