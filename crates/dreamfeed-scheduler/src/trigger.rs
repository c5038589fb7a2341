//! Recurrence triggers and the collaborator seam for calendar availability.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::cron::CronExpression;
use crate::error::{Result, SchedulerError};
use crate::types::Schedule;

/// When a recurring schedule fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Five-field cron expression evaluated in UTC.
    Cron(String),
    /// Next free slot from an external calendar.
    Calendar(String),
}

impl Trigger {
    /// Derive the trigger from a schedule's mutually-exclusive columns.
    /// `None` for single schedules (and corrupt recurring rows).
    pub fn from_schedule(schedule: &Schedule) -> Option<Self> {
        match (&schedule.cron_expression, &schedule.calendar_id) {
            (Some(expr), _) => Some(Trigger::Cron(expr.clone())),
            (None, Some(id)) => Some(Trigger::Calendar(id.clone())),
            (None, None) => None,
        }
    }
}

/// A bookable slot reported by the calendar collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarSlot {
    pub starts_at: DateTime<Utc>,
}

/// Error surfaced by a [`CalendarLookup`] implementation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CalendarError(pub String);

/// External calendar availability, implemented by the embedding application.
#[async_trait]
pub trait CalendarLookup: Send + Sync {
    /// Next bookable slot strictly after `after`, or `None` when the calendar
    /// has no remaining availability.
    async fn next_available_slot(
        &self,
        calendar_id: &str,
        after: DateTime<Utc>,
    ) -> std::result::Result<Option<CalendarSlot>, CalendarError>;
}

/// `CalendarLookup` for deployments without a calendar integration: every
/// lookup reports no availability.
pub struct NoCalendar;

#[async_trait]
impl CalendarLookup for NoCalendar {
    async fn next_available_slot(
        &self,
        _calendar_id: &str,
        _after: DateTime<Utc>,
    ) -> std::result::Result<Option<CalendarSlot>, CalendarError> {
        Ok(None)
    }
}

/// Computes occurrence times for recurring schedules.
#[derive(Clone)]
pub struct TriggerResolver {
    calendar: Arc<dyn CalendarLookup>,
}

impl TriggerResolver {
    pub fn new(calendar: Arc<dyn CalendarLookup>) -> Self {
        Self { calendar }
    }

    /// Validate a trigger definition at schedule-creation time.
    ///
    /// Cron expressions are parsed eagerly so a bad expression is rejected
    /// before the schedule is stored, not when it first comes due.
    pub fn validate(&self, trigger: &Trigger) -> Result<()> {
        match trigger {
            Trigger::Cron(expr) => CronExpression::parse(expr).map(|_| ()),
            Trigger::Calendar(id) => {
                if id.trim().is_empty() {
                    return Err(SchedulerError::InvalidTrigger(
                        "calendar id must not be empty".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Next occurrence strictly after `after`, or `None` when the trigger
    /// yields no further occurrence.
    pub async fn next_occurrence(
        &self,
        trigger: &Trigger,
        after: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        match trigger {
            Trigger::Cron(expr) => {
                let cron = CronExpression::parse(expr)?;
                Ok(cron.next_after(after))
            }
            Trigger::Calendar(id) => {
                let slot = self
                    .calendar
                    .next_available_slot(id, after)
                    .await
                    .map_err(|e| SchedulerError::Calendar(e.to_string()))?;
                Ok(slot.map(|s| s.starts_at))
            }
        }
    }
}
