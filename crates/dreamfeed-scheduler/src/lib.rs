//! `dreamfeed-scheduler` — schedule lifecycle and dispatch for unattended
//! content generation, with SQLite persistence.
//!
//! # Overview
//!
//! Schedules are persisted to a SQLite `schedules` table. The
//! [`dispatch::Dispatcher`] scans the table once per tick and hands each due
//! schedule to an [`dispatch::ActionExecutor`]; the resulting outcome flows
//! back through [`manager::ScheduleManager::mark_executed`], which advances
//! the schedule's status and, for recurring schedules, computes the next
//! occurrence.
//!
//! # Schedule kinds
//!
//! | Kind        | Trigger                         | Lifecycle                     |
//! |-------------|---------------------------------|-------------------------------|
//! | `Single`    | absolute UTC fire time          | pending, then terminal        |
//! | `Recurring` | cron expression or calendar id  | active until exhausted/failed |

pub mod cron;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod manager;
pub mod store;
pub mod trigger;
pub mod types;

pub use cron::CronExpression;
pub use dispatch::{ActionExecutor, Dispatcher, ExecutionRequest};
pub use error::{Result, SchedulerError};
pub use manager::ScheduleManager;
pub use store::ScheduleStore;
pub use trigger::{CalendarError, CalendarLookup, CalendarSlot, NoCalendar, Trigger, TriggerResolver};
pub use types::{
    ActionType, ExecutionData, ExecutionOutcome, MarkOutcome, NewSchedule, PublishSummary,
    Schedule, ScheduleKind, SchedulePatch, ScheduleStats, ScheduleStatus,
};
