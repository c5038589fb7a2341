//! Due-schedule dispatch loop.
//!
//! One tick sweeps exhausted recurring schedules, then scans due single and
//! due recurring schedules and executes each. The scans run concurrently with
//! each other but schedules within a scan execute strictly sequentially, so
//! two runs never race on the points ledger or create duplicate posts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use dreamfeed_core::{ScheduleId, UserId};

use crate::manager::ScheduleManager;
use crate::store::ScheduleStore;
use crate::types::{ActionType, ExecutionOutcome, MarkOutcome, Schedule};

/// One unit of work handed to the executor.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Set when the request originates from a stored schedule; `None` for
    /// one-off test runs.
    pub schedule_id: Option<ScheduleId>,
    pub owner_id: UserId,
    pub action_type: ActionType,
    pub action_data: Value,
}

impl ExecutionRequest {
    pub fn for_schedule(schedule: &Schedule) -> Self {
        Self {
            schedule_id: Some(schedule.id.clone()),
            owner_id: schedule.owner_id.clone(),
            action_type: schedule.action_type,
            action_data: schedule.action_data.clone(),
        }
    }
}

/// Executes scheduled actions.
///
/// Implementations never return an error: every failure is folded into an
/// outcome with `success = false`, so the lifecycle transition in
/// [`ScheduleManager::mark_executed`] always happens.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome;
}

/// Periodic scan-and-execute loop over due schedules.
pub struct Dispatcher {
    store: Arc<ScheduleStore>,
    manager: Arc<ScheduleManager>,
    executor: Arc<dyn ActionExecutor>,
    tick_interval: Duration,
}

impl Dispatcher {
    pub fn new(
        store: Arc<ScheduleStore>,
        manager: Arc<ScheduleManager>,
        executor: Arc<dyn ActionExecutor>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            store,
            manager,
            executor,
            tick_interval,
        }
    }

    /// Main loop. Ticks until `shutdown` broadcasts `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(tick_secs = self.tick_interval.as_secs(), "dispatcher started");
        let mut interval = tokio::time::interval(self.tick_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("dispatcher shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One dispatch cycle. Public so embedders and tests can drive the loop
    /// without waiting out the tick interval.
    pub async fn tick(&self) {
        let now = Utc::now();

        match self.store.complete_expired_recurring(now) {
            Ok(0) => {}
            Ok(n) => info!(count = n, "exhausted recurring schedules completed"),
            Err(e) => error!("expiry sweep failed: {e}"),
        }

        tokio::join!(self.scan_single(now), self.scan_recurring(now));
    }

    /// Execute one action immediately, bypassing the schedule store. Used for
    /// interactive previews of what a schedule would produce.
    pub async fn run_now(
        &self,
        owner: &UserId,
        action_type: ActionType,
        action_data: Value,
    ) -> ExecutionOutcome {
        let request = ExecutionRequest {
            schedule_id: None,
            owner_id: owner.clone(),
            action_type,
            action_data,
        };
        self.executor.execute(&request).await
    }

    async fn scan_single(&self, now: DateTime<Utc>) {
        let due = match self.store.due_single(now) {
            Ok(due) => due,
            Err(e) => {
                error!("single-schedule scan failed: {e}");
                return;
            }
        };
        if !due.is_empty() {
            debug!(count = due.len(), "due single schedules");
        }
        for schedule in due {
            self.execute_one(&schedule).await;
        }
    }

    async fn scan_recurring(&self, now: DateTime<Utc>) {
        let due = match self.store.due_recurring(now) {
            Ok(due) => due,
            Err(e) => {
                error!("recurring-schedule scan failed: {e}");
                return;
            }
        };
        if !due.is_empty() {
            debug!(count = due.len(), "due recurring schedules");
        }
        for schedule in due {
            self.execute_one(&schedule).await;
        }
    }

    async fn execute_one(&self, schedule: &Schedule) {
        debug!(
            schedule_id = %schedule.id,
            action = %schedule.action_type,
            "executing schedule"
        );
        let request = ExecutionRequest::for_schedule(schedule);
        let outcome = self.executor.execute(&request).await;

        match self.manager.mark_executed(&schedule.id, &outcome).await {
            Ok(MarkOutcome::Applied(updated)) => {
                debug!(schedule_id = %schedule.id, status = %updated.status, "schedule advanced");
            }
            Ok(MarkOutcome::Superseded { current }) => {
                warn!(
                    schedule_id = %schedule.id,
                    %current,
                    "execution result dropped, schedule transitioned concurrently"
                );
            }
            Err(e) => {
                error!(schedule_id = %schedule.id, "recording execution result failed: {e}");
            }
        }
    }
}
