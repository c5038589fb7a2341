//! SQLite-backed schedule persistence.
//!
//! Status transitions that race with execution use compare-and-swap updates:
//! the `WHERE` clause pins the expected current status and the caller learns
//! from the row count whether the write applied.

use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Connection;
use serde_json::Value;
use tracing::warn;

use dreamfeed_core::{PostId, ScheduleId, UserId};

use crate::db::init_db;
use crate::error::{Result, SchedulerError};
use crate::types::{Schedule, ScheduleStats, ScheduleStatus};

/// Column list shared by every SELECT; order must match `row_to_schedule`.
const COLUMNS: &str = "id, owner_id, kind, name, action_type, action_data, status, \
     scheduled_for, executed_at, result, cron_expression, calendar_id, \
     next_execution_at, last_executed_at, execution_count, max_executions, \
     end_date, generated_post_ids, last_error, created_at, updated_at";

/// Thread-safe schedule store over a single SQLite connection.
///
/// A `Mutex<Connection>` is sufficient for the single-node target; swap in a
/// pool if scan volume ever warrants it.
pub struct ScheduleStore {
    db: Mutex<Connection>,
}

impl ScheduleStore {
    /// Wrap a connection, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Insert a fully-populated schedule row.
    pub fn insert(&self, schedule: &Schedule) -> Result<()> {
        let action_json = serde_json::to_string(&schedule.action_data)?;
        let result_json = schedule
            .result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let post_ids_json = serde_json::to_string(&schedule.generated_post_ids)?;

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO schedules
             (id, owner_id, kind, name, action_type, action_data, status,
              scheduled_for, executed_at, result, cron_expression, calendar_id,
              next_execution_at, last_executed_at, execution_count, max_executions,
              end_date, generated_post_ids, last_error, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21)",
            rusqlite::params![
                schedule.id.as_str(),
                schedule.owner_id.as_str(),
                schedule.kind.as_str(),
                schedule.name,
                schedule.action_type.as_str(),
                action_json,
                schedule.status.as_str(),
                schedule.scheduled_for.map(|d| d.to_rfc3339()),
                schedule.executed_at.map(|d| d.to_rfc3339()),
                result_json,
                schedule.cron_expression,
                schedule.calendar_id,
                schedule.next_execution_at.map(|d| d.to_rfc3339()),
                schedule.last_executed_at.map(|d| d.to_rfc3339()),
                schedule.execution_count,
                schedule.max_executions,
                schedule.end_date.map(|d| d.to_rfc3339()),
                post_ids_json,
                schedule.last_error,
                schedule.created_at.to_rfc3339(),
                schedule.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Retrieve a schedule by ID, returning `None` if it does not exist.
    pub fn get(&self, id: &ScheduleId) -> Result<Option<Schedule>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            &format!("SELECT {COLUMNS} FROM schedules WHERE id = ?1"),
            rusqlite::params![id.as_str()],
            row_to_schedule,
        ) {
            Ok(s) => Ok(Some(s)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(SchedulerError::Database(e)),
        }
    }

    /// Retrieve a schedule by ID, enforcing ownership. A row that exists but
    /// belongs to another owner reads as not found.
    pub fn get_owned(&self, id: &ScheduleId, owner: &UserId) -> Result<Schedule> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            &format!("SELECT {COLUMNS} FROM schedules WHERE id = ?1 AND owner_id = ?2"),
            rusqlite::params![id.as_str(), owner.as_str()],
            row_to_schedule,
        ) {
            Ok(s) => Ok(s),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(SchedulerError::NotFound {
                id: id.to_string(),
            }),
            Err(e) => Err(SchedulerError::Database(e)),
        }
    }

    /// List an owner's schedules, newest first.
    pub fn list_for_owner(&self, owner: &UserId, limit: usize) -> Result<Vec<Schedule>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&format!(
            "SELECT {COLUMNS} FROM schedules
             WHERE owner_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(
            rusqlite::params![owner.as_str(), limit as i64],
            row_to_schedule,
        )?;
        Ok(collect_decoded(rows))
    }

    /// Single schedules whose fire time has arrived.
    pub fn due_single(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare_cached(&format!(
            "SELECT {COLUMNS} FROM schedules
             WHERE status = 'pending'
               AND scheduled_for IS NOT NULL AND scheduled_for <= ?1
             ORDER BY scheduled_for"
        ))?;
        let rows = stmt.query_map(rusqlite::params![now.to_rfc3339()], row_to_schedule)?;
        Ok(collect_decoded(rows))
    }

    /// Recurring schedules whose next occurrence has arrived and whose
    /// recurrence limits are not yet exhausted.
    pub fn due_recurring(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare_cached(&format!(
            "SELECT {COLUMNS} FROM schedules
             WHERE status = 'active'
               AND next_execution_at IS NOT NULL AND next_execution_at <= ?1
               AND (end_date IS NULL OR end_date >= ?1)
               AND (max_executions IS NULL OR execution_count < max_executions)
             ORDER BY next_execution_at"
        ))?;
        let rows = stmt.query_map(rusqlite::params![now.to_rfc3339()], row_to_schedule)?;
        Ok(collect_decoded(rows))
    }

    /// Complete recurring schedules that can never run again: end date passed
    /// or execution cap already met. Returns the number of rows updated.
    pub fn complete_expired_recurring(&self, now: DateTime<Utc>) -> Result<usize> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE schedules
             SET status = 'completed', next_execution_at = NULL, updated_at = ?1
             WHERE status = 'active'
               AND ((end_date IS NOT NULL AND end_date < ?1)
                    OR (max_executions IS NOT NULL AND execution_count >= max_executions))",
            rusqlite::params![now.to_rfc3339()],
        )?;
        Ok(n)
    }

    /// Persist the mutable definition fields of `schedule`: name, payload,
    /// trigger columns, caps and the recomputed next occurrence. Status and
    /// execution counters are untouched.
    pub fn update_definition(&self, schedule: &Schedule) -> Result<()> {
        let action_json = serde_json::to_string(&schedule.action_data)?;
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE schedules
             SET name = ?1, action_data = ?2, scheduled_for = ?3,
                 cron_expression = ?4, calendar_id = ?5, next_execution_at = ?6,
                 max_executions = ?7, end_date = ?8, updated_at = ?9
             WHERE id = ?10 AND owner_id = ?11",
            rusqlite::params![
                schedule.name,
                action_json,
                schedule.scheduled_for.map(|d| d.to_rfc3339()),
                schedule.cron_expression,
                schedule.calendar_id,
                schedule.next_execution_at.map(|d| d.to_rfc3339()),
                schedule.max_executions,
                schedule.end_date.map(|d| d.to_rfc3339()),
                schedule.updated_at.to_rfc3339(),
                schedule.id.as_str(),
                schedule.owner_id.as_str(),
            ],
        )?;
        if n == 0 {
            return Err(SchedulerError::NotFound {
                id: schedule.id.to_string(),
            });
        }
        Ok(())
    }

    /// CAS pause: applies only while the schedule is still active.
    /// Returns false when the row was not in that status (or wrong owner).
    pub fn pause(&self, id: &ScheduleId, owner: &UserId, now: DateTime<Utc>) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE schedules SET status = 'paused', updated_at = ?1
             WHERE id = ?2 AND owner_id = ?3 AND status = 'active'",
            rusqlite::params![now.to_rfc3339(), id.as_str(), owner.as_str()],
        )?;
        Ok(n > 0)
    }

    /// CAS resume: applies only while paused. Stores the freshly recomputed
    /// next occurrence (which may be `None`).
    pub fn resume(
        &self,
        id: &ScheduleId,
        owner: &UserId,
        next_execution_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE schedules SET status = 'active', next_execution_at = ?1, updated_at = ?2
             WHERE id = ?3 AND owner_id = ?4 AND status = 'paused'",
            rusqlite::params![
                next_execution_at.map(|d| d.to_rfc3339()),
                now.to_rfc3339(),
                id.as_str(),
                owner.as_str()
            ],
        )?;
        Ok(n > 0)
    }

    /// CAS cancel: applies from any non-terminal status.
    pub fn cancel(&self, id: &ScheduleId, owner: &UserId, now: DateTime<Utc>) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE schedules SET status = 'cancelled', updated_at = ?1
             WHERE id = ?2 AND owner_id = ?3
               AND status IN ('pending', 'active', 'paused')",
            rusqlite::params![now.to_rfc3339(), id.as_str(), owner.as_str()],
        )?;
        Ok(n > 0)
    }

    /// Permanently delete a schedule row. Returns false when nothing matched.
    pub fn delete(&self, id: &ScheduleId, owner: &UserId) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "DELETE FROM schedules WHERE id = ?1 AND owner_id = ?2",
            rusqlite::params![id.as_str(), owner.as_str()],
        )?;
        Ok(n > 0)
    }

    /// CAS finish for a single schedule: applies only while still pending, so
    /// a concurrent cancel wins and the outcome is dropped.
    pub fn finish_single(
        &self,
        id: &ScheduleId,
        status: ScheduleStatus,
        executed_at: DateTime<Utc>,
        result: Option<&Value>,
        error: Option<&str>,
    ) -> Result<bool> {
        let result_json = result.map(serde_json::to_string).transpose()?;
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE schedules
             SET status = ?1, executed_at = ?2, result = ?3, last_error = ?4, updated_at = ?2
             WHERE id = ?5 AND status = 'pending'",
            rusqlite::params![
                status.as_str(),
                executed_at.to_rfc3339(),
                result_json,
                error,
                id.as_str()
            ],
        )?;
        Ok(n > 0)
    }

    /// CAS finish for a recurring schedule: applies only while still active.
    #[allow(clippy::too_many_arguments)]
    pub fn finish_recurring(
        &self,
        id: &ScheduleId,
        status: ScheduleStatus,
        next_execution_at: Option<DateTime<Utc>>,
        last_executed_at: DateTime<Utc>,
        execution_count: u32,
        generated_post_ids: &[PostId],
        error: Option<&str>,
    ) -> Result<bool> {
        let post_ids_json = serde_json::to_string(generated_post_ids)?;
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE schedules
             SET status = ?1, next_execution_at = ?2, last_executed_at = ?3,
                 execution_count = ?4, generated_post_ids = ?5, last_error = ?6,
                 updated_at = ?3
             WHERE id = ?7 AND status = 'active'",
            rusqlite::params![
                status.as_str(),
                next_execution_at.map(|d| d.to_rfc3339()),
                last_executed_at.to_rfc3339(),
                execution_count,
                post_ids_json,
                error,
                id.as_str()
            ],
        )?;
        Ok(n > 0)
    }

    /// Per-status schedule counts for one owner.
    pub fn stats_for_owner(&self, owner: &UserId) -> Result<ScheduleStats> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT status, COUNT(*) FROM schedules WHERE owner_id = ?1 GROUP BY status",
        )?;
        let rows = stmt.query_map(rusqlite::params![owner.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut stats = ScheduleStats::default();
        for row in rows {
            let (status, count) = row?;
            let count = count as u32;
            stats.total += count;
            match status.as_str() {
                "pending" => stats.pending = count,
                "active" => stats.active = count,
                "paused" => stats.paused = count,
                "completed" => stats.completed = count,
                "failed" => stats.failed = count,
                "cancelled" => stats.cancelled = count,
                _ => {}
            }
        }
        Ok(stats)
    }
}

/// Drain a mapped-row iterator, keeping decodable schedules. A row that no
/// longer parses (hand-edited status, truncated timestamp) is logged and
/// skipped so one bad row cannot stall every scan.
fn collect_decoded<I>(rows: I) -> Vec<Schedule>
where
    I: Iterator<Item = rusqlite::Result<Schedule>>,
{
    rows.filter_map(|row| match row {
        Ok(schedule) => Some(schedule),
        Err(e) => {
            warn!(error = %e, "skipping undecodable schedule row");
            None
        }
    })
    .collect()
}

/// Map a SQLite row to a `Schedule`. Column order matches [`COLUMNS`].
fn row_to_schedule(row: &rusqlite::Row<'_>) -> rusqlite::Result<Schedule> {
    let post_ids_json: String = row.get(17)?;
    let generated_post_ids: Vec<PostId> = serde_json::from_str(&post_ids_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(17, Type::Text, Box::new(e)))?;

    Ok(Schedule {
        id: ScheduleId(row.get(0)?),
        owner_id: UserId(row.get(1)?),
        kind: parse_enum(2, row.get(2)?)?,
        name: row.get(3)?,
        action_type: parse_enum(4, row.get(4)?)?,
        action_data: parse_json(5, row.get(5)?)?,
        status: parse_enum(6, row.get(6)?)?,
        scheduled_for: parse_opt_ts(7, row.get(7)?)?,
        executed_at: parse_opt_ts(8, row.get(8)?)?,
        result: row
            .get::<_, Option<String>>(9)?
            .map(|s| parse_json(9, s))
            .transpose()?,
        cron_expression: row.get(10)?,
        calendar_id: row.get(11)?,
        next_execution_at: parse_opt_ts(12, row.get(12)?)?,
        last_executed_at: parse_opt_ts(13, row.get(13)?)?,
        execution_count: row.get::<_, i64>(14)? as u32,
        max_executions: row.get::<_, Option<i64>>(15)?.map(|v| v as u32),
        end_date: parse_opt_ts(16, row.get(16)?)?,
        generated_post_ids,
        last_error: row.get(18)?,
        created_at: parse_ts(19, row.get(19)?)?,
        updated_at: parse_ts(20, row.get(20)?)?,
    })
}

fn parse_ts(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_opt_ts(idx: usize, value: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_ts(idx, v)).transpose()
}

fn parse_json(idx: usize, value: String) -> rusqlite::Result<Value> {
    serde_json::from_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_enum<T>(idx: usize, value: String) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}
