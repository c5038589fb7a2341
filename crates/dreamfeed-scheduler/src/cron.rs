//! Five-field cron expressions: `minute hour day month weekday`.
//!
//! Field grammar: `*`, `N`, `N,M,...`, `N-M`, `*/S`, `N/S`. All times are UTC
//! and evaluation is at whole-minute resolution. Day-of-month and weekday are
//! combined with AND: `0 12 13 * 5` fires only on Friday the 13th at noon.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

use crate::error::{Result, SchedulerError};

/// Upper bound for the next-occurrence scan, just over four years of minutes.
/// Expressions with no occurrence inside the horizon yield `None`.
const MAX_SCAN_MINUTES: u32 = 4 * 365 * 24 * 60;

/// A parsed cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    minute: CronField,
    hour: CronField,
    day: CronField,
    month: CronField,
    weekday: CronField,
}

impl CronExpression {
    /// Parse a five-field expression, validating every field range eagerly.
    pub fn parse(expr: &str) -> Result<Self> {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(SchedulerError::InvalidTrigger(format!(
                "expected 5 cron fields, got {} in {:?}",
                parts.len(),
                expr
            )));
        }

        Ok(Self {
            minute: CronField::parse(parts[0], 0, 59)?,
            hour: CronField::parse(parts[1], 0, 23)?,
            day: CronField::parse(parts[2], 1, 31)?,
            month: CronField::parse(parts[3], 1, 12)?,
            // 0 = Sunday, standard cron numbering.
            weekday: CronField::parse(parts[4], 0, 6)?,
        })
    }

    /// Whether `dt` (truncated to its minute) matches this expression.
    pub fn matches(&self, dt: &DateTime<Utc>) -> bool {
        self.minute.matches(dt.minute())
            && self.hour.matches(dt.hour())
            && self.day.matches(dt.day())
            && self.month.matches(dt.month())
            && self.weekday.matches(dt.weekday().num_days_from_sunday())
    }

    /// The first matching minute strictly after `after`, or `None` when no
    /// occurrence exists within the scan horizon.
    ///
    /// Deterministic: the same expression and `after` always yield the same
    /// instant, regardless of when the computation runs.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut candidate = truncate_to_minute(after) + Duration::minutes(1);
        for _ in 0..MAX_SCAN_MINUTES {
            if self.matches(&candidate) {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }
        None
    }
}

fn truncate_to_minute(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

/// One field of a cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CronField {
    Any,
    Single(u32),
    List(Vec<u32>),
    Range(u32, u32),
    /// Start value and step: `*/15` is `Step(min, 15)`, `3/5` is `Step(3, 5)`.
    Step(u32, u32),
}

impl CronField {
    fn parse(s: &str, min: u32, max: u32) -> Result<Self> {
        if s == "*" {
            return Ok(CronField::Any);
        }

        if s.contains(',') {
            let values = s
                .split(',')
                .map(|v| parse_value(v.trim(), min, max))
                .collect::<Result<Vec<u32>>>()?;
            return Ok(CronField::List(values));
        }

        if let Some((start, step)) = s.split_once('/') {
            let start = if start == "*" {
                min
            } else {
                parse_value(start, min, max)?
            };
            let step: u32 = step.parse().map_err(|_| invalid_field(s))?;
            if step == 0 {
                return Err(SchedulerError::InvalidTrigger(format!(
                    "step must be at least 1 in {:?}",
                    s
                )));
            }
            return Ok(CronField::Step(start, step));
        }

        if let Some((start, end)) = s.split_once('-') {
            let start = parse_value(start, min, max)?;
            let end = parse_value(end, min, max)?;
            if start > end {
                return Err(SchedulerError::InvalidTrigger(format!(
                    "descending range {:?}",
                    s
                )));
            }
            return Ok(CronField::Range(start, end));
        }

        Ok(CronField::Single(parse_value(s, min, max)?))
    }

    fn matches(&self, value: u32) -> bool {
        match self {
            CronField::Any => true,
            CronField::Single(v) => *v == value,
            CronField::List(values) => values.contains(&value),
            CronField::Range(start, end) => value >= *start && value <= *end,
            CronField::Step(start, step) => value >= *start && (value - start) % step == 0,
        }
    }
}

fn parse_value(s: &str, min: u32, max: u32) -> Result<u32> {
    let value: u32 = s.parse().map_err(|_| invalid_field(s))?;
    if value < min || value > max {
        return Err(SchedulerError::InvalidTrigger(format!(
            "{} not in range {}-{}",
            value, min, max
        )));
    }
    Ok(value)
}

fn invalid_field(s: &str) -> SchedulerError {
    SchedulerError::InvalidTrigger(format!("invalid cron field {:?}", s))
}
