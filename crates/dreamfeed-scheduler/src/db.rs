use rusqlite::Connection;

use crate::error::Result;

/// Initialise the scheduler schema in `conn`.
///
/// Creates the `schedules` table (idempotent) plus the indexes backing the
/// two due-scan queries and the owner listing.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schedules (
            id                 TEXT    NOT NULL PRIMARY KEY,
            owner_id           TEXT    NOT NULL,
            kind               TEXT    NOT NULL,
            name               TEXT    NOT NULL,
            action_type        TEXT    NOT NULL,
            action_data        TEXT    NOT NULL,   -- opaque JSON payload
            status             TEXT    NOT NULL,
            scheduled_for      TEXT,               -- single: RFC3339 fire time
            executed_at        TEXT,               -- single: RFC3339 finish time
            result             TEXT,               -- single: JSON execution data
            cron_expression    TEXT,               -- recurring: cron trigger
            calendar_id        TEXT,               -- recurring: calendar trigger
            next_execution_at  TEXT,               -- recurring: RFC3339 or NULL
            last_executed_at   TEXT,
            execution_count    INTEGER NOT NULL DEFAULT 0,
            max_executions     INTEGER,            -- NULL means unlimited
            end_date           TEXT,               -- recurring: RFC3339 horizon
            generated_post_ids TEXT    NOT NULL DEFAULT '[]',  -- JSON array of post IDs
            last_error         TEXT,
            created_at         TEXT    NOT NULL,
            updated_at         TEXT    NOT NULL
        ) STRICT;

        -- Due scans: status equality plus a time comparison.
        CREATE INDEX IF NOT EXISTS idx_schedules_due_single
            ON schedules (status, scheduled_for);
        CREATE INDEX IF NOT EXISTS idx_schedules_due_recurring
            ON schedules (status, next_execution_at);
        CREATE INDEX IF NOT EXISTS idx_schedules_owner
            ON schedules (owner_id, created_at);
        ",
    )?;
    Ok(())
}
