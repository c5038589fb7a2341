use rusqlite::Connection;

use crate::error::Result;

/// Initialise the publish-record schema in `conn`. Idempotent.
///
/// One row per (post, platform) delivery; a post published to three platforms
/// gets three rows sharing the provider's remote post id.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS publish_records (
            id             TEXT NOT NULL PRIMARY KEY,
            post_id        TEXT NOT NULL,
            owner_id       TEXT NOT NULL,
            platform       TEXT NOT NULL,
            connection_id  TEXT,               -- provider account used, when known
            remote_post_id TEXT NOT NULL,      -- provider-side post id
            published_at   TEXT NOT NULL       -- RFC3339
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_publish_records_post
            ON publish_records (post_id, published_at);
        ",
    )?;
    Ok(())
}
