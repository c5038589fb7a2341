//! Persistence for completed publishes.

use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Connection;
use uuid::Uuid;

use dreamfeed_core::{Platform, PostId, UserId};

use crate::db::init_db;
use crate::error::Result;

/// One platform's delivery of one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRecord {
    pub id: String,
    pub post_id: PostId,
    pub owner_id: UserId,
    pub platform: Platform,
    pub connection_id: Option<String>,
    pub remote_post_id: String,
    pub published_at: DateTime<Utc>,
}

pub struct PublishRecordStore {
    db: Mutex<Connection>,
}

impl PublishRecordStore {
    /// Wrap a connection, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Record one successful delivery per platform.
    pub fn record(
        &self,
        post_id: &PostId,
        owner_id: &UserId,
        platforms: &[Platform],
        connection_ids: &[String],
        remote_post_id: &str,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        for (i, platform) in platforms.iter().enumerate() {
            db.execute(
                "INSERT INTO publish_records
                 (id, post_id, owner_id, platform, connection_id, remote_post_id, published_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    Uuid::new_v4().to_string(),
                    post_id.as_str(),
                    owner_id.as_str(),
                    platform.as_str(),
                    connection_ids.get(i),
                    remote_post_id,
                    now,
                ],
            )?;
        }
        Ok(())
    }

    /// All deliveries of one post, oldest first.
    pub fn list_for_post(&self, post_id: &PostId) -> Result<Vec<PublishRecord>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, post_id, owner_id, platform, connection_id, remote_post_id, published_at
             FROM publish_records
             WHERE post_id = ?1
             ORDER BY published_at",
        )?;
        let rows = stmt.query_map(rusqlite::params![post_id.as_str()], |row| {
            let platform: String = row.get(3)?;
            let published_at: String = row.get(6)?;
            Ok(PublishRecord {
                id: row.get(0)?,
                post_id: PostId(row.get(1)?),
                owner_id: UserId(row.get(2)?),
                platform: Platform::from_str(&platform).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into())
                })?,
                connection_id: row.get(4)?,
                remote_post_id: row.get(5)?,
                published_at: DateTime::parse_from_rfc3339(&published_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e))
                    })?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}
