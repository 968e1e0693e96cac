// Repository pattern - isolates all notification table side effects
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, ErrorCode, OptionalExtension, Row};
use std::sync::Arc;
use thiserror::Error;

use super::domain::{Actor, NewNotification, Notification, NotificationId, UserId};
use super::target::TargetRef;
use crate::db;
use crate::state::DbPool;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Lock contention and pool exhaustion are expected to clear on their own.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Pool(_) => true,
            Self::Sql(rusqlite::Error::SqliteFailure(e, _)) => {
                matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            }
            _ => false,
        }
    }

    /// UNIQUE, CHECK or foreign key rejection
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::Sql(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation
        )
    }

    #[cfg(test)]
    pub(crate) fn busy(message: &str) -> Self {
        Self::Sql(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some(message.to_string()),
        ))
    }
}

/// A page of a recipient's notifications (`limit` rows after skipping `offset`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: i64,
    pub offset: i64,
}

/// Repository trait - raw storage operations, no retry
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Persist a notification and return it with the actor joined
    async fn insert(&self, new: &NewNotification) -> Result<Notification, StoreError>;

    async fn find(&self, id: NotificationId) -> Result<Option<Notification>, StoreError>;

    /// Newest first
    async fn list_for_recipient(
        &self,
        recipient: UserId,
        window: Option<PageWindow>,
    ) -> Result<Vec<Notification>, StoreError>;

    /// Clear the unread flag if `recipient` owns the row (returns true if it changed)
    async fn mark_read(&self, id: NotificationId, recipient: UserId) -> Result<bool, StoreError>;

    /// Delete the row if `recipient` owns it
    async fn delete(&self, id: NotificationId, recipient: UserId) -> Result<bool, StoreError>;

    async fn delete_by_target(&self, target: TargetRef) -> Result<u64, StoreError>;

    async fn count_unread(&self, recipient: UserId) -> Result<i64, StoreError>;

    async fn count_for_recipient(&self, recipient: UserId) -> Result<i64, StoreError>;
}

/// SQLite implementation
pub struct SqliteNotificationRepository {
    pool: DbPool,
}

impl SqliteNotificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_NOTIFICATION: &str =
    "SELECT n.id, n.actor_id, u.username, n.recipient_id, n.verb,
            n.target_kind, n.target_id, n.unread, n.timestamp
     FROM notifications n
     JOIN users u ON u.id = n.actor_id";

struct NotificationRow {
    id: i64,
    actor_id: i64,
    actor_username: String,
    recipient_id: i64,
    verb: String,
    target_kind: Option<String>,
    target_id: Option<i64>,
    unread: bool,
    timestamp: String,
}

impl NotificationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            actor_id: row.get(1)?,
            actor_username: row.get(2)?,
            recipient_id: row.get(3)?,
            verb: row.get(4)?,
            target_kind: row.get(5)?,
            target_id: row.get(6)?,
            unread: row.get(7)?,
            timestamp: row.get(8)?,
        })
    }

    fn into_notification(self) -> Result<Notification, StoreError> {
        let target = match (self.target_kind, self.target_id) {
            (Some(kind), Some(id)) => Some(TargetRef::parse(&kind, id).map_err(|e| {
                StoreError::Corrupt(format!("notification {}: {}", self.id, e))
            })?),
            (None, None) => None,
            _ => {
                return Err(StoreError::Corrupt(format!(
                    "notification {} has a partial target",
                    self.id
                )))
            }
        };

        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| {
                StoreError::Corrupt(format!(
                    "notification {} timestamp '{}': {}",
                    self.id, self.timestamp, e
                ))
            })?
            .with_timezone(&Utc);

        Ok(Notification {
            id: NotificationId(self.id),
            actor: Actor {
                id: UserId(self.actor_id),
                username: self.actor_username,
            },
            recipient: UserId(self.recipient_id),
            verb: self.verb,
            target,
            unread: self.unread,
            timestamp,
        })
    }
}

/// Fixed-width UTC text so lexical order equals chronological order
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl NotificationRepository for SqliteNotificationRepository {
    async fn insert(&self, new: &NewNotification) -> Result<Notification, StoreError> {
        let conn = self.pool.get()?;

        // A repeat of an already committed request_key inserts nothing and
        // reads back the first row
        db::immediate_transaction(&conn, |tx| {
            tx.execute(
                "INSERT INTO notifications
                    (actor_id, recipient_id, verb, target_kind, target_id, unread, timestamp, request_key)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)
                 ON CONFLICT(request_key) DO NOTHING",
                params![
                    new.actor.get(),
                    new.recipient.get(),
                    new.verb,
                    new.target.map(|t| t.kind.as_str()),
                    new.target.map(|t| t.id),
                    format_timestamp(&new.timestamp),
                    new.request_key,
                ],
            )?;

            let row = tx.query_row(
                &format!("{} WHERE n.request_key = ?1", SELECT_NOTIFICATION),
                params![new.request_key],
                NotificationRow::from_row,
            )?;
            row.into_notification()
        })
    }

    async fn find(&self, id: NotificationId) -> Result<Option<Notification>, StoreError> {
        let conn = self.pool.get()?;

        let row = conn
            .query_row(
                &format!("{} WHERE n.id = ?1", SELECT_NOTIFICATION),
                params![id.get()],
                NotificationRow::from_row,
            )
            .optional()?;

        row.map(NotificationRow::into_notification).transpose()
    }

    async fn list_for_recipient(
        &self,
        recipient: UserId,
        window: Option<PageWindow>,
    ) -> Result<Vec<Notification>, StoreError> {
        let conn = self.pool.get()?;

        // LIMIT -1 is unbounded in SQLite
        let window = window.unwrap_or(PageWindow {
            limit: -1,
            offset: 0,
        });

        let mut stmt = conn.prepare(&format!(
            "{} WHERE n.recipient_id = ?1
             ORDER BY n.timestamp DESC, n.id DESC
             LIMIT ?2 OFFSET ?3",
            SELECT_NOTIFICATION
        ))?;

        let rows = stmt
            .query_map(
                params![recipient.get(), window.limit, window.offset],
                NotificationRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(NotificationRow::into_notification)
            .collect()
    }

    async fn mark_read(&self, id: NotificationId, recipient: UserId) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;

        // unread only ever moves from 1 to 0
        let rows = conn.execute(
            "UPDATE notifications SET unread = 0
             WHERE id = ?1 AND recipient_id = ?2 AND unread = 1",
            params![id.get(), recipient.get()],
        )?;

        Ok(rows > 0)
    }

    async fn delete(&self, id: NotificationId, recipient: UserId) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;

        let rows = conn.execute(
            "DELETE FROM notifications WHERE id = ?1 AND recipient_id = ?2",
            params![id.get(), recipient.get()],
        )?;

        Ok(rows > 0)
    }

    async fn delete_by_target(&self, target: TargetRef) -> Result<u64, StoreError> {
        let conn = self.pool.get()?;

        let rows = conn.execute(
            "DELETE FROM notifications WHERE target_kind = ?1 AND target_id = ?2",
            params![target.kind.as_str(), target.id],
        )?;

        Ok(rows as u64)
    }

    async fn count_unread(&self, recipient: UserId) -> Result<i64, StoreError> {
        let conn = self.pool.get()?;

        let count = conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND unread = 1",
            params![recipient.get()],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    async fn count_for_recipient(&self, recipient: UserId) -> Result<i64, StoreError> {
        let conn = self.pool.get()?;

        let count = conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1",
            params![recipient.get()],
            |row| row.get(0),
        )?;

        Ok(count)
    }
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynNotificationRepository = Arc<dyn NotificationRepository>;
