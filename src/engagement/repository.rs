// Repository pattern - like membership for posts and images
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

use crate::db;
use crate::notify::{StoreError, TargetKind, TargetRef, UserId};
use crate::state::DbPool;

/// Anything a user can like, resolved to its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Likeable {
    pub target: TargetRef,
    pub owner: UserId,
}

#[async_trait]
pub trait LikeRepository: Send + Sync {
    /// Look up the content behind `target` and its owner
    async fn find_likeable(&self, target: TargetRef) -> Result<Option<Likeable>, StoreError>;

    /// Atomically flip `user`'s like on `target`. Returns true if it is now liked.
    async fn toggle(&self, target: TargetRef, user: UserId) -> Result<bool, StoreError>;

    async fn is_liked(&self, target: TargetRef, user: UserId) -> Result<bool, StoreError>;

    async fn count(&self, target: TargetRef) -> Result<i64, StoreError>;
}

/// SQLite implementation
pub struct SqliteLikeRepository {
    pool: DbPool,
}

impl SqliteLikeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// (table, entity column) holding the membership rows for a kind
fn membership_table(kind: TargetKind) -> (&'static str, &'static str) {
    match kind {
        TargetKind::Post => ("post_likes", "post_id"),
        TargetKind::Image => ("image_likes", "image_id"),
    }
}

#[async_trait]
impl LikeRepository for SqliteLikeRepository {
    async fn find_likeable(&self, target: TargetRef) -> Result<Option<Likeable>, StoreError> {
        let conn = self.pool.get()?;

        // Images are owned by whoever owns the post they belong to
        let sql = match target.kind {
            TargetKind::Post => "SELECT user_id FROM posts WHERE id = ?1",
            TargetKind::Image => {
                "SELECT p.user_id FROM images i JOIN posts p ON p.id = i.post_id WHERE i.id = ?1"
            }
        };

        let owner: Option<i64> = conn
            .query_row(sql, params![target.id], |row| row.get(0))
            .optional()?;

        Ok(owner.map(|owner| Likeable {
            target,
            owner: UserId(owner),
        }))
    }

    async fn toggle(&self, target: TargetRef, user: UserId) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let (table, column) = membership_table(target.kind);

        db::immediate_transaction(&conn, |tx| {
            let removed = tx.execute(
                &format!("DELETE FROM {table} WHERE {column} = ?1 AND user_id = ?2"),
                params![target.id, user.get()],
            )?;
            if removed > 0 {
                return Ok(false);
            }

            tx.execute(
                &format!("INSERT OR IGNORE INTO {table} ({column}, user_id) VALUES (?1, ?2)"),
                params![target.id, user.get()],
            )?;
            Ok(true)
        })
    }

    async fn is_liked(&self, target: TargetRef, user: UserId) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let (table, column) = membership_table(target.kind);

        let liked = conn.query_row(
            &format!("SELECT COUNT(*) > 0 FROM {table} WHERE {column} = ?1 AND user_id = ?2"),
            params![target.id, user.get()],
            |row| row.get(0),
        )?;

        Ok(liked)
    }

    async fn count(&self, target: TargetRef) -> Result<i64, StoreError> {
        let conn = self.pool.get()?;
        let (table, column) = membership_table(target.kind);

        let count = conn.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE {column} = ?1"),
            params![target.id],
            |row| row.get(0),
        )?;

        Ok(count)
    }
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynLikeRepository = Arc<dyn LikeRepository>;
