//! Test doubles shared by the notification and engagement unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tempfile::TempDir;

use super::domain::{NewNotification, Notification, NotificationId, UserId};
use super::repository::{
    NotificationRepository, PageWindow, SqliteNotificationRepository, StoreError,
};
use super::target::TargetRef;
use crate::db;
use crate::state::DbPool;

/// Migrated database with users 1 alice, 2 bob, 3 carol, 4 dave
pub(crate) fn seeded_pool() -> (DbPool, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let pool = db::create_pool(&temp_dir.path().join("test.db")).unwrap();
    db::run_migrations(&pool).unwrap();
    pool.get()
        .unwrap()
        .execute_batch(
            "INSERT INTO users (id, username) VALUES
                (1, 'alice'), (2, 'bob'), (3, 'carol'), (4, 'dave');",
        )
        .unwrap();
    (pool, temp_dir)
}

pub(crate) fn seeded_repo() -> (SqliteNotificationRepository, TempDir) {
    let (pool, temp_dir) = seeded_pool();
    (SqliteNotificationRepository::new(pool), temp_dir)
}

/// Wraps a real repository and injects SQLITE_BUSY failures on demand
pub(crate) struct FlakyRepository {
    inner: SqliteNotificationRepository,
    insert_calls: AtomicU32,
    failing_inserts: AtomicU32,
    lost_insert_acks: AtomicU32,
    fail_every_insert: AtomicBool,
    failing_reads: AtomicU32,
    fail_every_delete: AtomicBool,
}

impl FlakyRepository {
    pub(crate) fn new(inner: SqliteNotificationRepository) -> Self {
        Self {
            inner,
            insert_calls: AtomicU32::new(0),
            failing_inserts: AtomicU32::new(0),
            lost_insert_acks: AtomicU32::new(0),
            fail_every_insert: AtomicBool::new(false),
            failing_reads: AtomicU32::new(0),
            fail_every_delete: AtomicBool::new(false),
        }
    }

    pub(crate) fn fail_next_inserts(&self, n: u32) {
        self.failing_inserts.store(n, Ordering::SeqCst);
    }

    /// The next `n` inserts commit but report SQLITE_BUSY to the caller
    pub(crate) fn lose_next_insert_acks(&self, n: u32) {
        self.lost_insert_acks.store(n, Ordering::SeqCst);
    }

    pub(crate) fn fail_all_inserts(&self, fail: bool) {
        self.fail_every_insert.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_next_reads(&self, n: u32) {
        self.failing_reads.store(n, Ordering::SeqCst);
    }

    pub(crate) fn fail_all_deletes(&self, fail: bool) {
        self.fail_every_delete.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn insert_calls(&self) -> u32 {
        self.insert_calls.load(Ordering::SeqCst)
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if Self::take_failure(&self.failing_reads) {
            return Err(StoreError::busy("injected read failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for FlakyRepository {
    async fn insert(&self, new: &NewNotification) -> Result<Notification, StoreError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_every_insert.load(Ordering::SeqCst)
            || Self::take_failure(&self.failing_inserts)
        {
            return Err(StoreError::busy("injected insert failure"));
        }
        let stored = self.inner.insert(new).await?;
        if Self::take_failure(&self.lost_insert_acks) {
            return Err(StoreError::busy("injected failure after commit"));
        }
        Ok(stored)
    }

    async fn find(&self, id: NotificationId) -> Result<Option<Notification>, StoreError> {
        self.check_read()?;
        self.inner.find(id).await
    }

    async fn list_for_recipient(
        &self,
        recipient: UserId,
        window: Option<PageWindow>,
    ) -> Result<Vec<Notification>, StoreError> {
        self.check_read()?;
        self.inner.list_for_recipient(recipient, window).await
    }

    async fn mark_read(&self, id: NotificationId, recipient: UserId) -> Result<bool, StoreError> {
        self.inner.mark_read(id, recipient).await
    }

    async fn delete(&self, id: NotificationId, recipient: UserId) -> Result<bool, StoreError> {
        self.inner.delete(id, recipient).await
    }

    async fn delete_by_target(&self, target: TargetRef) -> Result<u64, StoreError> {
        if self.fail_every_delete.load(Ordering::SeqCst) {
            return Err(StoreError::busy("injected delete failure"));
        }
        self.inner.delete_by_target(target).await
    }

    async fn count_unread(&self, recipient: UserId) -> Result<i64, StoreError> {
        self.check_read()?;
        self.inner.count_unread(recipient).await
    }

    async fn count_for_recipient(&self, recipient: UserId) -> Result<i64, StoreError> {
        self.check_read()?;
        self.inner.count_for_recipient(recipient).await
    }
}
