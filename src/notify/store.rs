use chrono::Utc;
use std::collections::HashSet;

use super::domain::{NewNotification, Notification, NotificationId, NotifyError, UserId};
use super::repository::{DynNotificationRepository, PageWindow};
use super::retry::RetryPolicy;
use super::target::TargetRef;

/// Owns the notification lifecycle. Every storage call goes through the
/// retry policy, so callers never retry on their own.
#[derive(Clone)]
pub struct NotificationStore {
    repo: DynNotificationRepository,
    retry: RetryPolicy,
}

impl NotificationStore {
    pub fn new(repo: DynNotificationRepository, retry: RetryPolicy) -> Self {
        Self { repo, retry }
    }

    pub async fn create_single(
        &self,
        actor: UserId,
        target: Option<TargetRef>,
        verb: &str,
        recipient: UserId,
    ) -> Result<Notification, NotifyError> {
        let new = NewNotification::new(actor, target, verb, recipient, Utc::now())?;
        let repo = self.repo.as_ref();
        let new = &new;

        let notification = self
            .retry
            .run_store("notifications.create", move || repo.insert(new))
            .await?;

        tracing::debug!(
            id = %notification.id,
            actor = %actor,
            recipient = %recipient,
            verb,
            "Notification created"
        );
        Ok(notification)
    }

    /// One notification per recipient, each insert retried on its own.
    ///
    /// The first recipient whose retries run out aborts the rest of the
    /// fan-out. Rows already written for earlier recipients stay. Returns the
    /// number of notifications created.
    pub async fn create_fanout(
        &self,
        actor: UserId,
        target: Option<TargetRef>,
        verb: &str,
        recipients: &HashSet<UserId>,
    ) -> Result<usize, NotifyError> {
        if recipients.is_empty() {
            return Ok(0);
        }

        let mut created = 0;
        for &recipient in recipients {
            self.create_single(actor, target, verb, recipient).await?;
            created += 1;
        }

        tracing::info!(
            actor = %actor,
            target = ?target,
            verb,
            created,
            "Fan-out complete"
        );
        Ok(created)
    }

    /// Everything addressed to `user`, newest first
    pub async fn get_for_recipient(&self, user: UserId) -> Result<Vec<Notification>, NotifyError> {
        let repo = self.repo.as_ref();
        Ok(self
            .retry
            .run_store("notifications.list", move || {
                repo.list_for_recipient(user, None)
            })
            .await?)
    }

    /// One page of `get_for_recipient`; pages are numbered from 1
    pub async fn page_for_recipient(
        &self,
        user: UserId,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Notification>, NotifyError> {
        let per_page = i64::from(per_page.max(1));
        let window = PageWindow {
            limit: per_page,
            offset: i64::from(page.max(1) - 1) * per_page,
        };
        let repo = self.repo.as_ref();

        Ok(self
            .retry
            .run_store("notifications.page", move || {
                repo.list_for_recipient(user, Some(window))
            })
            .await?)
    }

    pub async fn get(&self, id: NotificationId) -> Result<Notification, NotifyError> {
        let repo = self.repo.as_ref();
        self.retry
            .run_store("notifications.get", move || repo.find(id))
            .await?
            .ok_or(NotifyError::NotFound(id))
    }

    /// Clears the unread flag. Requests from anyone but the recipient are
    /// ignored without an error.
    pub async fn mark_read(
        &self,
        notification: &Notification,
        requesting_user: UserId,
    ) -> Result<(), NotifyError> {
        if !notification.belongs_to(requesting_user) {
            tracing::debug!(
                id = %notification.id,
                user = %requesting_user,
                "Ignoring mark-read from non-recipient"
            );
            return Ok(());
        }
        if !notification.unread {
            return Ok(());
        }

        let repo = self.repo.as_ref();
        let id = notification.id;
        self.retry
            .run_store("notifications.mark_read", move || {
                repo.mark_read(id, requesting_user)
            })
            .await?;
        Ok(())
    }

    /// Removes the notification. Requests from anyone but the recipient are
    /// ignored without an error.
    pub async fn delete(
        &self,
        notification: &Notification,
        requesting_user: UserId,
    ) -> Result<(), NotifyError> {
        if !notification.belongs_to(requesting_user) {
            tracing::debug!(
                id = %notification.id,
                user = %requesting_user,
                "Ignoring delete from non-recipient"
            );
            return Ok(());
        }

        let repo = self.repo.as_ref();
        let id = notification.id;
        self.retry
            .run_store("notifications.delete", move || {
                repo.delete(id, requesting_user)
            })
            .await?;
        Ok(())
    }

    pub async fn delete_by_target(&self, target: TargetRef) -> Result<u64, NotifyError> {
        let repo = self.repo.as_ref();
        Ok(self
            .retry
            .run_store("notifications.delete_by_target", move || {
                repo.delete_by_target(target)
            })
            .await?)
    }

    pub async fn count_unread(&self, user: UserId) -> Result<i64, NotifyError> {
        let repo = self.repo.as_ref();
        Ok(self
            .retry
            .run_store("notifications.count_unread", move || {
                repo.count_unread(user)
            })
            .await?)
    }

    pub async fn count_for_recipient(&self, user: UserId) -> Result<i64, NotifyError> {
        let repo = self.repo.as_ref();
        Ok(self
            .retry
            .run_store("notifications.count", move || {
                repo.count_for_recipient(user)
            })
            .await?)
    }
}
