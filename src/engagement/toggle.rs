use serde::Serialize;
use thiserror::Error;

use super::repository::{DynLikeRepository, Likeable};
use crate::notify::{NotificationStore, RetryPolicy, StoreError, TargetRef, UserId};

#[derive(Debug, Error)]
pub enum EngageError {
    #[error("{0} does not exist")]
    NotFound(TargetRef),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    pub liked: bool,
    pub likes_count: i64,
}

/// Like/unlike for posts and images, notifying the owner on a fresh like.
#[derive(Clone)]
pub struct EngagementToggle {
    likes: DynLikeRepository,
    notifications: NotificationStore,
    retry: RetryPolicy,
}

impl EngagementToggle {
    pub fn new(
        likes: DynLikeRepository,
        notifications: NotificationStore,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            likes,
            notifications,
            retry,
        }
    }

    pub async fn resolve(&self, target: TargetRef) -> Result<Likeable, EngageError> {
        let likes = self.likes.as_ref();
        self.retry
            .run_store("likes.resolve", move || likes.find_likeable(target))
            .await?
            .ok_or(EngageError::NotFound(target))
    }

    /// Flip `user`'s like on `entity`.
    ///
    /// The membership change is authoritative: once it commits, a failure to
    /// notify the owner is logged and dropped. Storage failures on the flip
    /// itself or on the recount are returned.
    pub async fn toggle(&self, entity: &Likeable, user: UserId) -> Result<ToggleOutcome, EngageError> {
        let likes = self.likes.as_ref();
        let target = entity.target;

        let liked = self
            .retry
            .run_store("likes.toggle", move || likes.toggle(target, user))
            .await?;

        if liked && user != entity.owner {
            self.notify_owner(entity, user).await;
        }

        let likes_count = self
            .retry
            .run_store("likes.count", move || likes.count(target))
            .await?;

        tracing::debug!(
            target_kind = %target.kind,
            target_id = target.id,
            user = %user,
            liked,
            likes_count,
            "Like toggled"
        );

        Ok(ToggleOutcome { liked, likes_count })
    }

    async fn notify_owner(&self, entity: &Likeable, user: UserId) {
        let target = entity.target;
        if let Err(e) = self
            .notifications
            .create_single(user, Some(target), target.kind.like_verb(), entity.owner)
            .await
        {
            tracing::error!(
                actor = %user,
                target_kind = %target.kind,
                target_id = target.id,
                error = %e,
                "Could not create notification when {} with id {} was liked",
                target.kind,
                target.id
            );
        }
    }
}
