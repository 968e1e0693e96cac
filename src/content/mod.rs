//! Content lifecycle: the places where activities happen and notifications
//! get produced or purged. Each primary write commits first; notification
//! work follows as an explicit call and never undoes the write.

mod queries;

use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

use crate::db::models::{Image, Post, User};
use crate::notify::{
    cascade, NotificationStore, NotifyError, RetryPolicy, StoreError, TargetRef, UserId,
    VERB_IS_FOLLOWING, VERB_NEW_POST,
};
use crate::state::DbPool;

pub const POST_CONTENT_MAX_LENGTH: usize = 150;
pub const MAX_IMAGES_PER_POST: u32 = 10;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{0} does not exist")]
    NotFound(String),

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPost {
    pub post: Post,
    pub images: Vec<Image>,
    pub notified: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowOutcome {
    pub following: bool,
    pub followers_count: i64,
}

#[derive(Clone)]
pub struct Feed {
    pool: DbPool,
    notifications: NotificationStore,
    retry: RetryPolicy,
}

impl Feed {
    pub fn new(pool: DbPool, notifications: NotificationStore, retry: RetryPolicy) -> Self {
        Self {
            pool,
            notifications,
            retry,
        }
    }

    pub async fn create_user(&self, username: &str) -> Result<User, ContentError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ContentError::Invalid("username cannot be empty".into()));
        }

        let pool = &self.pool;
        let user = self
            .retry
            .run_store("users.create", move || async move {
                queries::insert_user(pool, username)
            })
            .await
            .map_err(|e| {
                if e.is_constraint_violation() {
                    ContentError::Invalid(format!("username '{}' is taken", username))
                } else {
                    e.into()
                }
            })?;

        tracing::info!(user = %user.id, username = %user.username, "User created");
        Ok(user)
    }

    pub async fn followers_of(&self, user: UserId) -> Result<HashSet<UserId>, ContentError> {
        let pool = &self.pool;
        Ok(self
            .retry
            .run_store("follows.followers", move || async move {
                queries::followers_of(pool, user)
            })
            .await?)
    }

    /// Commit a post with `image_count` image slots, then tell the author's
    /// followers about it. A failed fan-out is logged; the post stays.
    pub async fn create_post(
        &self,
        author: UserId,
        content: &str,
        image_count: u32,
    ) -> Result<CreatedPost, ContentError> {
        let content = content.trim();
        if content.chars().count() > POST_CONTENT_MAX_LENGTH {
            return Err(ContentError::Invalid(format!(
                "post content must be {} characters or less",
                POST_CONTENT_MAX_LENGTH
            )));
        }
        if image_count > MAX_IMAGES_PER_POST {
            return Err(ContentError::Invalid(format!(
                "a post can have at most {} images",
                MAX_IMAGES_PER_POST
            )));
        }

        let pool = &self.pool;
        let (post, images) = self
            .retry
            .run_store("posts.create", move || async move {
                queries::insert_post(pool, author, content, image_count)
            })
            .await?;

        tracing::info!(post_id = post.id, user = %author, images = images.len(), "Post created");
        let notified = self.announce_post(&post).await;

        Ok(CreatedPost {
            post,
            images,
            notified,
        })
    }

    async fn announce_post(&self, post: &Post) -> usize {
        match self.fanout_new_post(post).await {
            Ok(notified) => notified,
            Err(e) => {
                tracing::error!(
                    actor = %post.user_id,
                    post_id = post.id,
                    error = %e,
                    "Could not create notifications when post with id {} was created",
                    post.id
                );
                0
            }
        }
    }

    async fn fanout_new_post(&self, post: &Post) -> Result<usize, ContentError> {
        let followers = self.followers_of(post.user_id).await?;
        Ok(self
            .notifications
            .create_fanout(
                post.user_id,
                Some(TargetRef::post(post.id)),
                VERB_NEW_POST,
                &followers,
            )
            .await?)
    }

    pub async fn find_post(&self, post_id: i64) -> Result<Post, ContentError> {
        let pool = &self.pool;
        self.retry
            .run_store("posts.get", move || async move {
                queries::find_post(pool, post_id)
            })
            .await?
            .ok_or_else(|| ContentError::NotFound(format!("post {}", post_id)))
    }

    /// Purge notifications for the post and every image on it, then delete.
    /// Only the author may delete a post.
    pub async fn delete_post(&self, post_id: i64, requester: UserId) -> Result<(), ContentError> {
        let post = self.find_post(post_id).await?;
        if post.user_id != requester {
            return Err(ContentError::Forbidden(format!(
                "user {} does not own post {}",
                requester, post_id
            )));
        }

        let pool = &self.pool;
        let image_ids = self
            .retry
            .run_store("images.for_post", move || async move {
                queries::image_ids_for_post(pool, post_id)
            })
            .await?;

        let targets = std::iter::once(TargetRef::post(post_id))
            .chain(image_ids.into_iter().map(TargetRef::image));
        cascade::purge_targets(&self.notifications, targets).await;

        self.retry
            .run_store("posts.delete", move || async move {
                queries::delete_post(pool, post_id)
            })
            .await?;

        tracing::info!(post_id, user = %requester, "Post deleted");
        Ok(())
    }

    /// Only the owner of the image's post may delete it.
    pub async fn delete_image(&self, image_id: i64, requester: UserId) -> Result<(), ContentError> {
        let pool = &self.pool;
        let owner = self
            .retry
            .run_store("images.owner", move || async move {
                queries::image_owner(pool, image_id)
            })
            .await?
            .ok_or_else(|| ContentError::NotFound(format!("image {}", image_id)))?;

        if owner != requester {
            return Err(ContentError::Forbidden(format!(
                "user {} does not own image {}",
                requester, image_id
            )));
        }

        cascade::purge_target(&self.notifications, TargetRef::image(image_id)).await;

        self.retry
            .run_store("images.delete", move || async move {
                queries::delete_image(pool, image_id)
            })
            .await?;

        tracing::info!(image_id, user = %requester, "Image deleted");
        Ok(())
    }

    /// Delete an account. Notifications targeting the user's posts and images
    /// are purged first; everything the user sent or received goes with the
    /// user row.
    pub async fn delete_user(&self, user: UserId, requester: UserId) -> Result<(), ContentError> {
        if user != requester {
            return Err(ContentError::Forbidden(format!(
                "user {} cannot delete user {}",
                requester, user
            )));
        }

        let pool = &self.pool;
        let post_ids = self
            .retry
            .run_store("posts.by_user", move || async move {
                queries::post_ids_by_user(pool, user)
            })
            .await?;
        let image_ids = self
            .retry
            .run_store("images.by_user", move || async move {
                queries::image_ids_by_user(pool, user)
            })
            .await?;

        let targets = post_ids
            .into_iter()
            .map(TargetRef::post)
            .chain(image_ids.into_iter().map(TargetRef::image));
        cascade::purge_targets(&self.notifications, targets).await;

        let deleted = self
            .retry
            .run_store("users.delete", move || async move {
                queries::delete_user(pool, user)
            })
            .await?;
        if !deleted {
            return Err(ContentError::NotFound(format!("user {}", user)));
        }

        tracing::info!(user = %user, "User deleted");
        Ok(())
    }

    /// Follow or unfollow `followee`. A new follow notifies the followee
    /// (best effort); unfollowing is silent.
    pub async fn toggle_follow(
        &self,
        follower: UserId,
        followee: UserId,
    ) -> Result<FollowOutcome, ContentError> {
        if follower == followee {
            return Err(ContentError::Invalid("users cannot follow themselves".into()));
        }

        let pool = &self.pool;
        let exists = self
            .retry
            .run_store("users.exists", move || async move {
                queries::user_exists(pool, followee)
            })
            .await?;
        if !exists {
            return Err(ContentError::NotFound(format!("user {}", followee)));
        }

        let following = self
            .retry
            .run_store("follows.toggle", move || async move {
                queries::toggle_follow(pool, follower, followee)
            })
            .await?;

        if following {
            if let Err(e) = self
                .notifications
                .create_single(follower, None, VERB_IS_FOLLOWING, followee)
                .await
            {
                tracing::error!(
                    actor = %follower,
                    recipient = %followee,
                    error = %e,
                    "Can't create follow notification: user_id {} is following user_id {}",
                    follower,
                    followee
                );
            }
        }

        let followers_count = self.followers_of(followee).await?.len() as i64;
        Ok(FollowOutcome {
            following,
            followers_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::{seeded_pool, FlakyRepository};
    use crate::notify::{SqliteNotificationRepository, VERB_LIKE_POST};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    const ALICE: UserId = UserId(1);
    const BOB: UserId = UserId(2);
    const CAROL: UserId = UserId(3);
    const DAVE: UserId = UserId(4);

    struct Harness {
        feed: Feed,
        notifications: NotificationStore,
        flaky: Arc<FlakyRepository>,
        _temp: TempDir,
    }

    fn harness() -> Harness {
        let (pool, temp) = seeded_pool();
        let retry = RetryPolicy::new(3, Duration::from_millis(1));
        let flaky = Arc::new(FlakyRepository::new(SqliteNotificationRepository::new(
            pool.clone(),
        )));
        let notifications = NotificationStore::new(flaky.clone(), retry);
        Harness {
            feed: Feed::new(pool, notifications.clone(), retry),
            notifications,
            flaky,
            _temp: temp,
        }
    }

    #[tokio::test]
    async fn new_post_fans_out_to_followers_only() {
        let h = harness();
        h.feed.toggle_follow(BOB, ALICE).await.unwrap();
        h.feed.toggle_follow(CAROL, ALICE).await.unwrap();

        let created = h.feed.create_post(ALICE, "hello", 0).await.unwrap();
        assert_eq!(created.notified, 2);

        for follower in [BOB, CAROL] {
            let inbox = h.notifications.get_for_recipient(follower).await.unwrap();
            assert_eq!(inbox.len(), 1);
            assert_eq!(inbox[0].verb, VERB_NEW_POST);
            assert_eq!(inbox[0].target, Some(TargetRef::post(created.post.id)));
        }
        assert_eq!(h.notifications.count_unread(DAVE).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn post_survives_failed_fanout() {
        let h = harness();
        h.feed.toggle_follow(BOB, ALICE).await.unwrap();
        h.flaky.fail_all_inserts(true);

        let created = h.feed.create_post(ALICE, "still here", 2).await.unwrap();
        assert_eq!(created.notified, 0);
        assert_eq!(created.images.len(), 2);
        assert!(h.feed.find_post(created.post.id).await.is_ok());
    }

    #[tokio::test]
    async fn create_post_validates_input() {
        let h = harness();
        let long = "x".repeat(POST_CONTENT_MAX_LENGTH + 1);
        assert!(matches!(
            h.feed.create_post(ALICE, &long, 0).await,
            Err(ContentError::Invalid(_))
        ));
        assert!(matches!(
            h.feed.create_post(ALICE, "ok", MAX_IMAGES_PER_POST + 1).await,
            Err(ContentError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn follow_notifies_and_unfollow_does_not() {
        let h = harness();

        let followed = h.feed.toggle_follow(BOB, ALICE).await.unwrap();
        assert_eq!(
            followed,
            FollowOutcome {
                following: true,
                followers_count: 1
            }
        );
        let unfollowed = h.feed.toggle_follow(BOB, ALICE).await.unwrap();
        assert!(!unfollowed.following);
        assert_eq!(unfollowed.followers_count, 0);

        let inbox = h.notifications.get_for_recipient(ALICE).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].verb, VERB_IS_FOLLOWING);
        assert_eq!(inbox[0].target, None);
        assert_eq!(inbox[0].actor.username, "bob");
    }

    #[tokio::test]
    async fn follow_rejects_self_and_unknown_users() {
        let h = harness();
        assert!(matches!(
            h.feed.toggle_follow(ALICE, ALICE).await,
            Err(ContentError::Invalid(_))
        ));
        assert!(matches!(
            h.feed.toggle_follow(ALICE, UserId(77)).await,
            Err(ContentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn deleting_post_purges_post_and_image_notifications() {
        let h = harness();
        h.feed.toggle_follow(BOB, ALICE).await.unwrap();
        let created = h.feed.create_post(ALICE, "with pictures", 2).await.unwrap();
        let image_id = created.images[0].id;
        h.notifications
            .create_single(BOB, Some(TargetRef::image(image_id)), "liked your image", ALICE)
            .await
            .unwrap();

        h.feed.delete_post(created.post.id, ALICE).await.unwrap();

        assert!(h.notifications.get_for_recipient(BOB).await.unwrap().is_empty());
        let alice_inbox = h.notifications.get_for_recipient(ALICE).await.unwrap();
        // Only the targetless follow notification is left
        assert_eq!(alice_inbox.len(), 1);
        assert_eq!(alice_inbox[0].target, None);
        assert!(matches!(
            h.feed.find_post(created.post.id).await,
            Err(ContentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn deleting_post_proceeds_when_purge_fails() {
        let h = harness();
        let created = h.feed.create_post(ALICE, "doomed", 0).await.unwrap();
        h.flaky.fail_all_deletes(true);

        h.feed.delete_post(created.post.id, ALICE).await.unwrap();
        assert!(h.feed.find_post(created.post.id).await.is_err());
    }

    #[tokio::test]
    async fn only_author_can_delete_post() {
        let h = harness();
        let created = h.feed.create_post(ALICE, "mine", 0).await.unwrap();
        assert!(matches!(
            h.feed.delete_post(created.post.id, BOB).await,
            Err(ContentError::Forbidden(_))
        ));
        assert!(matches!(
            h.feed.delete_post(999, ALICE).await,
            Err(ContentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn deleting_image_purges_only_that_image() {
        let h = harness();
        let created = h.feed.create_post(ALICE, "pair", 2).await.unwrap();
        let (first, second) = (created.images[0].id, created.images[1].id);
        for image in [first, second] {
            h.notifications
                .create_single(CAROL, Some(TargetRef::image(image)), "liked your image", ALICE)
                .await
                .unwrap();
        }

        assert!(matches!(
            h.feed.delete_image(first, CAROL).await,
            Err(ContentError::Forbidden(_))
        ));
        h.feed.delete_image(first, ALICE).await.unwrap();

        let inbox = h.notifications.get_for_recipient(ALICE).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].target, Some(TargetRef::image(second)));
        assert!(matches!(
            h.feed.delete_image(first, ALICE).await,
            Err(ContentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn deleting_user_removes_targets_and_inbox() {
        let h = harness();
        h.feed.toggle_follow(BOB, ALICE).await.unwrap();
        h.feed.toggle_follow(ALICE, CAROL).await.unwrap();
        let created = h.feed.create_post(ALICE, "bye", 1).await.unwrap();
        h.notifications
            .create_single(
                DAVE,
                Some(TargetRef::post(created.post.id)),
                VERB_LIKE_POST,
                ALICE,
            )
            .await
            .unwrap();

        assert!(matches!(
            h.feed.delete_user(ALICE, BOB).await,
            Err(ContentError::Forbidden(_))
        ));
        h.feed.delete_user(ALICE, ALICE).await.unwrap();

        // Bob's new-post notification and Carol's follow notification are gone
        assert_eq!(h.notifications.count_for_recipient(BOB).await.unwrap(), 0);
        assert_eq!(h.notifications.count_for_recipient(CAROL).await.unwrap(), 0);
        assert_eq!(h.notifications.count_for_recipient(ALICE).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn create_user_assigns_id() {
        let h = harness();
        let user = h.feed.create_user("erin").await.unwrap();
        assert_eq!(user.username, "erin");
        assert_eq!(user.id, UserId(5));
        assert!(matches!(
            h.feed.create_user("  ").await,
            Err(ContentError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected_without_a_second_row() {
        let h = harness();
        assert!(matches!(
            h.feed.create_user("alice").await,
            Err(ContentError::Invalid(_))
        ));

        let next = h.feed.create_user("erin").await.unwrap();
        assert_eq!(next.id, UserId(5));
    }
}
