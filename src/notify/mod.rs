pub mod cascade;
pub mod domain;
pub mod repository;
pub mod retry;
pub mod store;
pub mod target;

#[cfg(test)]
pub(crate) mod testing;

pub use domain::{
    Actor, Notification, NotificationId, NotifyError, UserId, VERB_IS_FOLLOWING, VERB_LIKE_IMAGE,
    VERB_LIKE_POST, VERB_NEW_POST,
};
pub use repository::{NotificationRepository, SqliteNotificationRepository, StoreError};
pub use retry::RetryPolicy;
pub use store::NotificationStore;
pub use target::{TargetKind, TargetRef};
