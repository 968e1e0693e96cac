use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::content::Feed;
use crate::engagement::{EngagementToggle, SqliteLikeRepository};
use crate::notify::{NotificationStore, SqliteNotificationRepository};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub notifications: NotificationStore,
    pub engagement: EngagementToggle,
    pub feed: Feed,
}

impl AppState {
    /// Wire the SQLite-backed services over a migrated pool
    pub fn new(db: DbPool, config: Config) -> Self {
        let retry = config.retry.policy();
        let notifications = NotificationStore::new(
            Arc::new(SqliteNotificationRepository::new(db.clone())),
            retry,
        );
        let engagement = EngagementToggle::new(
            Arc::new(SqliteLikeRepository::new(db.clone())),
            notifications.clone(),
            retry,
        );
        let feed = Feed::new(db.clone(), notifications.clone(), retry);

        Self {
            db,
            config,
            notifications,
            engagement,
            feed,
        }
    }
}
