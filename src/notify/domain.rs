// Domain types - plain values, no storage access
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::repository::StoreError;
use super::target::TargetRef;

pub const VERB_NEW_POST: &str = "created new post";
pub const VERB_IS_FOLLOWING: &str = "is now following you";
pub const VERB_LIKE_POST: &str = "liked your post";
pub const VERB_LIKE_IMAGE: &str = "liked your image";

pub const VERB_MAX_LENGTH: usize = 255;

/// New types for compile-time safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub i64);

impl NotificationId {
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The user who performed an activity, joined onto every notification read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub actor: Actor,
    pub recipient: UserId,
    pub verb: String,
    pub target: Option<TargetRef>,
    pub unread: bool,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn belongs_to(&self, user: UserId) -> bool {
        self.recipient == user
    }
}

/// A notification that has passed validation but is not yet stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub actor: UserId,
    pub recipient: UserId,
    pub verb: String,
    pub target: Option<TargetRef>,
    pub timestamp: DateTime<Utc>,
    /// Stored with the row. Inserting the same value twice yields one row,
    /// so a retried insert cannot duplicate a notification.
    pub request_key: String,
}

impl NewNotification {
    pub fn new(
        actor: UserId,
        target: Option<TargetRef>,
        verb: &str,
        recipient: UserId,
        now: DateTime<Utc>,
    ) -> Result<Self, NotifyError> {
        if let Some(target) = &target {
            target.validate()?;
        }
        validate_verb(verb)?;

        Ok(Self {
            actor,
            recipient,
            verb: verb.to_string(),
            target,
            timestamp: now,
            request_key: new_request_key(),
        })
    }
}

fn new_request_key() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn validate_verb(verb: &str) -> Result<(), NotifyError> {
    if verb.trim().is_empty() {
        return Err(NotifyError::InvalidVerb("verb cannot be empty".into()));
    }
    let len = verb.chars().count();
    if len > VERB_MAX_LENGTH {
        return Err(NotifyError::InvalidVerb(format!(
            "verb is {} characters, limit is {}",
            len, VERB_MAX_LENGTH
        )));
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Invalid verb: {0}")]
    InvalidVerb(String),

    #[error("Notification {0} does not exist")]
    NotFound(NotificationId),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}
