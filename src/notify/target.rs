use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::domain::NotifyError;

/// The kinds of content an activity can be performed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Post,
    Image,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Image => "image",
        }
    }

    /// Verb used when a user likes content of this kind
    pub fn like_verb(&self) -> &'static str {
        match self {
            Self::Post => super::domain::VERB_LIKE_POST,
            Self::Image => super::domain::VERB_LIKE_IMAGE,
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(Self::Post),
            "image" => Ok(Self::Image),
            other => Err(NotifyError::InvalidTarget(format!(
                "unknown target kind '{}'",
                other
            ))),
        }
    }
}

/// Identifies what an activity was performed against without holding the
/// content itself. Resolving it to a row is an explicit lookup by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    pub kind: TargetKind,
    pub id: i64,
}

impl TargetRef {
    pub fn new(kind: TargetKind, id: i64) -> Self {
        Self { kind, id }
    }

    pub fn post(id: i64) -> Self {
        Self::new(TargetKind::Post, id)
    }

    pub fn image(id: i64) -> Self {
        Self::new(TargetKind::Image, id)
    }

    /// Build a reference from its stored parts, rejecting unknown kinds and
    /// non-positive ids.
    pub fn parse(kind: &str, id: i64) -> Result<Self, NotifyError> {
        let kind = kind.parse::<TargetKind>()?;
        let target = Self::new(kind, id);
        target.validate()?;
        Ok(target)
    }

    pub fn validate(&self) -> Result<(), NotifyError> {
        if self.id <= 0 {
            return Err(NotifyError::InvalidTarget(format!(
                "{} id must be positive, got {}",
                self.kind, self.id
            )));
        }
        Ok(())
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}
