pub mod repository;
pub mod toggle;

pub use repository::{DynLikeRepository, LikeRepository, Likeable, SqliteLikeRepository};
pub use toggle::{EngageError, EngagementToggle, ToggleOutcome};
