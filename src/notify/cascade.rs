use super::store::NotificationStore;
use super::target::TargetRef;

/// Remove every notification pointing at `target` before it is destroyed.
///
/// Storage failures are logged and swallowed: the deletion that triggered the
/// purge must go ahead regardless. Returns how many rows were purged.
pub async fn purge_target(store: &NotificationStore, target: TargetRef) -> u64 {
    match store.delete_by_target(target).await {
        Ok(purged) => {
            if purged > 0 {
                tracing::debug!(target_kind = %target.kind, target_id = target.id, purged, "Purged notifications");
            }
            purged
        }
        Err(e) => {
            tracing::error!(
                target_kind = %target.kind,
                target_id = target.id,
                error = %e,
                "Could not delete notifications for deleted {} {}",
                target.kind,
                target.id
            );
            0
        }
    }
}

/// `purge_target` for each target in turn
pub async fn purge_targets(
    store: &NotificationStore,
    targets: impl IntoIterator<Item = TargetRef>,
) -> u64 {
    let mut purged = 0;
    for target in targets {
        purged += purge_target(store, target).await;
    }
    purged
}
