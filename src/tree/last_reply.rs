// Last-Reply Tracker - keeps every parent's last_child_id pointing at its newest live child
//
// Conflict policy: on create the last committed child wins; on delete the pointer is
// recomputed from the remaining live children. Both run inside the caller's
// transaction, after the caller has taken the write lock on the parent row.

use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{CommentDatabase, DatabaseTransaction};
use crate::models::{CommentId, Timestamp};

/// New state written to a parent row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastReplyRepair {
    pub parent_id: CommentId,
    pub last_child_id: Option<CommentId>,
    pub updated_on: Timestamp,
}

/// Point `parent_id` at a child that was just inserted. No-op for roots.
pub async fn on_child_created(
    db: &dyn CommentDatabase,
    tx: &mut DatabaseTransaction,
    parent_id: Option<CommentId>,
    child_id: CommentId,
    child_created_on: Timestamp,
) -> AppResult<Option<LastReplyRepair>> {
    let Some(parent_id) = parent_id else {
        return Ok(None);
    };

    db.set_last_child_tx(tx, parent_id, Some(child_id), child_created_on)
        .await?;
    debug!("Comment {} now has last child {}", parent_id, child_id);

    Ok(Some(LastReplyRepair {
        parent_id,
        last_child_id: Some(child_id),
        updated_on: child_created_on,
    }))
}

/// Repair `parent_id` before `deleted_child_id` (and its subtree) is removed.
/// No-op for roots.
///
/// With no children left, `updated_on` falls back to the parent's own creation
/// time, discarding any later edit timestamp.
pub async fn on_child_deleted(
    db: &dyn CommentDatabase,
    tx: &mut DatabaseTransaction,
    parent_id: Option<CommentId>,
    deleted_child_id: CommentId,
) -> AppResult<Option<LastReplyRepair>> {
    let Some(parent_id) = parent_id else {
        return Ok(None);
    };

    let (last_child_id, updated_on) =
        match db.latest_child_tx(tx, parent_id, deleted_child_id).await? {
            Some(prev_child) => (Some(prev_child.id), prev_child.created_on),
            None => {
                let parent = db.get_comment_tx(tx, parent_id).await?.ok_or_else(|| {
                    AppError::Conflict(format!(
                        "Comment {} has a missing parent {}",
                        deleted_child_id, parent_id
                    ))
                })?;
                (None, parent.created_on.timestamp_micros())
            }
        };

    db.set_last_child_tx(tx, parent_id, last_child_id, updated_on)
        .await?;
    debug!(
        "Comment {} last child repaired to {:?} after deleting {}",
        parent_id, last_child_id, deleted_child_id
    );

    Ok(Some(LastReplyRepair {
        parent_id,
        last_child_id,
        updated_on,
    }))
}
