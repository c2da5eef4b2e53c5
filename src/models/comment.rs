use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::tree::path::TreePath;

pub type CommentId = i64;
pub type PostId = i64;
pub type AuthorId = i64;

/// Microseconds since the Unix epoch, the unit `created_on`/`updated_on` are stored in.
pub type Timestamp = i64;

pub fn current_time_micros() -> Timestamp {
    Utc::now().timestamp_micros()
}

pub fn timestamp_from_micros(micros: Timestamp) -> AppResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| AppError::Internal(format!("Timestamp {} is out of range", micros)))
}

/// A stored comment row.
///
/// `last_child_id` is a back-pointer maintained by the writes of this comment's
/// children; the comment's own insert never sets it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: AuthorId,
    pub message: String,
    pub parent_id: Option<CommentId>,
    pub last_child_id: Option<CommentId>,
    pub tree_path: TreePath,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

impl Comment {
    pub fn root_id(&self) -> CommentId {
        self.tree_path.root_id()
    }

    /// Ids of every ancestor, root first.
    pub fn ancestor_ids(&self) -> Vec<CommentId> {
        self.tree_path.ancestor_ids()
    }

    pub fn depth(&self) -> usize {
        self.tree_path.depth()
    }
}

/// Input to comment creation. `post_id` is optional here so that a missing
/// value surfaces as a validation failure rather than a decode error.
#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub post_id: Option<PostId>,
    pub author_id: AuthorId,
    #[serde(default)]
    pub message: String,
    pub parent_id: Option<CommentId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    /// Rows removed, the target plus its whole subtree.
    pub deleted: u64,
}
