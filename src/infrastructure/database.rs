// Database Interface - storage operations the comment tree is built on
// The store supplies durable rows, auto-assigned ids and atomic single-statement updates

use async_trait::async_trait;
use sqlx::{Sqlite, SqliteConnection, Transaction};

use crate::error::{AppError, AppResult};
use crate::models::{AuthorId, Comment, CommentId, PostId, Timestamp};
use crate::tree::path::TreePath;

/// Transaction wrapper for database operations.
/// Dropping it without calling [`commit`](Self::commit) rolls everything back.
pub struct DatabaseTransaction {
    tx: Transaction<'static, Sqlite>,
}

impl DatabaseTransaction {
    pub fn new(tx: Transaction<'static, Sqlite>) -> Self {
        Self { tx }
    }

    pub(crate) fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    /// Commit the transaction
    pub async fn commit(self) -> AppResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit transaction: {}", e)))
    }
}

/// Row inserted by the first phase of comment creation, before its path is known.
#[derive(Debug, Clone)]
pub struct InsertComment<'a> {
    pub post_id: PostId,
    pub author_id: AuthorId,
    pub message: &'a str,
    pub parent_id: Option<CommentId>,
    pub created_on: Timestamp,
}

/// Id and creation time of a child, enough to point a parent at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildStamp {
    pub id: CommentId,
    pub created_on: Timestamp,
}

/// Storage operations for comments.
///
/// Methods ending in `_tx` run inside a caller-owned transaction. The `lock_*`
/// methods begin with a write to the row, so the transaction holds the write
/// lock before it reads anything that depends on that row.
#[async_trait]
pub trait CommentDatabase: Send + Sync {
    async fn begin_transaction(&self) -> AppResult<DatabaseTransaction>;

    // Write-path operations
    async fn lock_comment_tx(
        &self,
        tx: &mut DatabaseTransaction,
        id: CommentId,
    ) -> AppResult<Option<Comment>>;
    async fn lock_owned_comment_tx(
        &self,
        tx: &mut DatabaseTransaction,
        id: CommentId,
        author_id: AuthorId,
    ) -> AppResult<Option<Comment>>;
    async fn get_comment_tx(
        &self,
        tx: &mut DatabaseTransaction,
        id: CommentId,
    ) -> AppResult<Option<Comment>>;
    async fn insert_comment_tx(
        &self,
        tx: &mut DatabaseTransaction,
        row: InsertComment<'_>,
    ) -> AppResult<CommentId>;
    async fn set_tree_path_tx(
        &self,
        tx: &mut DatabaseTransaction,
        id: CommentId,
        path: &TreePath,
    ) -> AppResult<()>;
    async fn set_last_child_tx(
        &self,
        tx: &mut DatabaseTransaction,
        parent_id: CommentId,
        last_child_id: Option<CommentId>,
        updated_on: Timestamp,
    ) -> AppResult<()>;
    /// Newest child of `parent_id` other than `excluding`, by creation time then id.
    async fn latest_child_tx(
        &self,
        tx: &mut DatabaseTransaction,
        parent_id: CommentId,
        excluding: CommentId,
    ) -> AppResult<Option<ChildStamp>>;
    /// Delete the comment at `path` and every comment below it.
    async fn delete_subtree_tx(
        &self,
        tx: &mut DatabaseTransaction,
        path: &TreePath,
    ) -> AppResult<u64>;

    /// Single-statement edit gated on ownership.
    async fn update_message(
        &self,
        id: CommentId,
        author_id: AuthorId,
        message: &str,
        updated_on: Timestamp,
    ) -> AppResult<Option<Comment>>;

    // Read-path operations
    async fn get_comment(&self, id: CommentId) -> AppResult<Option<Comment>>;
    async fn get_comments(&self, ids: &[CommentId]) -> AppResult<Vec<Comment>>;
    /// Every comment of a post in path order.
    async fn list_post_comments(&self, post_id: PostId) -> AppResult<Vec<Comment>>;
    /// The comment at `path` and all of its descendants, in path order.
    async fn list_subtree(&self, path: &TreePath) -> AppResult<Vec<Comment>>;
}
