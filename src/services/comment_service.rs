// CommentService - create/edit/delete/list over the comment tree
// Every write is one transaction; a dropped transaction rolls back.

use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::{
    error::{AppError, AppResult},
    infrastructure::database::{CommentDatabase, InsertComment},
    models::{current_time_micros, AuthorId, Comment, CommentId, DeleteOutcome, NewComment, PostId},
    tree::{self, last_reply, ThreadNode, TreePath},
};

#[derive(Clone)]
pub struct CommentService {
    db: Arc<dyn CommentDatabase>,
}

impl CommentService {
    pub fn new(db: Arc<dyn CommentDatabase>) -> Self {
        Self { db }
    }

    /// Insert a comment, assign its path and point its parent at it.
    #[instrument(
        skip(self, new_comment),
        fields(post_id = ?new_comment.post_id, parent_id = ?new_comment.parent_id)
    )]
    pub async fn create_comment(&self, new_comment: NewComment) -> AppResult<Comment> {
        let post_id = match new_comment.post_id {
            Some(post_id) if post_id > 0 => post_id,
            _ => return Err(AppError::Validation("post_id is required".to_string())),
        };

        let mut tx = self.db.begin_transaction().await?;

        let parent = match new_comment.parent_id {
            Some(parent_id) => {
                let parent = self
                    .db
                    .lock_comment_tx(&mut tx, parent_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("Comment {} not found", parent_id))
                    })?;
                if parent.post_id != post_id {
                    return Err(AppError::Validation(format!(
                        "Comment {} belongs to a different post",
                        parent_id
                    )));
                }
                Some(parent)
            }
            None => None,
        };

        // Read the clock only once the parent is locked, so creation order
        // and commit order agree under each parent.
        let created_on = current_time_micros();
        let id = self
            .db
            .insert_comment_tx(
                &mut tx,
                InsertComment {
                    post_id,
                    author_id: new_comment.author_id,
                    message: &new_comment.message,
                    parent_id: new_comment.parent_id,
                    created_on,
                },
            )
            .await?;

        let path = TreePath::assign(id, parent.as_ref().map(|p| &p.tree_path));
        if !path.fits() {
            return Err(AppError::Validation("Reply nesting too deep".to_string()));
        }
        self.db.set_tree_path_tx(&mut tx, id, &path).await?;

        let repair = last_reply::on_child_created(
            self.db.as_ref(),
            &mut tx,
            new_comment.parent_id,
            id,
            created_on,
        )
        .await?;

        let comment = self
            .db
            .get_comment_tx(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Comment {} missing after insert", id)))?;
        tx.commit().await?;

        info!("Created comment {} at {}", comment.id, comment.tree_path);
        if let Some(repair) = repair {
            debug!("Parent repaired: {:?}", repair);
        }
        Ok(comment)
    }

    /// Replace the message of a comment owned by `author_id`.
    #[instrument(skip(self, message))]
    pub async fn edit_comment(
        &self,
        comment_id: CommentId,
        author_id: AuthorId,
        message: String,
    ) -> AppResult<Comment> {
        let comment = self
            .db
            .update_message(comment_id, author_id, &message, current_time_micros())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", comment_id)))?;

        info!("Edited comment {}", comment_id);
        Ok(comment)
    }

    /// Delete a comment owned by `author_id` together with its whole subtree.
    #[instrument(skip(self))]
    pub async fn delete_comment(
        &self,
        comment_id: CommentId,
        author_id: AuthorId,
    ) -> AppResult<DeleteOutcome> {
        let mut tx = self.db.begin_transaction().await?;

        let target = self
            .db
            .lock_owned_comment_tx(&mut tx, comment_id, author_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", comment_id)))?;

        let repair =
            last_reply::on_child_deleted(self.db.as_ref(), &mut tx, target.parent_id, target.id)
                .await?;
        let deleted = self.db.delete_subtree_tx(&mut tx, &target.tree_path).await?;
        tx.commit().await?;

        info!(
            "Deleted comment {} and {} descendants",
            comment_id,
            deleted.saturating_sub(1)
        );
        if let Some(repair) = repair {
            debug!("Parent repaired: {:?}", repair);
        }
        Ok(DeleteOutcome { deleted })
    }

    /// Every comment of a post as a reply forest.
    #[instrument(skip(self))]
    pub async fn list_thread(&self, post_id: PostId) -> AppResult<Vec<ThreadNode>> {
        let rows = self.db.list_post_comments(post_id).await?;
        Ok(tree::build_forest(rows))
    }

    pub async fn get_comment(&self, comment_id: CommentId) -> AppResult<Comment> {
        self.db
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", comment_id)))
    }

    /// The ancestors of a comment, root first.
    pub async fn ancestors(&self, comment_id: CommentId) -> AppResult<Vec<Comment>> {
        let comment = self.get_comment(comment_id).await?;
        self.db.get_comments(&comment.ancestor_ids()).await
    }

    /// A comment and everything below it, nested.
    pub async fn subtree(&self, comment_id: CommentId) -> AppResult<ThreadNode> {
        let comment = self.get_comment(comment_id).await?;
        let rows = self.db.list_subtree(&comment.tree_path).await?;
        tree::build_subtree(comment_id, rows)
            .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", comment_id)))
    }

    /// Check paths and last-child pointers of every comment in a post.
    pub async fn verify_post(&self, post_id: PostId) -> AppResult<()> {
        let rows = self.db.list_post_comments(post_id).await?;
        tree::check_invariants(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::sqlite_database::SqliteDatabase;

    async fn service() -> CommentService {
        let db = SqliteDatabase::new_in_memory().await.unwrap();
        CommentService::new(Arc::new(db))
    }

    fn reply(post_id: PostId, author_id: AuthorId, parent_id: Option<CommentId>) -> NewComment {
        NewComment {
            post_id: Some(post_id),
            author_id,
            message: "hello".to_string(),
            parent_id,
        }
    }

    #[tokio::test]
    async fn test_missing_post_id_is_a_validation_failure() {
        let service = service().await;
        let mut new_comment = reply(1, 1, None);
        new_comment.post_id = None;

        let err = service.create_comment(new_comment).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_failed_create_leaves_no_row() {
        let service = service().await;
        let root = service.create_comment(reply(1, 1, None)).await.unwrap();

        let err = service
            .create_comment(reply(2, 1, Some(root.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(service.list_thread(2).await.unwrap().is_empty());

        let root = service.get_comment(root.id).await.unwrap();
        assert_eq!(root.last_child_id, None);
    }
}
