use async_trait::async_trait;
use sqlx::sqlite::{
    Sqlite, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
};
use sqlx::{FromRow, QueryBuilder};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{
    ChildStamp, CommentDatabase, DatabaseTransaction, InsertComment,
};
use crate::models::{timestamp_from_micros, AuthorId, Comment, CommentId, PostId, Timestamp};
use crate::tree::path::TreePath;

const COMMENT_COLUMNS: &str =
    "id, post_id, author_id, message, parent_id, last_child_id, tree_path, created_on, updated_on";

#[derive(Debug, FromRow)]
struct CommentRow {
    id: i64,
    post_id: i64,
    author_id: i64,
    message: String,
    parent_id: Option<i64>,
    last_child_id: Option<i64>,
    tree_path: String,
    created_on: i64,
    updated_on: i64,
}

impl TryFrom<CommentRow> for Comment {
    type Error = AppError;

    fn try_from(row: CommentRow) -> AppResult<Self> {
        Ok(Comment {
            id: row.id,
            post_id: row.post_id,
            author_id: row.author_id,
            message: row.message,
            parent_id: row.parent_id,
            last_child_id: row.last_child_id,
            tree_path: TreePath::parse(row.tree_path)?,
            created_on: timestamp_from_micros(row.created_on)?,
            updated_on: timestamp_from_micros(row.updated_on)?,
        })
    }
}

fn into_comments(rows: Vec<CommentRow>) -> AppResult<Vec<Comment>> {
    rows.into_iter().map(Comment::try_from).collect()
}

/// SQLite implementation of the comment store
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| {
                AppError::ConfigurationError(format!(
                    "Invalid database URL {}: {}",
                    config.url, e
                ))
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to connect to {}: {}", config.url, e))
            })?;

        let db = Self { pool };
        db.initialize().await?;
        info!(
            "Comment store ready at {} ({} connections)",
            config.url, config.max_connections
        );
        Ok(db)
    }

    /// Private in-memory store on a single pinned connection, for tests.
    pub async fn new_in_memory() -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| AppError::ConfigurationError(format!("Invalid in-memory URL: {}", e)))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to connect to in-memory SQLite: {}", e))
            })?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    /// Create the comments table and its indexes
    pub async fn initialize(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id INTEGER NOT NULL,
                author_id INTEGER NOT NULL,
                message TEXT NOT NULL DEFAULT '',
                parent_id INTEGER REFERENCES comments(id),
                last_child_id INTEGER REFERENCES comments(id) ON DELETE SET NULL,
                tree_path TEXT NOT NULL DEFAULT '',
                created_on INTEGER NOT NULL,
                updated_on INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create comments table: {}", e)))?;

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_comments_post_path ON comments(post_id, tree_path)",
            "CREATE INDEX IF NOT EXISTS idx_comments_parent_created \
             ON comments(parent_id, created_on DESC, id DESC)",
            "CREATE INDEX IF NOT EXISTS idx_comments_path ON comments(tree_path)",
            "CREATE INDEX IF NOT EXISTS idx_comments_last_child ON comments(last_child_id)",
        ];
        for statement in indexes {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to create index: {}", e)))?;
        }

        Ok(())
    }

    /// Health check to verify database connectivity
    pub async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Database health check failed: {}", e)))?;
        Ok(())
    }

    async fn lock_where(
        &self,
        tx: &mut DatabaseTransaction,
        id: CommentId,
        author_id: Option<AuthorId>,
    ) -> AppResult<Option<Comment>> {
        // A no-op write takes SQLite's write lock before anything is read.
        let mut qb = QueryBuilder::<Sqlite>::new(
            "UPDATE comments SET updated_on = updated_on WHERE id = ",
        );
        qb.push_bind(id);
        if let Some(author_id) = author_id {
            qb.push(" AND author_id = ");
            qb.push_bind(author_id);
        }
        qb.push(" RETURNING ");
        qb.push(COMMENT_COLUMNS);

        let row = qb
            .build_query_as::<CommentRow>()
            .fetch_optional(tx.conn())
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to lock comment {}: {}", id, e)))?;

        row.map(Comment::try_from).transpose()
    }
}

#[async_trait]
impl CommentDatabase for SqliteDatabase {
    async fn begin_transaction(&self) -> AppResult<DatabaseTransaction> {
        let tx =
            self.pool.begin().await.map_err(|e| {
                AppError::DatabaseError(format!("Failed to begin transaction: {}", e))
            })?;
        Ok(DatabaseTransaction::new(tx))
    }

    async fn lock_comment_tx(
        &self,
        tx: &mut DatabaseTransaction,
        id: CommentId,
    ) -> AppResult<Option<Comment>> {
        self.lock_where(tx, id, None).await
    }

    async fn lock_owned_comment_tx(
        &self,
        tx: &mut DatabaseTransaction,
        id: CommentId,
        author_id: AuthorId,
    ) -> AppResult<Option<Comment>> {
        self.lock_where(tx, id, Some(author_id)).await
    }

    async fn get_comment_tx(
        &self,
        tx: &mut DatabaseTransaction,
        id: CommentId,
    ) -> AppResult<Option<Comment>> {
        let sql = format!("SELECT {} FROM comments WHERE id = ?", COMMENT_COLUMNS);
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .fetch_optional(tx.conn())
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to get comment {}: {}", id, e)))?;

        row.map(Comment::try_from).transpose()
    }

    async fn insert_comment_tx(
        &self,
        tx: &mut DatabaseTransaction,
        row: InsertComment<'_>,
    ) -> AppResult<CommentId> {
        let result = sqlx::query(
            "INSERT INTO comments (post_id, author_id, message, parent_id, created_on, updated_on)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(row.post_id)
        .bind(row.author_id)
        .bind(row.message)
        .bind(row.parent_id)
        .bind(row.created_on)
        .bind(row.created_on)
        .execute(tx.conn())
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to insert comment: {}", e)))?;

        let id = result.last_insert_rowid();
        debug!("Inserted comment row {} for post {}", id, row.post_id);
        Ok(id)
    }

    async fn set_tree_path_tx(
        &self,
        tx: &mut DatabaseTransaction,
        id: CommentId,
        path: &TreePath,
    ) -> AppResult<()> {
        let result =
            sqlx::query("UPDATE comments SET tree_path = ? WHERE id = ? AND tree_path = ''")
                .bind(path.as_str())
                .bind(id)
                .execute(tx.conn())
                .await
                .map_err(|e| {
                    AppError::DatabaseError(format!("Failed to set tree path of {}: {}", id, e))
                })?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Comment {} already has a tree path",
                id
            )));
        }
        Ok(())
    }

    async fn set_last_child_tx(
        &self,
        tx: &mut DatabaseTransaction,
        parent_id: CommentId,
        last_child_id: Option<CommentId>,
        updated_on: Timestamp,
    ) -> AppResult<()> {
        let result =
            sqlx::query("UPDATE comments SET last_child_id = ?, updated_on = ? WHERE id = ?")
                .bind(last_child_id)
                .bind(updated_on)
                .bind(parent_id)
                .execute(tx.conn())
                .await
                .map_err(|e| {
                    AppError::DatabaseError(format!(
                        "Failed to update last child of {}: {}",
                        parent_id, e
                    ))
                })?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Parent comment {} vanished during a child write",
                parent_id
            )));
        }
        Ok(())
    }

    async fn latest_child_tx(
        &self,
        tx: &mut DatabaseTransaction,
        parent_id: CommentId,
        excluding: CommentId,
    ) -> AppResult<Option<ChildStamp>> {
        let row = sqlx::query_as::<_, (i64, i64)>(
            "SELECT id, created_on FROM comments
             WHERE parent_id = ? AND id <> ?
             ORDER BY created_on DESC, id DESC
             LIMIT 1",
        )
        .bind(parent_id)
        .bind(excluding)
        .fetch_optional(tx.conn())
        .await
        .map_err(|e| {
            AppError::DatabaseError(format!("Failed to find latest child of {}: {}", parent_id, e))
        })?;

        Ok(row.map(|(id, created_on)| ChildStamp { id, created_on }))
    }

    async fn delete_subtree_tx(
        &self,
        tx: &mut DatabaseTransaction,
        path: &TreePath,
    ) -> AppResult<u64> {
        // parent_id carries no cascade action, so every removed row is counted
        // here. Foreign keys are checked once the whole statement has run.
        let (lower, upper) = path.descendant_range();
        let result = sqlx::query(
            "DELETE FROM comments WHERE tree_path = ? OR (tree_path >= ? AND tree_path < ?)",
        )
        .bind(path.as_str())
        .bind(lower)
        .bind(upper)
        .execute(tx.conn())
        .await
        .map_err(|e| {
            AppError::DatabaseError(format!("Failed to delete subtree {}: {}", path, e))
        })?;

        Ok(result.rows_affected())
    }

    async fn update_message(
        &self,
        id: CommentId,
        author_id: AuthorId,
        message: &str,
        updated_on: Timestamp,
    ) -> AppResult<Option<Comment>> {
        let sql = format!(
            "UPDATE comments SET message = ?, updated_on = ?
             WHERE id = ? AND author_id = ?
             RETURNING {}",
            COMMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(message)
            .bind(updated_on)
            .bind(id)
            .bind(author_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to update comment {}: {}", id, e))
            })?;

        row.map(Comment::try_from).transpose()
    }

    async fn get_comment(&self, id: CommentId) -> AppResult<Option<Comment>> {
        let sql = format!("SELECT {} FROM comments WHERE id = ?", COMMENT_COLUMNS);
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to get comment {}: {}", id, e)))?;

        row.map(Comment::try_from).transpose()
    }

    async fn get_comments(&self, ids: &[CommentId]) -> AppResult<Vec<Comment>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT ");
        qb.push(COMMENT_COLUMNS);
        qb.push(" FROM comments WHERE id IN (");
        let mut separated = qb.separated(",");
        for id in ids {
            separated.push_bind(*id);
        }
        qb.push(") ORDER BY tree_path");

        let rows = qb
            .build_query_as::<CommentRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to get comments: {}", e)))?;

        into_comments(rows)
    }

    async fn list_post_comments(&self, post_id: PostId) -> AppResult<Vec<Comment>> {
        let sql = format!(
            "SELECT {} FROM comments WHERE post_id = ? ORDER BY tree_path",
            COMMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!(
                    "Failed to list comments of post {}: {}",
                    post_id, e
                ))
            })?;

        into_comments(rows)
    }

    async fn list_subtree(&self, path: &TreePath) -> AppResult<Vec<Comment>> {
        let (lower, upper) = path.descendant_range();
        let sql = format!(
            "SELECT {} FROM comments
             WHERE tree_path = ? OR (tree_path >= ? AND tree_path < ?)
             ORDER BY tree_path",
            COMMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(path.as_str())
            .bind(lower)
            .bind(upper)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to list subtree {}: {}", path, e))
            })?;

        into_comments(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn insert(
        db: &SqliteDatabase,
        tx: &mut DatabaseTransaction,
        parent: Option<&TreePath>,
        parent_id: Option<CommentId>,
    ) -> (CommentId, TreePath) {
        let id = db
            .insert_comment_tx(
                tx,
                InsertComment {
                    post_id: 1,
                    author_id: 1,
                    message: "",
                    parent_id,
                    created_on: 1_000,
                },
            )
            .await
            .unwrap();
        let path = TreePath::assign(id, parent);
        db.set_tree_path_tx(tx, id, &path).await.unwrap();
        (id, path)
    }

    #[tokio::test]
    async fn test_delete_subtree_counts_every_removed_row() {
        let db = SqliteDatabase::new_in_memory().await.unwrap();
        let mut tx = db.begin_transaction().await.unwrap();
        let (root, root_path) = insert(&db, &mut tx, None, None).await;
        let (child, child_path) = insert(&db, &mut tx, Some(&root_path), Some(root)).await;
        insert(&db, &mut tx, Some(&child_path), Some(child)).await;
        insert(&db, &mut tx, Some(&root_path), Some(root)).await;
        let (other_root, _) = insert(&db, &mut tx, None, None).await;

        assert_eq!(db.delete_subtree_tx(&mut tx, &child_path).await.unwrap(), 2);
        assert_eq!(db.delete_subtree_tx(&mut tx, &root_path).await.unwrap(), 2);
        tx.commit().await.unwrap();

        assert!(db.get_comment(root).await.unwrap().is_none());
        assert!(db.get_comment(other_root).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_tree_path_is_written_once() {
        let db = SqliteDatabase::new_in_memory().await.unwrap();
        let mut tx = db.begin_transaction().await.unwrap();
        let (id, path) = insert(&db, &mut tx, None, None).await;

        let again = db.set_tree_path_tx(&mut tx, id, &path).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_lock_owned_comment_checks_author() {
        let db = SqliteDatabase::new_in_memory().await.unwrap();
        let mut tx = db.begin_transaction().await.unwrap();
        let (id, _) = insert(&db, &mut tx, None, None).await;

        assert!(db.lock_owned_comment_tx(&mut tx, id, 2).await.unwrap().is_none());
        let locked = db.lock_owned_comment_tx(&mut tx, id, 1).await.unwrap().unwrap();
        assert_eq!(locked.id, id);
    }
}
