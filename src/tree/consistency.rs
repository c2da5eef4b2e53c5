// Invariant check over a post's rows: paths match parents, last_child_id is the newest live child

use std::collections::HashMap;

use crate::error::{AppError, AppResult};
use crate::models::{Comment, CommentId};
use crate::tree::path::TreePath;

/// Check every path and last-child pointer in `rows`, which must hold the
/// whole of one post. Returns the first violation as [`AppError::Conflict`].
pub fn check_invariants(rows: &[Comment]) -> AppResult<()> {
    let by_id: HashMap<CommentId, &Comment> = rows.iter().map(|c| (c.id, c)).collect();
    let mut newest_child: HashMap<CommentId, &Comment> = HashMap::new();

    for comment in rows {
        let parent = match comment.parent_id {
            Some(parent_id) => Some(*by_id.get(&parent_id).ok_or_else(|| {
                AppError::Conflict(format!(
                    "Comment {} refers to missing parent {}",
                    comment.id, parent_id
                ))
            })?),
            None => None,
        };

        let expected = TreePath::assign(comment.id, parent.map(|p| &p.tree_path));
        if comment.tree_path != expected {
            return Err(AppError::Conflict(format!(
                "Comment {} has path {} but its parent implies {}",
                comment.id, comment.tree_path, expected
            )));
        }

        if let Some(parent) = parent {
            let key = (comment.created_on, comment.id);
            newest_child
                .entry(parent.id)
                .and_modify(|best| {
                    if key > (best.created_on, best.id) {
                        *best = comment;
                    }
                })
                .or_insert(comment);
        }
    }

    for comment in rows {
        let expected = newest_child.get(&comment.id).map(|c| c.id);
        if comment.last_child_id != expected {
            return Err(AppError::Conflict(format!(
                "Comment {} points at last child {:?}, expected {:?}",
                comment.id, comment.last_child_id, expected
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn comment(id: CommentId, parent: Option<&Comment>, secs: i64) -> Comment {
        let created_on = Utc.timestamp_opt(secs, 0).unwrap();
        Comment {
            id,
            post_id: 1,
            author_id: 1,
            message: String::new(),
            parent_id: parent.map(|p| p.id),
            last_child_id: None,
            tree_path: TreePath::assign(id, parent.map(|p| &p.tree_path)),
            created_on,
            updated_on: created_on,
        }
    }

    #[test]
    fn test_consistent_rows_pass() {
        let mut root = comment(1, None, 10);
        let a = comment(2, Some(&root), 20);
        let b = comment(3, Some(&root), 30);
        root.last_child_id = Some(b.id);

        assert!(check_invariants(&[root, a, b]).is_ok());
    }

    #[test]
    fn test_equal_timestamps_prefer_highest_id() {
        let mut root = comment(1, None, 10);
        let a = comment(2, Some(&root), 20);
        let b = comment(3, Some(&root), 20);
        root.last_child_id = Some(a.id);
        assert!(check_invariants(&[root.clone(), a.clone(), b.clone()]).is_err());

        root.last_child_id = Some(b.id);
        assert!(check_invariants(&[root, a, b]).is_ok());
    }

    #[test]
    fn test_stale_pointer_is_a_conflict() {
        let mut root = comment(1, None, 10);
        let a = comment(2, Some(&root), 20);
        root.last_child_id = Some(99);

        let err = check_invariants(&[root, a]).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_pointer_without_children_is_a_conflict() {
        let mut root = comment(1, None, 10);
        root.last_child_id = Some(2);
        assert!(check_invariants(&[root]).is_err());
    }

    #[test]
    fn test_wrong_path_is_a_conflict() {
        let root = comment(1, None, 10);
        let mut a = comment(2, Some(&root), 20);
        a.tree_path = TreePath::assign(2, None);
        assert!(check_invariants(&[root, a]).is_err());
    }
}
