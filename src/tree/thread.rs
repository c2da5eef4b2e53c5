// Thread Reconstructor - nests flat comment rows into reply trees

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::models::{AuthorId, Comment, CommentId, PostId};

/// One comment with its replies, as presented to readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadNode {
    pub message_id: CommentId,
    pub author_id: AuthorId,
    pub post_id: PostId,
    pub message: String,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
    pub parent_id: Option<CommentId>,
    pub replies: Vec<ThreadNode>,
}

impl ThreadNode {
    fn new(comment: Comment, replies: Vec<ThreadNode>) -> Self {
        Self {
            message_id: comment.id,
            author_id: comment.author_id,
            post_id: comment.post_id,
            message: comment.message,
            created_on: comment.created_on,
            updated_on: comment.updated_on,
            parent_id: comment.parent_id,
            replies,
        }
    }

    /// Number of nodes in this subtree, self included.
    pub fn size(&self) -> usize {
        let mut total = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            total += 1;
            stack.extend(node.replies.iter());
        }
        total
    }
}

/// Build the reply forest of a post from all of its rows.
///
/// Roots come out in creation order, and so do the replies under each node.
pub fn build_forest(rows: Vec<Comment>) -> Vec<ThreadNode> {
    assemble(rows, |comment| comment.parent_id.is_none())
}

/// Build the subtree rooted at `root_id` from that comment's row plus its
/// descendants' rows.
pub fn build_subtree(root_id: CommentId, rows: Vec<Comment>) -> Option<ThreadNode> {
    assemble(rows, |comment| comment.id == root_id).pop()
}

// Rows are walked deepest-path-first, so every node's replies are complete
// before the node itself is built. No recursion, no shared references.
fn assemble<F>(mut rows: Vec<Comment>, is_top: F) -> Vec<ThreadNode>
where
    F: Fn(&Comment) -> bool,
{
    rows.sort_by(|a, b| a.tree_path.as_str().cmp(b.tree_path.as_str()));

    let present: HashSet<CommentId> = rows.iter().map(|c| c.id).collect();
    let mut pending: HashMap<CommentId, Vec<ThreadNode>> = HashMap::new();
    let mut tops = Vec::new();

    for comment in rows.into_iter().rev() {
        let mut replies = pending.remove(&comment.id).unwrap_or_default();
        replies.reverse();

        let top = is_top(&comment);
        let parent_id = comment.parent_id;
        let node = ThreadNode::new(comment, replies);

        match parent_id {
            _ if top => tops.push(node),
            Some(parent_id) if present.contains(&parent_id) => {
                pending.entry(parent_id).or_default().push(node);
            }
            _ => warn!(
                "Dropping comment {} from thread: parent {:?} is not part of it",
                node.message_id, parent_id
            ),
        }
    }

    tops.reverse();
    tops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::path::TreePath;
    use chrono::TimeZone;

    fn comment(id: CommentId, parent: Option<&Comment>) -> Comment {
        let created_on = Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap();
        Comment {
            id,
            post_id: 7,
            author_id: 100 + id,
            message: format!("message {}", id),
            parent_id: parent.map(|p| p.id),
            last_child_id: None,
            tree_path: TreePath::assign(id, parent.map(|p| &p.tree_path)),
            created_on,
            updated_on: created_on,
        }
    }

    fn ids(nodes: &[ThreadNode]) -> Vec<CommentId> {
        nodes.iter().map(|n| n.message_id).collect()
    }

    #[test]
    fn test_forest_mirrors_parent_edges() {
        let r1 = comment(1, None);
        let a = comment(2, Some(&r1));
        let r2 = comment(3, None);
        let b = comment(4, Some(&r1));
        let a1 = comment(5, Some(&a));
        let c = comment(6, Some(&r2));

        // Input order is irrelevant.
        let forest = build_forest(vec![c, a1, r2, b, a, r1]);

        assert_eq!(ids(&forest), vec![1, 3]);
        assert_eq!(ids(&forest[0].replies), vec![2, 4]);
        assert_eq!(ids(&forest[0].replies[0].replies), vec![5]);
        assert!(forest[0].replies[1].replies.is_empty());
        assert_eq!(ids(&forest[1].replies), vec![6]);
        assert!(forest.iter().all(|n| n.parent_id.is_none()));
        assert_eq!(forest.iter().map(ThreadNode::size).sum::<usize>(), 6);
    }

    #[test]
    fn test_empty_post_has_empty_forest() {
        assert!(build_forest(Vec::new()).is_empty());
    }

    #[test]
    fn test_orphans_are_dropped() {
        let r1 = comment(1, None);
        let gone = comment(2, Some(&r1));
        let orphan = comment(3, Some(&gone));

        let forest = build_forest(vec![r1, orphan]);
        assert_eq!(forest.len(), 1);
        assert!(forest[0].replies.is_empty());
    }

    #[test]
    fn test_subtree_from_inner_node() {
        let r1 = comment(1, None);
        let a = comment(2, Some(&r1));
        let a1 = comment(3, Some(&a));
        let a2 = comment(4, Some(&a));
        let a1x = comment(5, Some(&a1));

        let node = build_subtree(2, vec![a2, a1x, a, a1]).unwrap();
        assert_eq!(node.message_id, 2);
        assert_eq!(node.parent_id, Some(1));
        assert_eq!(ids(&node.replies), vec![3, 4]);
        assert_eq!(ids(&node.replies[0].replies), vec![5]);
        assert_eq!(node.size(), 4);
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let mut rows = vec![comment(1, None)];
        for id in 2..=1_000 {
            let parent = rows.last().cloned();
            rows.push(comment(id, parent.as_ref()));
        }
        let forest = build_forest(rows);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].size(), 1_000);
    }
}
