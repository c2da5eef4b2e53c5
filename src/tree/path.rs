// Path Assigner - materialized root-to-self paths for comments

use serde::{Serialize, Serializer};
use std::fmt;

use crate::error::{AppError, AppResult};
use crate::models::CommentId;

pub const PATH_SEPARATOR: char = ',';

/// Width each id is zero-padded to, so lexicographic order matches numeric order.
pub const SEGMENT_WIDTH: usize = 10;

/// Longest path the store accepts.
pub const MAX_TREE_PATH_LEN: usize = 500;

/// Zero-padded id segments joined by [`PATH_SEPARATOR`], root first.
///
/// A path is written once, when its comment is created, and never changes
/// afterwards. Subtree reads and cascading deletes rely on that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreePath {
    raw: String,
    ids: Vec<CommentId>,
}

fn zero_pad(id: CommentId) -> String {
    format!("{:0width$}", id, width = SEGMENT_WIDTH)
}

impl TreePath {
    /// Path for a freshly inserted comment. Ids wider than [`SEGMENT_WIDTH`]
    /// keep every digit.
    pub fn assign(id: CommentId, parent: Option<&TreePath>) -> Self {
        match parent {
            Some(parent) => {
                let mut ids = parent.ids.clone();
                ids.push(id);
                Self {
                    raw: format!("{}{}{}", parent.raw, PATH_SEPARATOR, zero_pad(id)),
                    ids,
                }
            }
            None => Self {
                raw: zero_pad(id),
                ids: vec![id],
            },
        }
    }

    /// Parse a path read back from storage.
    pub fn parse(raw: impl Into<String>) -> AppResult<Self> {
        let raw = raw.into();
        let ids = raw
            .split(PATH_SEPARATOR)
            .map(|segment| {
                if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                segment.parse::<CommentId>().ok()
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| AppError::Internal(format!("Malformed tree path {:?}", raw)))?;

        Ok(Self { raw, ids })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Whether the path still fits in the stored column.
    pub fn fits(&self) -> bool {
        self.raw.len() <= MAX_TREE_PATH_LEN
    }

    /// Ids along the path, root first, self last.
    pub fn segments(&self) -> &[CommentId] {
        &self.ids
    }

    pub fn root_id(&self) -> CommentId {
        self.ids[0]
    }

    pub fn ancestor_ids(&self) -> Vec<CommentId> {
        self.ids[..self.ids.len() - 1].to_vec()
    }

    /// Zero for roots.
    pub fn depth(&self) -> usize {
        self.ids.len() - 1
    }

    /// Half-open string range `[lower, upper)` holding exactly the strict
    /// descendants of this path. `-` is the byte right after `,`.
    pub fn descendant_range(&self) -> (String, String) {
        (format!("{},", self.raw), format!("{}-", self.raw))
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for TreePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_path_is_padded_id() {
        let path = TreePath::assign(42, None);
        assert_eq!(path.as_str(), "0000000042");
        assert_eq!(path.depth(), 0);
        assert_eq!(path.root_id(), 42);
        assert!(path.ancestor_ids().is_empty());
    }

    #[test]
    fn test_child_path_extends_parent() {
        let root = TreePath::assign(1, None);
        let child = TreePath::assign(7, Some(&root));
        let grandchild = TreePath::assign(300, Some(&child));

        assert_eq!(child.as_str(), "0000000001,0000000007");
        assert_eq!(grandchild.as_str(), "0000000001,0000000007,0000000300");
        assert_eq!(grandchild.segments(), &[1, 7, 300]);
        assert_eq!(grandchild.ancestor_ids(), vec![1, 7]);
        assert_eq!(grandchild.root_id(), 1);
        assert_eq!(grandchild.depth(), 2);
    }

    #[test]
    fn test_wide_ids_are_not_truncated() {
        let path = TreePath::assign(12_345_678_901, None);
        assert_eq!(path.as_str(), "12345678901");
    }

    #[test]
    fn test_parse_round_trips_assigned_paths() {
        let root = TreePath::assign(9, None);
        let child = TreePath::assign(10, Some(&root));
        assert_eq!(TreePath::parse(child.as_str()).unwrap(), child);
    }

    #[test]
    fn test_parse_rejects_malformed_paths() {
        for raw in ["", "0000000001,", ",0000000001", "00000000x1", "0000000001,-2"] {
            assert!(
                matches!(TreePath::parse(raw), Err(AppError::Internal(_))),
                "accepted {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_descendant_range_covers_whole_subtree_only() {
        let root = TreePath::assign(1, None);
        let child = TreePath::assign(5, Some(&root));
        let grandchild = TreePath::assign(8, Some(&child));
        let next_root = TreePath::assign(2, None);
        let lookalike = TreePath::assign(10, None);
        let (lower, upper) = root.descendant_range();
        let within = |p: &TreePath| p.as_str() >= lower.as_str() && p.as_str() < upper.as_str();

        assert!(within(&child));
        assert!(within(&grandchild));
        assert!(!within(&root));
        assert!(!within(&next_root));
        assert!(!within(&lookalike));
    }

    #[test]
    fn test_nesting_limit() {
        let mut path = TreePath::assign(1, None);
        let mut depth = 0;
        while path.fits() {
            depth += 1;
            path = TreePath::assign(depth + 1, Some(&path));
        }
        // 10 chars for the root, 11 more for each level.
        assert_eq!(depth, 45);
        assert_eq!(path.len(), 10 + 11 * 45);
    }
}
