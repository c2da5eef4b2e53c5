// Tree Maintainer - materialized-path comment trees over a flat store

pub mod consistency;  // Invariant checks over a post's rows
pub mod last_reply;   // Last-Reply Tracker
pub mod path;         // Path Assigner
pub mod thread;       // Thread Reconstructor

pub use consistency::check_invariants;
pub use last_reply::LastReplyRepair;
pub use path::{TreePath, MAX_TREE_PATH_LEN, PATH_SEPARATOR};
pub use thread::{build_forest, build_subtree, ThreadNode};
