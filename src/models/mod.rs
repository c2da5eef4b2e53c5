// Comment data model - flat rows as the store keeps them

pub mod comment;

pub use comment::{
    current_time_micros, timestamp_from_micros, AuthorId, Comment, CommentId, DeleteOutcome,
    NewComment, PostId, Timestamp,
};
