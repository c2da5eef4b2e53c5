// Services - business operations above the storage layer

pub mod comment_service;

pub use comment_service::CommentService;
