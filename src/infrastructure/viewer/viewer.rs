use crate::error::{AppError, AppResult};
use crate::models::AuthorId;

/// Request-scoped identity: who is acting, and under which request id.
#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub author_id: Option<AuthorId>,
    pub request_id: String,
}

impl ViewerContext {
    pub fn author(author_id: AuthorId, request_id: String) -> Self {
        ViewerContext {
            author_id: Some(author_id),
            request_id,
        }
    }

    pub fn anonymous(request_id: String) -> Self {
        ViewerContext {
            author_id: None,
            request_id,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.author_id.is_some()
    }

    /// The acting author, or `Unauthorized` for anonymous viewers.
    pub fn require_author(&self) -> AppResult<AuthorId> {
        self.author_id
            .ok_or_else(|| AppError::Unauthorized("An author is required".to_string()))
    }
}
