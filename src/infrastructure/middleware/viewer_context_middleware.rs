// ViewerContext Middleware - builds the request-scoped viewer and stores it in extensions
// Authentication itself happens upstream; this layer trusts the author header it is given

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::infrastructure::viewer::ViewerContext;
use crate::models::AuthorId;

/// Header carrying the authenticated author's id.
pub const AUTHOR_HEADER: &str = "x-author-id";

/// Header carrying a caller-supplied request id, if any.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// ViewerContext middleware that creates request-scoped viewer context
pub async fn viewer_context_middleware(
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let viewer_context = create_viewer_context(request.headers())?;
    debug!(
        "Request {} acting as author {:?}",
        viewer_context.request_id, viewer_context.author_id
    );

    request.extensions_mut().insert(viewer_context);

    Ok(next.run(request).await)
}

/// Build the viewer from request headers. A missing or non-numeric author
/// header yields an anonymous viewer; a header that is not valid text is a
/// bad request.
fn create_viewer_context(headers: &HeaderMap) -> Result<Arc<ViewerContext>, StatusCode> {
    let request_id = match headers.get(REQUEST_ID_HEADER) {
        Some(value) => value
            .to_str()
            .map_err(|_| StatusCode::BAD_REQUEST)?
            .to_string(),
        None => format!("req-{}", Uuid::new_v4()),
    };

    let author_id = match headers.get(AUTHOR_HEADER) {
        Some(value) => {
            let raw = value.to_str().map_err(|_| StatusCode::BAD_REQUEST)?;
            raw.trim().parse::<AuthorId>().ok().filter(|id| *id > 0)
        }
        None => None,
    };

    let viewer_context = match author_id {
        Some(author_id) => ViewerContext::author(author_id, request_id),
        None => ViewerContext::anonymous(request_id),
    };

    Ok(Arc::new(viewer_context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_author_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHOR_HEADER, HeaderValue::from_static("42"));

        let viewer = create_viewer_context(&headers).unwrap();
        assert!(viewer.is_authenticated());
        assert_eq!(viewer.author_id, Some(42));
        assert!(viewer.request_id.starts_with("req-"));
    }

    #[test]
    fn test_request_id_is_propagated() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("trace-7"));

        let viewer = create_viewer_context(&headers).unwrap();
        assert_eq!(viewer.request_id, "trace-7");
    }

    #[test]
    fn test_unparseable_author_is_anonymous() {
        for raw in ["abc", "-3", "0", ""] {
            let mut headers = HeaderMap::new();
            headers.insert(AUTHOR_HEADER, HeaderValue::from_str(raw).unwrap());

            let viewer = create_viewer_context(&headers).unwrap();
            assert!(!viewer.is_authenticated(), "accepted {:?}", raw);
        }
    }

    #[test]
    fn test_no_headers_is_anonymous() {
        let viewer = create_viewer_context(&HeaderMap::new()).unwrap();
        assert_eq!(viewer.author_id, None);
        assert!(viewer.require_author().is_err());
    }
}
