// Comment HTTP interface - routes and handlers over CommentService

use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{delete, get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppResult,
    infrastructure::middleware::{viewer_context_middleware, Vc},
    models::{Comment, CommentId, NewComment, PostId},
    services::CommentService,
    tree::ThreadNode,
};

// HTTP Request/Response types
#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub post_id: Option<PostId>,
    #[serde(default)]
    pub message: String,
    pub parent_id: Option<CommentId>,
}

#[derive(Debug, Deserialize)]
pub struct EditCommentRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ThreadResponse {
    pub post_id: PostId,
    pub comments: Vec<ThreadNode>,
}

// HTTP Handlers

pub async fn list_thread_handler(
    State(service): State<CommentService>,
    AxumPath(post_id): AxumPath<PostId>,
) -> AppResult<Json<ThreadResponse>> {
    let comments = service.list_thread(post_id).await?;
    Ok(Json(ThreadResponse { post_id, comments }))
}

pub async fn create_comment_handler(
    State(service): State<CommentService>,
    vc: Vc,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let author_id = vc.require_author()?;
    let comment = service
        .create_comment(NewComment {
            post_id: req.post_id,
            author_id,
            message: req.message,
            parent_id: req.parent_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn edit_comment_handler(
    State(service): State<CommentService>,
    vc: Vc,
    AxumPath(comment_id): AxumPath<CommentId>,
    Json(req): Json<EditCommentRequest>,
) -> AppResult<Json<Comment>> {
    let author_id = vc.require_author()?;
    let comment = service
        .edit_comment(comment_id, author_id, req.message)
        .await?;
    Ok(Json(comment))
}

pub async fn delete_comment_handler(
    State(service): State<CommentService>,
    vc: Vc,
    AxumPath(comment_id): AxumPath<CommentId>,
) -> AppResult<StatusCode> {
    let author_id = vc.require_author()?;
    service.delete_comment(comment_id, author_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_comment_handler(
    State(service): State<CommentService>,
    AxumPath(comment_id): AxumPath<CommentId>,
) -> AppResult<Json<Comment>> {
    Ok(Json(service.get_comment(comment_id).await?))
}

pub async fn ancestors_handler(
    State(service): State<CommentService>,
    AxumPath(comment_id): AxumPath<CommentId>,
) -> AppResult<Json<Vec<Comment>>> {
    Ok(Json(service.ancestors(comment_id).await?))
}

pub async fn subtree_handler(
    State(service): State<CommentService>,
    AxumPath(comment_id): AxumPath<CommentId>,
) -> AppResult<Json<ThreadNode>> {
    Ok(Json(service.subtree(comment_id).await?))
}

pub fn create_comment_router(service: CommentService) -> Router {
    Router::new()
        // Thread reads
        .route("/posts/{post_id}/comments", get(list_thread_handler))
        .route("/comments/{id}", get(get_comment_handler))
        .route("/comments/{id}/ancestors", get(ancestors_handler))
        .route("/comments/{id}/thread", get(subtree_handler))

        // Author writes
        .route("/comments/reply", post(create_comment_handler))
        .route("/comments/edit-message/{id}", patch(edit_comment_handler))
        .route("/comments/delete-message/{id}", delete(delete_comment_handler))

        .layer(middleware::from_fn(viewer_context_middleware))
        .with_state(service)
}
