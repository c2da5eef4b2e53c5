// Threaded comments server

use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use comment_threads::{
    app_state::AppState,
    comment_interface::create_comment_router,
    config::Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize application state
    let app_state = AppState::new(config.clone()).await?;

    let app = Router::new()
        .nest("/api/v1", create_comment_router(app_state.comment_service.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.server_address();
    info!("Comment server starting on http://{}", addr);
    info!("  GET    /api/v1/posts/{{post_id}}/comments          - Threaded comments of a post");
    info!("  POST   /api/v1/comments/reply                    - Add a comment or reply");
    info!("  PATCH  /api/v1/comments/edit-message/{{id}}        - Edit own comment");
    info!("  DELETE /api/v1/comments/delete-message/{{id}}      - Delete own comment subtree");
    info!("  GET    /api/v1/comments/{{id}}[/ancestors|/thread] - Single comment views");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
