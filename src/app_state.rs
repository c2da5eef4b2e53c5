use std::sync::Arc;
use crate::{
    config::Config,
    error::AppResult,
    infrastructure::SqliteDatabase,
    services::CommentService,
};

#[derive(Clone)]
pub struct AppState {
    pub comment_service: CommentService,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        let database = SqliteDatabase::connect(&config.database).await?;
        database.health_check().await?;

        let comment_service = CommentService::new(Arc::new(database));

        Ok(Self {
            comment_service,
            config,
        })
    }
}
