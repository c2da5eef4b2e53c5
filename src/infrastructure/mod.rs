// Core infrastructure modules
pub mod database;              // Storage trait and transaction wrapper
pub mod sqlite_database;       // SQLite comment store
pub mod viewer;                // Viewer context
pub mod middleware;            // Viewer context middleware and extractor

// Re-export core infrastructure components
pub use database::{ChildStamp, CommentDatabase, DatabaseTransaction, InsertComment};
pub use sqlite_database::SqliteDatabase;
pub use viewer::ViewerContext;
