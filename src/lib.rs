// Threaded comments - materialized-path comment trees over SQLite

// Comment tree maintenance: paths, last-reply pointers, thread reconstruction
pub mod tree;

// Comment rows and inputs
pub mod models;

// Storage, viewer context and request middleware
pub mod infrastructure;

// Comment operations, one transaction per write
pub mod services;

// HTTP surface
pub mod comment_interface;

// Common utilities
pub mod app_state;
pub mod config;
pub mod error;

// Re-exports for convenience
pub use error::{AppError, AppResult};
