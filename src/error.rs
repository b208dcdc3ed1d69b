use thiserror::Error;

/// Errors surfaced by the paged store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid paging configuration: {field} - {message}")]
    Configuration {
        field: &'static str,
        message: String,
    },

    #[error("Background write task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
