use thiserror::Error;

/// Error types for the compute module
#[derive(Error, Debug)]
pub enum ComputeError {
    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// The row is absent or belongs to another user
    #[error("{0}")]
    NotFound(String),

    /// A referenced account or category is absent or belongs to another user
    #[error("{0}")]
    InvalidReference(String),

    /// The operation would violate a uniqueness or reference guard
    #[error("{0}")]
    Conflict(String),

    /// Error from date operations
    #[error("Date error: {0}")]
    Date(String),
}

/// Type alias for Result with ComputeError
pub type Result<T> = std::result::Result<T, ComputeError>;
