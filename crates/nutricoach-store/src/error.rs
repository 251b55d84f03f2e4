//! Error types for NutriCoach storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// A stored value could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// The caller passed a value the operation cannot accept.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<nutricoach_core::CoreError> for StoreError {
    fn from(err: nutricoach_core::CoreError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}
