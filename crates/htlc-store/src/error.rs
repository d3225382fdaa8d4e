use htlc_types::CommitmentId;

/// Errors from commitment store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record already occupies this identifier.
    #[error("record already exists: {0}")]
    AlreadyExists(CommitmentId),

    /// No record is stored under this identifier.
    #[error("record not found: {0}")]
    NotFound(CommitmentId),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
