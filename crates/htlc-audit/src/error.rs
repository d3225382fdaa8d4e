/// Errors produced by audit log operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("audit log lock poisoned")]
    LockPoisoned,
}

/// Result alias for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
