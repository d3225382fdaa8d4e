use std::fmt;

use htlc_store::StoreError;
use htlc_types::{Address, Amount, CommitmentId, Timestamp};

/// Failure classification shared by every machine operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input or an unmet condition on the record: deadline, null
    /// claimant, empty or oversized item list, unfunded escrow, a refund
    /// before the deadline, or a message check on a batch with no message.
    PreconditionFailure,
    /// The caller does not hold the role the operation requires.
    AuthorizationFailure,
    /// Duplicate creation or a repeat of a one-shot transition.
    StateConflict,
    /// A supplied secret, message or item list does not match its commitment.
    IntegrityFailure,
    /// The operation requires a record that does not exist.
    NotFound,
    /// Host failure in storage or value ledger bookkeeping.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PreconditionFailure => "PreconditionFailure",
            Self::AuthorizationFailure => "AuthorizationFailure",
            Self::StateConflict => "StateConflict",
            Self::IntegrityFailure => "IntegrityFailure",
            Self::NotFound => "NotFound",
            Self::Internal => "Internal",
        };
        write!(f, "{s}")
    }
}

/// Errors produced by machine operations.
#[derive(Debug, thiserror::Error)]
pub enum MachineError {
    #[error("deadline {deadline} must be later than {earliest}")]
    InvalidDeadline {
        deadline: Timestamp,
        earliest: Timestamp,
    },

    #[error("claimant must not be the null address")]
    InvalidClaimant,

    #[error("batch must contain at least one item")]
    EmptyItems,

    #[error("batch has {count} items; at most {limit} allowed")]
    TooManyItems { count: usize, limit: usize },

    #[error("commitment already exists: {0}")]
    AlreadyExists(CommitmentId),

    #[error("commitment not found: {0}")]
    NotFound(CommitmentId),

    #[error("caller {caller} is not the claimant of {id}")]
    NotClaimant { id: CommitmentId, caller: Address },

    #[error("caller {caller} is not the locker of {id}")]
    NotLocker { id: CommitmentId, caller: Address },

    #[error("escrow {id} is already {state}")]
    AlreadyFinal { id: CommitmentId, state: &'static str },

    #[error("commitment {0} is already verified")]
    AlreadyVerified(CommitmentId),

    #[error("batch {0} is already released")]
    AlreadyReleased(CommitmentId),

    #[error("escrow {id} cannot be refunded before {deadline} (now {now})")]
    TooEarly {
        id: CommitmentId,
        deadline: Timestamp,
        now: Timestamp,
    },

    #[error("secret does not hash to the hashlock of {0}")]
    SecretMismatch(CommitmentId),

    #[error("message does not hash to the message digest of {0}")]
    MessageMismatch(CommitmentId),

    #[error("batch {id} committed {expected} items, {actual} supplied")]
    CountMismatch {
        id: CommitmentId,
        expected: u64,
        actual: u64,
    },

    #[error("items do not hash to the aggregate digest of {0}")]
    DigestMismatch(CommitmentId),

    #[error("batch {0} has no message digest")]
    NoMessageDigest(CommitmentId),

    #[error("value ledger: {0}")]
    Value(#[from] ValueError),

    #[error("custody accounting out of balance: {0}")]
    Custody(String),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("transaction lock poisoned")]
    LockPoisoned,
}

impl MachineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDeadline { .. }
            | Self::InvalidClaimant
            | Self::EmptyItems
            | Self::TooManyItems { .. }
            | Self::TooEarly { .. }
            | Self::NoMessageDigest(_)
            | Self::Value(ValueError::InsufficientFunds { .. }) => ErrorKind::PreconditionFailure,

            Self::NotClaimant { .. } | Self::NotLocker { .. } => ErrorKind::AuthorizationFailure,

            Self::AlreadyExists(_)
            | Self::AlreadyFinal { .. }
            | Self::AlreadyVerified(_)
            | Self::AlreadyReleased(_) => ErrorKind::StateConflict,

            Self::SecretMismatch(_)
            | Self::MessageMismatch(_)
            | Self::CountMismatch { .. }
            | Self::DigestMismatch(_) => ErrorKind::IntegrityFailure,

            Self::NotFound(_) => ErrorKind::NotFound,

            Self::Value(_)
            | Self::Custody(_)
            | Self::Store(_)
            | Self::LockPoisoned => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for MachineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists(id) => Self::AlreadyExists(id),
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

/// Result alias for machine operations.
pub type MachineResult<T> = Result<T, MachineError>;

/// Errors from the host value ledger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("account {account} holds {available}, needs {needed}")]
    InsufficientFunds {
        account: Address,
        needed: Amount,
        available: Amount,
    },

    #[error("balance of {account} would overflow")]
    BalanceOverflow { account: Address },

    #[error("value ledger lock poisoned")]
    LockPoisoned,
}

/// Errors loading a [`MachineConfig`].
///
/// [`MachineConfig`]: crate::MachineConfig
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Parse(String),
}
