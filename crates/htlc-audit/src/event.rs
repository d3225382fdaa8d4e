use std::fmt;

use htlc_types::{Address, Amount, BatchTerms, CommitmentId, Digest, EscrowTerms, LogTerms, Secret};
use serde::{Deserialize, Serialize};

/// Outcome of one successful mutating call.
///
/// Creation events publish the full terms, so the identifier can be
/// recomputed without reading storage. `BatchCreated` is the only place the
/// raw item list ever appears.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEvent {
    EscrowCreated {
        id: CommitmentId,
        terms: EscrowTerms,
        amount: Amount,
    },
    EscrowWithdrawn {
        id: CommitmentId,
        claimant: Address,
        secret: Secret,
        amount: Amount,
    },
    EscrowRefunded {
        id: CommitmentId,
        locker: Address,
        amount: Amount,
    },
    LogCreated {
        id: CommitmentId,
        terms: LogTerms,
    },
    LogVerified {
        id: CommitmentId,
        claimant: Address,
        #[serde(with = "hex_bytes")]
        message: Vec<u8>,
    },
    BatchCreated {
        id: CommitmentId,
        terms: BatchTerms,
        items: Vec<Digest>,
    },
    BatchReleased {
        id: CommitmentId,
        locker: Address,
        aggregate_digest: Digest,
    },
    BatchItemsVerified {
        id: CommitmentId,
        verifier: Address,
    },
}

/// Discriminant of an [`AuditEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    EscrowCreated,
    EscrowWithdrawn,
    EscrowRefunded,
    LogCreated,
    LogVerified,
    BatchCreated,
    BatchReleased,
    BatchItemsVerified,
}

impl AuditEvent {
    /// Identifier of the record this event refers to.
    pub fn id(&self) -> &CommitmentId {
        match self {
            Self::EscrowCreated { id, .. }
            | Self::EscrowWithdrawn { id, .. }
            | Self::EscrowRefunded { id, .. }
            | Self::LogCreated { id, .. }
            | Self::LogVerified { id, .. }
            | Self::BatchCreated { id, .. }
            | Self::BatchReleased { id, .. }
            | Self::BatchItemsVerified { id, .. } => id,
        }
    }

    /// Address of the caller that caused the event.
    pub fn actor(&self) -> &Address {
        match self {
            Self::EscrowCreated { terms, .. } => &terms.locker,
            Self::LogCreated { terms, .. } => &terms.locker,
            Self::BatchCreated { terms, .. } => &terms.locker,
            Self::EscrowWithdrawn { claimant, .. } | Self::LogVerified { claimant, .. } => claimant,
            Self::EscrowRefunded { locker, .. } | Self::BatchReleased { locker, .. } => locker,
            Self::BatchItemsVerified { verifier, .. } => verifier,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::EscrowCreated { .. } => EventKind::EscrowCreated,
            Self::EscrowWithdrawn { .. } => EventKind::EscrowWithdrawn,
            Self::EscrowRefunded { .. } => EventKind::EscrowRefunded,
            Self::LogCreated { .. } => EventKind::LogCreated,
            Self::LogVerified { .. } => EventKind::LogVerified,
            Self::BatchCreated { .. } => EventKind::BatchCreated,
            Self::BatchReleased { .. } => EventKind::BatchReleased,
            Self::BatchItemsVerified { .. } => EventKind::BatchItemsVerified,
        }
    }
}

impl EventKind {
    /// Returns `true` for the three creation events.
    pub fn is_creation(&self) -> bool {
        matches!(
            self,
            Self::EscrowCreated | Self::LogCreated | Self::BatchCreated
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::EscrowCreated => "EscrowCreated",
            Self::EscrowWithdrawn => "EscrowWithdrawn",
            Self::EscrowRefunded => "EscrowRefunded",
            Self::LogCreated => "LogCreated",
            Self::LogVerified => "LogVerified",
            Self::BatchCreated => "BatchCreated",
            Self::BatchReleased => "BatchReleased",
            Self::BatchItemsVerified => "BatchItemsVerified",
        };
        write!(f, "{s}")
    }
}

/// Variable-length byte strings as plain hex in exported trails.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
