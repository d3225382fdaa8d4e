//! Public creation parameters of each commitment kind.
//!
//! A set of terms is everything an outside observer needs to recompute the
//! record's identifier. Terms are published in creation audit events and
//! embedded in stored records.

use serde::{Deserialize, Serialize};

use crate::{Address, Digest, Timestamp};

/// Creation parameters of a value escrow.
///
/// The locked amount is deliberately not part of the terms: it does not
/// feed the identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EscrowTerms {
    pub locker: Address,
    pub claimant: Address,
    pub hashlock: Digest,
    pub deadline: Timestamp,
}

/// Creation parameters of a log-only commitment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogTerms {
    pub locker: Address,
    pub claimant: Address,
    pub hashlock: Digest,
    pub message_digest: Digest,
    pub deadline: Timestamp,
}

/// Creation parameters of a batch commitment.
///
/// `message_digest` may be [`Digest::ZERO`] when no message is attached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchTerms {
    pub locker: Address,
    pub claimant: Address,
    pub aggregate_digest: Digest,
    pub message_digest: Digest,
    pub deadline: Timestamp,
}
