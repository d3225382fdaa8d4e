use htlc_types::{BatchTerms, CommitmentId, EscrowTerms, LogTerms};

use crate::hasher::HashAlgorithm;
use crate::packing::PackedEncoder;

/// Derives record identifiers from creation terms.
///
/// ```text
/// escrow = H(locker ‖ claimant ‖ hashlock ‖ deadline)
/// log    = H(locker ‖ claimant ‖ hashlock ‖ messageDigest ‖ deadline)
/// batch  = H(locker ‖ claimant ‖ aggregateDigest ‖ messageDigest ‖ deadline)
/// ```
///
/// The preimages are public so that off-chain tooling can display exactly
/// what was hashed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IdentifierDeriver {
    algorithm: HashAlgorithm,
}

impl IdentifierDeriver {
    pub const fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn escrow_preimage(terms: &EscrowTerms) -> PackedEncoder {
        PackedEncoder::with_capacity(20 + 20 + 32 + 32)
            .address(&terms.locker)
            .address(&terms.claimant)
            .digest(&terms.hashlock)
            .timestamp(&terms.deadline)
    }

    pub fn log_preimage(terms: &LogTerms) -> PackedEncoder {
        PackedEncoder::with_capacity(20 + 20 + 32 + 32 + 32)
            .address(&terms.locker)
            .address(&terms.claimant)
            .digest(&terms.hashlock)
            .digest(&terms.message_digest)
            .timestamp(&terms.deadline)
    }

    pub fn batch_preimage(terms: &BatchTerms) -> PackedEncoder {
        PackedEncoder::with_capacity(20 + 20 + 32 + 32 + 32)
            .address(&terms.locker)
            .address(&terms.claimant)
            .digest(&terms.aggregate_digest)
            .digest(&terms.message_digest)
            .timestamp(&terms.deadline)
    }

    pub fn escrow_id(&self, terms: &EscrowTerms) -> CommitmentId {
        self.finish(Self::escrow_preimage(terms))
    }

    pub fn log_id(&self, terms: &LogTerms) -> CommitmentId {
        self.finish(Self::log_preimage(terms))
    }

    pub fn batch_id(&self, terms: &BatchTerms) -> CommitmentId {
        self.finish(Self::batch_preimage(terms))
    }

    fn finish(&self, preimage: PackedEncoder) -> CommitmentId {
        CommitmentId::from_hash(*preimage.hash(self.algorithm).as_bytes())
    }
}
