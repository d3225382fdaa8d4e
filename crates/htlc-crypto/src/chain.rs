/// Domain tag prepended to every audit record hash.
pub const AUDIT_CHAIN_DOMAIN: &[u8] = b"htlc-audit-v1:";

/// A record that is linked into a hash chain.
pub trait ChainLinked {
    /// The record's own hash.
    fn record_hash(&self) -> [u8; 32];
    /// Hash of the preceding record, `None` for the first one.
    fn prev_hash(&self) -> Option<[u8; 32]>;
    /// Canonical bytes covered by the hash.
    fn payload_bytes(&self) -> Vec<u8>;
}

/// Verifies that a sequence of records forms an unbroken hash chain.
///
/// `hash(n) = BLAKE3("htlc-audit-v1:" ‖ hash(n-1) ‖ payload(n))`, with the
/// previous hash omitted for the first record. The chain always uses BLAKE3
/// regardless of the configured commitment algorithm: it protects the local
/// audit trail, not a cross-ledger commitment.
pub struct HashChainVerifier;

impl HashChainVerifier {
    /// Verify every link and every record hash.
    pub fn verify_chain<R: ChainLinked>(records: &[R]) -> Result<(), ChainError> {
        let mut expected_prev: Option<[u8; 32]> = None;

        for (index, record) in records.iter().enumerate() {
            match (expected_prev, record.prev_hash()) {
                (None, Some(_)) => return Err(ChainError::GenesisHasPrevHash),
                (Some(_), None) => return Err(ChainError::MissingPrevHash { index }),
                (Some(expected), Some(actual)) if expected != actual => {
                    return Err(ChainError::BrokenLink { index });
                }
                _ => {}
            }

            let computed = Self::compute_hash(&record.payload_bytes(), expected_prev);
            if computed != record.record_hash() {
                return Err(ChainError::HashMismatch { index });
            }
            expected_prev = Some(computed);
        }

        Ok(())
    }

    /// Hash a record payload onto the chain.
    pub fn compute_hash(payload: &[u8], prev_hash: Option<[u8; 32]>) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(AUDIT_CHAIN_DOMAIN);
        if let Some(prev) = prev_hash {
            hasher.update(&prev);
        }
        hasher.update(payload);
        *hasher.finalize().as_bytes()
    }
}

/// Errors from chain verification.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("first record has a previous hash")]
    GenesisHasPrevHash,

    #[error("broken link at index {index}: prev_hash does not match")]
    BrokenLink { index: usize },

    #[error("missing prev_hash at index {index}")]
    MissingPrevHash { index: usize },

    #[error("hash mismatch at index {index}: computed hash differs from stored")]
    HashMismatch { index: usize },
}
