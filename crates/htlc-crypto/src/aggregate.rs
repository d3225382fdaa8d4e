use htlc_types::Digest;

use crate::hasher::HashAlgorithm;
use crate::packing::PackedEncoder;

/// Commits to an ordered list of 32-byte items with a single digest:
/// `H(len ‖ item₁ ‖ … ‖ itemₙ)`.
///
/// The digest is order-sensitive and the length prefix pins the count, so
/// a verifier holding only `(count, digest)` can check a disclosed list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AggregateHasher {
    algorithm: HashAlgorithm,
}

/// Why a disclosed item list does not match a stored commitment.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AggregateMismatch {
    #[error("item count mismatch: committed {expected}, supplied {actual}")]
    Count { expected: u64, actual: u64 },

    #[error("aggregate digest mismatch: committed {expected}, computed {computed}")]
    Digest { expected: Digest, computed: Digest },
}

impl AggregateHasher {
    pub const fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Aggregate digest of `items` in the given order.
    pub fn aggregate(&self, items: &[Digest]) -> Digest {
        PackedEncoder::with_capacity(32 + items.len() * Digest::LEN)
            .digest_list(items)
            .hash(self.algorithm)
    }

    /// Check a disclosed list against a committed count and digest.
    ///
    /// The count is compared first so that a short or long list is reported
    /// as such without hashing it.
    pub fn verify(
        &self,
        items: &[Digest],
        expected_count: u64,
        expected_digest: &Digest,
    ) -> Result<(), AggregateMismatch> {
        let actual = items.len() as u64;
        if actual != expected_count {
            return Err(AggregateMismatch::Count {
                expected: expected_count,
                actual,
            });
        }
        let computed = self.aggregate(items);
        if computed != *expected_digest {
            return Err(AggregateMismatch::Digest {
                expected: *expected_digest,
                computed,
            });
        }
        Ok(())
    }
}
