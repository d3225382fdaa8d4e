use std::fmt;

use crate::error::TypeError;

/// Identifier of a commitment record.
///
/// Identifiers are content-derived: `htlc-crypto::IdentifierDeriver` hashes
/// the packed creation parameters, so any observer holding those parameters
/// recomputes the same id. There is no counter and no registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitmentId([u8; 32]);

impl CommitmentId {
    /// Wrap a pre-computed hash. Use the deriver for production code.
    pub const fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full hex-encoded string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short identifier (first 8 hex characters).
    pub fn short_id(&self) -> String {
        format!("id:{}", hex::encode(&self.0[..4]))
    }

    /// Parse from 64 hex characters, with or without a `0x` or `id:` prefix.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s.strip_prefix("id:").unwrap_or(s);
        crate::decode_fixed(s).map(Self)
    }
}

crate::impl_hex_serde!(CommitmentId);

impl fmt::Debug for CommitmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitmentId({})", self.short_id())
    }
}

impl fmt::Display for CommitmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}
