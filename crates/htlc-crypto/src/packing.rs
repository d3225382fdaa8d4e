use htlc_types::{Address, CommitmentId, Digest, Timestamp};

use crate::hasher::HashAlgorithm;

/// Width of an integer slot (deadlines, list lengths) in bytes.
pub const WORD_LEN: usize = 32;

/// Canonical fixed-width packed encoding.
///
/// Layout per field:
/// ```text
/// address          20 raw bytes
/// digest / item    32 raw bytes
/// integer          32-byte big-endian word (u64 left-padded with zeros)
/// list length      32-byte big-endian word holding the element count
/// ```
///
/// Fields are concatenated with no separators. Because every field has a
/// fixed width and lists carry an explicit length prefix, two different
/// field sequences of the same shape can never produce the same bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackedEncoder {
    buf: Vec<u8>,
}

impl PackedEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size the buffer for `bytes` of output.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            buf: Vec::with_capacity(bytes),
        }
    }

    pub fn address(mut self, address: &Address) -> Self {
        self.buf.extend_from_slice(address.as_bytes());
        self
    }

    pub fn digest(mut self, digest: &Digest) -> Self {
        self.buf.extend_from_slice(digest.as_bytes());
        self
    }

    pub fn id(mut self, id: &CommitmentId) -> Self {
        self.buf.extend_from_slice(id.as_bytes());
        self
    }

    /// Append an unsigned integer as a 32-byte big-endian word.
    pub fn word(mut self, value: u64) -> Self {
        self.buf.extend_from_slice(&[0u8; WORD_LEN - 8]);
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn timestamp(self, ts: &Timestamp) -> Self {
        self.word(ts.as_secs())
    }

    /// Append a list length prefix followed by every element.
    pub fn digest_list(self, items: &[Digest]) -> Self {
        let packed = self.word(items.len() as u64);
        items.iter().fold(packed, |enc, item| enc.digest(item))
    }

    /// Encoded bytes so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Hash the encoded bytes.
    pub fn hash(&self, algorithm: HashAlgorithm) -> Digest {
        algorithm.digest(&self.buf)
    }
}
