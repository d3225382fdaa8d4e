use std::fmt;

use crate::error::TypeError;

/// A 32-byte hash output: hashlocks, message digests, aggregate digests and
/// batch items all use this type.
///
/// The all-zero digest is the "absent" sentinel (for example a batch created
/// without an attached message).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Width of an encoded digest in bytes.
    pub const LEN: usize = 32;

    /// The absent digest.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create from a pre-computed hash.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns `true` if this is the absent sentinel.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// `None` for the absent sentinel, `Some(self)` otherwise.
    pub fn non_zero(self) -> Option<Self> {
        if self.is_zero() {
            None
        } else {
            Some(self)
        }
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from 64 hex characters, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        crate::decode_fixed(s).map(Self)
    }
}

crate::impl_hex_serde!(Digest);

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<Digest> for [u8; 32] {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

/// A 32-byte hashlock preimage.
///
/// Until it is revealed by a withdrawal the secret is known only to the
/// parties who set up the exchange; `Debug` therefore prints only a marker.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Secret([u8; 32]);

impl Secret {
    /// Width of an encoded secret in bytes.
    pub const LEN: usize = 32;

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random secret.
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// The raw preimage bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from 64 hex characters, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        crate::decode_fixed(s).map(Self)
    }
}

crate::impl_hex_serde!(Secret);

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

impl From<[u8; 32]> for Secret {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_digest_is_absent() {
        assert!(Digest::ZERO.is_zero());
        assert_eq!(Digest::ZERO.non_zero(), None);
        let d = Digest::from_bytes([7; 32]);
        assert_eq!(d.non_zero(), Some(d));
    }

    #[test]
    fn digest_hex_roundtrip() {
        let d = Digest::from_bytes([0xab; 32]);
        assert_eq!(Digest::from_hex(&d.to_hex()).unwrap(), d);
        assert_eq!(Digest::from_hex(&d.to_string()).unwrap(), d);
        assert_eq!(d.short_hex(), "abababab");
    }

    #[test]
    fn digest_wrong_length_rejected() {
        assert!(matches!(
            Digest::from_hex(&"00".repeat(31)),
            Err(TypeError::InvalidLength {
                expected: 32,
                actual: 31
            })
        ));
        assert!(matches!(
            Digest::from_hex("zz"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn secret_debug_is_redacted() {
        let s = Secret::from_bytes([0x42; 32]);
        assert_eq!(format!("{s:?}"), "Secret(..)");
    }

    #[test]
    fn random_secrets_differ() {
        assert_ne!(Secret::random(), Secret::random());
    }

    #[test]
    fn serde_roundtrip() {
        let d = Digest::from_bytes([3; 32]);
        let json = serde_json::to_string(&d).unwrap();
        let parsed: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, d);

        let s = Secret::from_bytes([9; 32]);
        let json = serde_json::to_string(&s).unwrap();
        let parsed: Secret = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, s);
    }
}
