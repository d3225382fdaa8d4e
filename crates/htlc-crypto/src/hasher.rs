use std::fmt;
use std::str::FromStr;

use htlc_types::Digest;
use serde::{Deserialize, Serialize};
use sha2::Digest as _;

/// The one-way hash behind every commitment digest.
///
/// All parties that derive or reconcile identifiers must agree on the
/// algorithm; it is part of the machine configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// BLAKE3 with its default 32-byte output.
    #[default]
    Blake3,
    /// SHA-256, for hashlocks shared with SHA-256 based ledgers.
    Sha256,
}

impl HashAlgorithm {
    /// Hash a byte string in one shot.
    pub fn digest(&self, data: &[u8]) -> Digest {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize()
    }

    /// Start an incremental hash.
    pub fn hasher(&self) -> StreamHasher {
        match self {
            Self::Blake3 => StreamHasher::Blake3(Box::new(blake3::Hasher::new())),
            Self::Sha256 => StreamHasher::Sha256(sha2::Sha256::new()),
        }
    }

    /// Returns `true` if `data` hashes to `expected`.
    pub fn verify(&self, data: &[u8], expected: &Digest) -> bool {
        self.digest(data) == *expected
    }

    /// Lowercase algorithm name as used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Blake3 => "blake3",
            Self::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = HasherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blake3" => Ok(Self::Blake3),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            other => Err(HasherError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Incremental hasher for either algorithm.
pub enum StreamHasher {
    Blake3(Box<blake3::Hasher>),
    Sha256(sha2::Sha256),
}

impl StreamHasher {
    /// Feed more bytes.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Blake3(h) => {
                h.update(data);
            }
            Self::Sha256(h) => h.update(data),
        }
    }

    /// Finish and return the 32-byte digest.
    pub fn finalize(self) -> Digest {
        match self {
            Self::Blake3(h) => Digest::from_bytes(*h.finalize().as_bytes()),
            Self::Sha256(h) => {
                let out = h.finalize();
                let mut bytes = [0u8; 32];
                bytes.copy_from_slice(&out);
                Digest::from_bytes(bytes)
            }
        }
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("unknown hash algorithm: {0} (expected blake3 or sha256)")]
    UnknownAlgorithm(String),
}
