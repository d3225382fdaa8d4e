//! Hashing primitives shared by the commitment machines and by any off-chain
//! party reconciling their audit trail.
//!
//! Every digest in the system is computed over the one canonical packed
//! encoding defined in [`packing`]: addresses are 20 raw bytes, digests are
//! 32 raw bytes, integers and list lengths are 32-byte big-endian words.
//! Nothing is separated or tagged, so an identifier can be recomputed from
//! the published creation parameters alone.
//!
//! All hashing goes through the `blake3` and `sha2` crates.

pub mod aggregate;
pub mod chain;
pub mod hasher;
pub mod identifier;
pub mod packing;

pub use aggregate::{AggregateHasher, AggregateMismatch};
pub use chain::{ChainError, ChainLinked, HashChainVerifier};
pub use hasher::{HashAlgorithm, HasherError, StreamHasher};
pub use identifier::IdentifierDeriver;
pub use packing::PackedEncoder;
