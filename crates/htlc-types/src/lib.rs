//! Foundation types for hashlock/timelock commitments.
//!
//! Every value that participates in identifier derivation has a fixed width
//! so that the packed encoding in `htlc-crypto` is unambiguous.
//!
//! # Key Types
//!
//! - [`Address`] -- 20-byte actor address; all zeros is the null address
//! - [`Digest`] -- 32-byte hash output; all zeros means "absent"
//! - [`Secret`] -- 32-byte hashlock preimage
//! - [`CommitmentId`] -- 32-byte identifier derived from creation parameters
//! - [`Timestamp`] -- unix seconds supplied by the host clock
//! - [`Amount`] -- quantity of value held in escrow
//! - [`EscrowTerms`], [`LogTerms`], [`BatchTerms`] -- public creation parameters

pub mod address;
pub mod digest;
pub mod error;
pub mod id;
pub mod temporal;
pub mod terms;

pub use address::Address;
pub use digest::{Digest, Secret};
pub use error::TypeError;
pub use id::CommitmentId;
pub use temporal::Timestamp;
pub use terms::{BatchTerms, EscrowTerms, LogTerms};

/// Quantity of value locked in an escrow, in the host's smallest unit.
pub type Amount = u128;

/// Decode a hex string (optional `0x` prefix) into a fixed-size array.
pub(crate) fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], TypeError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
    if bytes.len() != N {
        return Err(TypeError::InvalidLength {
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut arr = [0u8; N];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

/// Serialize a fixed-width byte type as a `0x`-prefixed hex string so that
/// exported audit trails stay readable and round-trip through JSON.
macro_rules! impl_hex_serde {
    ($ty:ident) => {
        impl serde::Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&format!("0x{}", self.to_hex()))
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <String as serde::Deserialize>::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use impl_hex_serde;
