//! Commitment record storage.
//!
//! A commitment store maps a content-derived [`CommitmentId`] to exactly one
//! record. It is the machines' only persistent state and doubles as an
//! append-only audit ledger.
//!
//! # Storage Backends
//!
//! All backends implement the [`CommitmentStore`] trait:
//!
//! - [`InMemoryCommitmentStore`] -- `HashMap`-based store for tests and embedding
//! - [`JournalCommitmentStore`] -- crash-recoverable append-only journal file
//!
//! # Design Rules
//!
//! 1. An identifier is inserted at most once; a second insert fails.
//! 2. Records are replaced in place by their owning machine, never deleted.
//! 3. The store never interprets record contents.
//! 4. All I/O errors are propagated, never silently ignored.
//!
//! [`CommitmentId`]: htlc_types::CommitmentId

pub mod error;
pub mod journal;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use journal::{JournalCommitmentStore, JournalConfig, SyncMode};
pub use memory::InMemoryCommitmentStore;
pub use traits::CommitmentStore;
