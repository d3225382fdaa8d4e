//! Append-only audit trail for the commitment machines.
//!
//! Every successful mutating call emits one [`AuditEvent`]. Events are
//! wrapped in hash-chained [`AuditRecord`]s so that an exported trail can be
//! checked for gaps and tampering, and every event carries enough public
//! data to recompute the identifier it refers to.
//!
//! This crate provides:
//! - The event taxonomy and record framing
//! - The `AuditLog` trait boundary and `InMemoryAuditLog`
//! - Stream validation (sequence, timestamps, hash chain)
//! - `ReconciliationProjection`: rebuild per-identifier state from events
//!   alone, re-deriving identifiers and re-checking every disclosed preimage

pub mod error;
pub mod event;
pub mod memory;
pub mod projection;
pub mod record;
pub mod traits;
pub mod validation;

pub use error::{AuditError, AuditResult};
pub use event::{AuditEvent, EventKind};
pub use memory::InMemoryAuditLog;
pub use projection::{
    EscrowOutcome, ObservedCommitment, ObservedState, ProjectionViolation,
    ProjectionViolationKind, ReconciliationProjection,
};
pub use record::AuditRecord;
pub use traits::AuditLog;
pub use validation::{StreamValidator, ValidationReport, Violation, ViolationKind};
