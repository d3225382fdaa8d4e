//! Conditional-release commitment state machines.
//!
//! Three machines share one identifier scheme, one store abstraction and one
//! audit trail:
//!
//! - [`ValueEscrowMachine`] -- custodies value; released to the claimant on
//!   secret reveal, or returned to the locker after the deadline
//! - [`LogCommitmentMachine`] -- no custody; commits to a hashlock and an
//!   independent message digest, and lets the claimant verify the message
//! - [`BatchAggregationMachine`] -- commits to an ordered item list through
//!   one aggregate digest, discloses it on release, and lets anyone
//!   re-verify the list and an attached message
//!
//! # Transition Rules
//!
//! 1. Every mutating call runs under the machine's transaction lock, so
//!    transitions on any record are totally ordered.
//! 2. Guards run role → state → time/integrity; the first failing guard
//!    names the error.
//! 3. A failed call leaves no trace in the store, the value ledger or the
//!    audit trail. The record write commits a transition; the audit record
//!    is appended after it, and an append failure is logged with `error!`
//!    without failing the call.
//! 4. Terminal states are final: every later mutating call fails.
//!
//! The host supplies time ([`Clock`]) and value movement ([`ValueLedger`]).

pub mod batch;
pub mod config;
pub mod environment;
pub mod error;
pub mod escrow;
pub mod host;
pub mod log_commitment;

pub use batch::{BatchAggregationMachine, BatchRecord, Disclosure, Verification};
pub use config::MachineConfig;
pub use environment::Environment;
pub use error::{ConfigError, ErrorKind, MachineError, MachineResult, ValueError};
pub use escrow::{EscrowState, LockRecord, ValueEscrowMachine};
pub use host::{Clock, InMemoryValueLedger, ManualClock, SystemClock, ValueLedger};
pub use log_commitment::{LogCommitmentMachine, LogRecord, LogState};
