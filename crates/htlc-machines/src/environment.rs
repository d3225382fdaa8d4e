use std::fmt;
use std::sync::Arc;

use htlc_audit::{AuditEvent, AuditLog, AuditRecord, InMemoryAuditLog};
use htlc_crypto::{AggregateHasher, HashAlgorithm, IdentifierDeriver};
use htlc_types::Timestamp;
use tracing::{error, warn};

use crate::config::MachineConfig;
use crate::error::{MachineError, MachineResult, ValueError};
use crate::host::{Clock, SystemClock};

/// What every machine needs from its host: configuration, time and an
/// audit trail.
///
/// Cloning is cheap; machines built from clones of one environment share
/// the clock and append to the same trail.
#[derive(Clone)]
pub struct Environment {
    config: MachineConfig,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditLog>,
}

impl Environment {
    pub fn new(config: MachineConfig, clock: Arc<dyn Clock>, audit: Arc<dyn AuditLog>) -> Self {
        Self {
            config,
            clock,
            audit,
        }
    }

    /// System clock and a fresh in-memory audit trail.
    pub fn in_memory(config: MachineConfig) -> Self {
        Self::new(config, Arc::new(SystemClock), Arc::new(InMemoryAuditLog::new()))
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.config.hash_algorithm
    }

    pub fn deriver(&self) -> IdentifierDeriver {
        IdentifierDeriver::new(self.config.hash_algorithm)
    }

    pub fn aggregator(&self) -> AggregateHasher {
        AggregateHasher::new(self.config.hash_algorithm)
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn audit(&self) -> &Arc<dyn AuditLog> {
        &self.audit
    }

    /// A new deadline must be strictly later than `now + min_lock_seconds`.
    pub(crate) fn check_deadline(&self, deadline: Timestamp, now: Timestamp) -> MachineResult<()> {
        let earliest = now.saturating_add_secs(self.config.min_lock_seconds);
        if deadline.is_after(&earliest) {
            Ok(())
        } else {
            Err(MachineError::InvalidDeadline { deadline, earliest })
        }
    }

    /// Record a committed transition. Called only after the store write, so
    /// an append failure cannot undo the transition; it is logged instead.
    pub(crate) fn emit(&self, now: Timestamp, event: AuditEvent) -> Option<AuditRecord> {
        let id = *event.id();
        match self.audit.append(now, event) {
            Ok(record) => Some(record),
            Err(e) => {
                error!(id = %id.short_id(), error = %e, "audit append failed after commit; trail is missing a record");
                None
            }
        }
    }
}

/// Log a failed call. Failed calls leave no audit record, only this line.
pub(crate) fn rejected(machine: &'static str, op: &'static str, err: &MachineError) {
    warn!(machine, op, kind = %err.kind(), error = %err, "transition rejected");
}

/// Undo a value movement after a failed record write.
pub(crate) fn compensate(op: &'static str, undo: Result<(), ValueError>) {
    if let Err(e) = undo {
        error!(op, error = %e, "value compensation failed; ledger and store disagree");
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("config", &self.config)
            .field("now", &self.clock.now())
            .finish()
    }
}
