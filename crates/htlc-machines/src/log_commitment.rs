use std::sync::{Mutex, MutexGuard};

use htlc_audit::AuditEvent;
use htlc_store::{CommitmentStore, InMemoryCommitmentStore};
use htlc_types::{Address, CommitmentId, Digest, LogTerms, Secret, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::environment::{rejected, Environment};
use crate::error::{MachineError, MachineResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogState {
    #[default]
    Created,
    Verified,
}

impl LogState {
    fn verify(&mut self, id: &CommitmentId) -> MachineResult<()> {
        match self {
            Self::Created => {
                *self = Self::Verified;
                Ok(())
            }
            Self::Verified => Err(MachineError::AlreadyVerified(*id)),
        }
    }
}

/// Stored state of one log commitment. No value is attached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub locker: Address,
    pub claimant: Address,
    pub hashlock: Digest,
    pub message_digest: Digest,
    pub deadline: Timestamp,
    pub state: LogState,
}

impl LogRecord {
    pub fn terms(&self) -> LogTerms {
        LogTerms {
            locker: self.locker,
            claimant: self.claimant,
            hashlock: self.hashlock,
            message_digest: self.message_digest,
            deadline: self.deadline,
        }
    }

    pub fn exists(&self) -> bool {
        !self.locker.is_null()
    }

    pub fn is_verified(&self) -> bool {
        self.state == LogState::Verified
    }
}

/// Commitment to a message, checked by its claimant.
///
/// The hashlock is carried for off-machine reference. [`verify`] only
/// looks at the message digest, and [`check_secret`] only looks at the
/// hashlock; neither gates the other.
///
/// [`verify`]: LogCommitmentMachine::verify
/// [`check_secret`]: LogCommitmentMachine::check_secret
pub struct LogCommitmentMachine<S = InMemoryCommitmentStore<LogRecord>> {
    env: Environment,
    store: S,
    tx: Mutex<()>,
}

impl LogCommitmentMachine {
    pub fn new(env: Environment) -> Self {
        Self::with_store(env, InMemoryCommitmentStore::new())
    }
}

impl<S: CommitmentStore<LogRecord>> LogCommitmentMachine<S> {
    pub fn with_store(env: Environment, store: S) -> Self {
        Self {
            env,
            store,
            tx: Mutex::new(()),
        }
    }

    pub fn create(
        &self,
        caller: Address,
        claimant: Address,
        hashlock: Digest,
        message_digest: Digest,
        deadline: Timestamp,
    ) -> MachineResult<CommitmentId> {
        let _tx = self.begin()?;
        self.create_in(caller, claimant, hashlock, message_digest, deadline)
            .inspect_err(|e| rejected("log", "create", e))
    }

    /// Mark the commitment verified by presenting the committed message.
    pub fn verify(&self, caller: Address, id: &CommitmentId, message: &[u8]) -> MachineResult<()> {
        let _tx = self.begin()?;
        self.verify_in(caller, id, message)
            .inspect_err(|e| rejected("log", "verify", e))
    }

    /// Check a candidate preimage against the stored hashlock.
    ///
    /// Read-only: nothing is recorded and the verification state is untouched.
    pub fn check_secret(&self, id: &CommitmentId, secret: &Secret) -> MachineResult<()> {
        let record = self.load(id)?;
        if self.env.algorithm().verify(secret.as_bytes(), &record.hashlock) {
            Ok(())
        } else {
            Err(MachineError::SecretMismatch(*id))
        }
    }

    pub fn get(&self, id: &CommitmentId) -> LogRecord {
        match self.store.get(id) {
            Ok(record) => record.unwrap_or_default(),
            Err(e) => {
                warn!(id = %id.short_id(), error = %e, "log read failed; reporting absent");
                LogRecord::default()
            }
        }
    }

    pub fn find(&self, id: &CommitmentId) -> MachineResult<Option<LogRecord>> {
        Ok(self.store.get(id)?)
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn begin(&self) -> MachineResult<MutexGuard<'_, ()>> {
        self.tx.lock().map_err(|_| MachineError::LockPoisoned)
    }

    fn load(&self, id: &CommitmentId) -> MachineResult<LogRecord> {
        self.store.get(id)?.ok_or(MachineError::NotFound(*id))
    }

    fn create_in(
        &self,
        caller: Address,
        claimant: Address,
        hashlock: Digest,
        message_digest: Digest,
        deadline: Timestamp,
    ) -> MachineResult<CommitmentId> {
        let now = self.env.now();
        self.env.check_deadline(deadline, now)?;
        if claimant.is_null() {
            return Err(MachineError::InvalidClaimant);
        }

        let terms = LogTerms {
            locker: caller,
            claimant,
            hashlock,
            message_digest,
            deadline,
        };
        let id = self.env.deriver().log_id(&terms);
        let record = LogRecord {
            locker: caller,
            claimant,
            hashlock,
            message_digest,
            deadline,
            state: LogState::Created,
        };
        self.store.insert(id, record)?;

        self.env.emit(now, AuditEvent::LogCreated { id, terms });
        info!(id = %id.short_id(), locker = %caller, claimant = %claimant, "log commitment created");
        Ok(id)
    }

    fn verify_in(&self, caller: Address, id: &CommitmentId, message: &[u8]) -> MachineResult<()> {
        let mut record = self.load(id)?;
        if caller != record.claimant {
            return Err(MachineError::NotClaimant { id: *id, caller });
        }
        if record.is_verified() {
            return Err(MachineError::AlreadyVerified(*id));
        }
        if !self.env.algorithm().verify(message, &record.message_digest) {
            return Err(MachineError::MessageMismatch(*id));
        }

        let now = self.env.now();
        record.state.verify(id)?;
        self.store.replace(id, record)?;

        self.env.emit(
            now,
            AuditEvent::LogVerified {
                id: *id,
                claimant: caller,
                message: message.to_vec(),
            },
        );
        info!(id = %id.short_id(), claimant = %caller, len = message.len(), "log commitment verified");
        Ok(())
    }
}

impl<S> std::fmt::Debug for LogCommitmentMachine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogCommitmentMachine")
            .field("env", &self.env)
            .finish_non_exhaustive()
    }
}
