use std::sync::{Arc, Mutex, MutexGuard};

use htlc_audit::AuditEvent;
use htlc_store::{CommitmentStore, InMemoryCommitmentStore};
use htlc_types::{Address, Amount, CommitmentId, Digest, EscrowTerms, Secret, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::environment::{compensate, rejected, Environment};
use crate::error::{MachineError, MachineResult};
use crate::host::ValueLedger;

/// Lifecycle of a value escrow. `Withdrawn` and `Refunded` are terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowState {
    #[default]
    Created,
    /// The claimant revealed `secret` and received the locked amount.
    Withdrawn { secret: Secret },
    /// The locker reclaimed the amount after the deadline.
    Refunded,
}

impl EscrowState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Withdrawn { .. } => "withdrawn",
            Self::Refunded => "refunded",
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Created)
    }

    /// Move to `next` if the transition is legal from the current state.
    fn advance(&mut self, id: &CommitmentId, next: EscrowState) -> MachineResult<()> {
        match (*self, next) {
            (Self::Created, Self::Withdrawn { .. } | Self::Refunded) => {
                *self = next;
                Ok(())
            }
            (current, _) => Err(MachineError::AlreadyFinal {
                id: *id,
                state: current.name(),
            }),
        }
    }

    fn ensure_open(&self, id: &CommitmentId) -> MachineResult<()> {
        match self {
            Self::Created => Ok(()),
            terminal => Err(MachineError::AlreadyFinal {
                id: *id,
                state: terminal.name(),
            }),
        }
    }
}

/// Stored state of one value escrow.
///
/// The zeroed record (null locker) stands for "absent".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub locker: Address,
    pub claimant: Address,
    pub amount: Amount,
    pub hashlock: Digest,
    pub deadline: Timestamp,
    pub state: EscrowState,
}

impl LockRecord {
    pub fn terms(&self) -> EscrowTerms {
        EscrowTerms {
            locker: self.locker,
            claimant: self.claimant,
            hashlock: self.hashlock,
            deadline: self.deadline,
        }
    }

    pub fn exists(&self) -> bool {
        !self.locker.is_null()
    }

    pub fn is_withdrawn(&self) -> bool {
        matches!(self.state, EscrowState::Withdrawn { .. })
    }

    pub fn is_refunded(&self) -> bool {
        self.state == EscrowState::Refunded
    }

    /// The preimage disclosed by the withdrawal, if there was one.
    pub fn revealed_secret(&self) -> Option<Secret> {
        match self.state {
            EscrowState::Withdrawn { secret } => Some(secret),
            _ => None,
        }
    }
}

/// Hashlock/timelock escrow of value.
///
/// `create` moves value from the locker into custody. It leaves custody
/// either to the claimant (`withdraw` with the preimage of the hashlock, at
/// any time while the escrow is open) or back to the locker (`refund`, once
/// the deadline has passed). Whichever valid call runs first wins.
pub struct ValueEscrowMachine<S = InMemoryCommitmentStore<LockRecord>> {
    env: Environment,
    store: S,
    ledger: Arc<dyn ValueLedger>,
    /// Transaction lock; guards the value currently in custody.
    custody: Mutex<Amount>,
}

impl ValueEscrowMachine {
    /// Machine over a fresh in-memory store.
    pub fn new(env: Environment, ledger: Arc<dyn ValueLedger>) -> Self {
        Self {
            env,
            store: InMemoryCommitmentStore::new(),
            ledger,
            custody: Mutex::new(0),
        }
    }
}

impl<S: CommitmentStore<LockRecord>> ValueEscrowMachine<S> {
    /// Machine over an existing store. Custody is rebuilt from the open
    /// records it already holds.
    pub fn with_store(env: Environment, store: S, ledger: Arc<dyn ValueLedger>) -> MachineResult<Self> {
        let mut custody: Amount = 0;
        for (_, record) in store.records()? {
            if !record.state.is_final() {
                custody = custody.checked_add(record.amount).ok_or_else(|| {
                    MachineError::Custody("open escrows exceed the amount range".into())
                })?;
            }
        }
        debug!(custody, "escrow machine opened");
        Ok(Self {
            env,
            store,
            ledger,
            custody: Mutex::new(custody),
        })
    }

    /// Lock `amount` from `caller` until `claimant` reveals the preimage of
    /// `hashlock` or `deadline` passes.
    pub fn create(
        &self,
        caller: Address,
        claimant: Address,
        hashlock: Digest,
        deadline: Timestamp,
        amount: Amount,
    ) -> MachineResult<CommitmentId> {
        let mut custody = self.begin()?;
        self.create_in(&mut custody, caller, claimant, hashlock, deadline, amount)
            .inspect_err(|e| rejected("escrow", "create", e))
    }

    /// Release the escrow to its claimant by revealing the secret.
    pub fn withdraw(&self, caller: Address, id: &CommitmentId, secret: &Secret) -> MachineResult<()> {
        let mut custody = self.begin()?;
        self.withdraw_in(&mut custody, caller, id, secret)
            .inspect_err(|e| rejected("escrow", "withdraw", e))
    }

    /// Return the escrow to its locker once the deadline has passed.
    pub fn refund(&self, caller: Address, id: &CommitmentId) -> MachineResult<()> {
        let mut custody = self.begin()?;
        self.refund_in(&mut custody, caller, id)
            .inspect_err(|e| rejected("escrow", "refund", e))
    }

    /// The record under `id`, or the zeroed record if there is none.
    pub fn get(&self, id: &CommitmentId) -> LockRecord {
        match self.store.get(id) {
            Ok(record) => record.unwrap_or_default(),
            Err(e) => {
                warn!(id = %id.short_id(), error = %e, "escrow read failed; reporting absent");
                LockRecord::default()
            }
        }
    }

    /// Like [`get`](Self::get), but tells absence apart and surfaces store errors.
    pub fn find(&self, id: &CommitmentId) -> MachineResult<Option<LockRecord>> {
        Ok(self.store.get(id)?)
    }

    /// Sum of the amounts of all open escrows.
    pub fn total_locked(&self) -> MachineResult<Amount> {
        Ok(*self.begin()?)
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn begin(&self) -> MachineResult<MutexGuard<'_, Amount>> {
        self.custody.lock().map_err(|_| MachineError::LockPoisoned)
    }

    fn load(&self, id: &CommitmentId) -> MachineResult<LockRecord> {
        self.store.get(id)?.ok_or(MachineError::NotFound(*id))
    }

    fn create_in(
        &self,
        custody: &mut Amount,
        caller: Address,
        claimant: Address,
        hashlock: Digest,
        deadline: Timestamp,
        amount: Amount,
    ) -> MachineResult<CommitmentId> {
        let now = self.env.now();
        self.env.check_deadline(deadline, now)?;
        if claimant.is_null() {
            return Err(MachineError::InvalidClaimant);
        }

        let terms = EscrowTerms {
            locker: caller,
            claimant,
            hashlock,
            deadline,
        };
        let id = self.env.deriver().escrow_id(&terms);
        if self.store.contains(&id)? {
            return Err(MachineError::AlreadyExists(id));
        }
        let locked = custody
            .checked_add(amount)
            .ok_or_else(|| MachineError::Custody("custody would overflow".into()))?;

        self.ledger.debit(&caller, amount)?;
        let record = LockRecord {
            locker: caller,
            claimant,
            amount,
            hashlock,
            deadline,
            state: EscrowState::Created,
        };
        if let Err(e) = self.store.insert(id, record) {
            compensate("escrow create", self.ledger.credit(&caller, amount));
            return Err(e.into());
        }
        *custody = locked;

        self.env
            .emit(now, AuditEvent::EscrowCreated { id, terms, amount });
        info!(id = %id.short_id(), locker = %caller, claimant = %claimant, amount, deadline = %deadline, "escrow created");
        Ok(id)
    }

    fn withdraw_in(
        &self,
        custody: &mut Amount,
        caller: Address,
        id: &CommitmentId,
        secret: &Secret,
    ) -> MachineResult<()> {
        let mut record = self.load(id)?;
        if caller != record.claimant {
            return Err(MachineError::NotClaimant { id: *id, caller });
        }
        record.state.ensure_open(id)?;
        if !self.env.algorithm().verify(secret.as_bytes(), &record.hashlock) {
            return Err(MachineError::SecretMismatch(*id));
        }

        let remaining = release(*custody, record.amount)?;
        let now = self.env.now();
        record.state.advance(id, EscrowState::Withdrawn { secret: *secret })?;

        self.ledger.credit(&record.claimant, record.amount)?;
        if let Err(e) = self.store.replace(id, record) {
            compensate("escrow withdraw", self.ledger.debit(&record.claimant, record.amount));
            return Err(e.into());
        }
        *custody = remaining;

        self.env.emit(
            now,
            AuditEvent::EscrowWithdrawn {
                id: *id,
                claimant: record.claimant,
                secret: *secret,
                amount: record.amount,
            },
        );
        info!(id = %id.short_id(), claimant = %record.claimant, amount = record.amount, "escrow withdrawn");
        Ok(())
    }

    fn refund_in(&self, custody: &mut Amount, caller: Address, id: &CommitmentId) -> MachineResult<()> {
        let mut record = self.load(id)?;
        if caller != record.locker {
            return Err(MachineError::NotLocker { id: *id, caller });
        }
        record.state.ensure_open(id)?;
        let now = self.env.now();
        if now.is_before(&record.deadline) {
            return Err(MachineError::TooEarly {
                id: *id,
                deadline: record.deadline,
                now,
            });
        }

        let remaining = release(*custody, record.amount)?;
        record.state.advance(id, EscrowState::Refunded)?;

        self.ledger.credit(&record.locker, record.amount)?;
        if let Err(e) = self.store.replace(id, record) {
            compensate("escrow refund", self.ledger.debit(&record.locker, record.amount));
            return Err(e.into());
        }
        *custody = remaining;

        self.env.emit(
            now,
            AuditEvent::EscrowRefunded {
                id: *id,
                locker: record.locker,
                amount: record.amount,
            },
        );
        info!(id = %id.short_id(), locker = %record.locker, amount = record.amount, "escrow refunded");
        Ok(())
    }
}

fn release(custody: Amount, amount: Amount) -> MachineResult<Amount> {
    custody
        .checked_sub(amount)
        .ok_or_else(|| MachineError::Custody(format!("releasing {amount} from custody of {custody}")))
}

impl<S> std::fmt::Debug for ValueEscrowMachine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueEscrowMachine")
            .field("env", &self.env)
            .finish_non_exhaustive()
    }
}
