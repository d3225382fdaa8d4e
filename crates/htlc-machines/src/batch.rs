use std::sync::{Mutex, MutexGuard};

use htlc_audit::AuditEvent;
use htlc_crypto::AggregateMismatch;
use htlc_store::{CommitmentStore, InMemoryCommitmentStore};
use htlc_types::{Address, BatchTerms, CommitmentId, Digest, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::environment::{rejected, Environment};
use crate::error::{MachineError, MachineResult};

/// Whether the locker has published the aggregate digest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disclosure {
    #[default]
    Sealed,
    Released,
}

/// Whether anyone has presented the committed item list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verification {
    #[default]
    Pending,
    Verified,
}

impl Disclosure {
    fn release(&mut self, id: &CommitmentId) -> MachineResult<()> {
        match self {
            Self::Sealed => {
                *self = Self::Released;
                Ok(())
            }
            Self::Released => Err(MachineError::AlreadyReleased(*id)),
        }
    }
}

impl Verification {
    fn verify(&mut self, id: &CommitmentId) -> MachineResult<()> {
        match self {
            Self::Pending => {
                *self = Self::Verified;
                Ok(())
            }
            Self::Verified => Err(MachineError::AlreadyVerified(*id)),
        }
    }
}

/// Stored state of one batch.
///
/// Only the item count and aggregate digest are kept; the items themselves
/// appear once, in the `BatchCreated` audit event. A zero `message_digest`
/// means no message was attached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub locker: Address,
    pub claimant: Address,
    pub item_count: u64,
    pub aggregate_digest: Digest,
    pub message_digest: Digest,
    /// Stored for reference; no operation enforces it.
    pub deadline: Timestamp,
    pub disclosure: Disclosure,
    pub verification: Verification,
}

impl BatchRecord {
    pub fn terms(&self) -> BatchTerms {
        BatchTerms {
            locker: self.locker,
            claimant: self.claimant,
            aggregate_digest: self.aggregate_digest,
            message_digest: self.message_digest,
            deadline: self.deadline,
        }
    }

    pub fn exists(&self) -> bool {
        !self.locker.is_null()
    }

    pub fn is_released(&self) -> bool {
        self.disclosure == Disclosure::Released
    }

    pub fn is_verified(&self) -> bool {
        self.verification == Verification::Verified
    }

    pub fn message_digest(&self) -> Option<Digest> {
        self.message_digest.non_zero()
    }
}

/// Commitment to an ordered list of 32-byte items.
///
/// `release` and `verify_items` are independent one-shot transitions: the
/// locker publishes the aggregate, and the first caller to present the
/// matching list marks the batch verified. [`check_items`] and
/// [`verify_message`] run the same checks without recording anything.
///
/// [`check_items`]: BatchAggregationMachine::check_items
/// [`verify_message`]: BatchAggregationMachine::verify_message
pub struct BatchAggregationMachine<S = InMemoryCommitmentStore<BatchRecord>> {
    env: Environment,
    store: S,
    tx: Mutex<()>,
}

impl BatchAggregationMachine {
    pub fn new(env: Environment) -> Self {
        Self::with_store(env, InMemoryCommitmentStore::new())
    }
}

impl<S: CommitmentStore<BatchRecord>> BatchAggregationMachine<S> {
    pub fn with_store(env: Environment, store: S) -> Self {
        Self {
            env,
            store,
            tx: Mutex::new(()),
        }
    }

    /// Commit to `items` in order. `None` (or a zero digest) attaches no
    /// message.
    pub fn create_batch(
        &self,
        caller: Address,
        claimant: Address,
        items: &[Digest],
        message_digest: Option<Digest>,
        deadline: Timestamp,
    ) -> MachineResult<CommitmentId> {
        let _tx = self.begin()?;
        self.create_in(caller, claimant, items, message_digest.unwrap_or(Digest::ZERO), deadline)
            .inspect_err(|e| rejected("batch", "create_batch", e))
    }

    /// Publish the aggregate digest. Locker only, once.
    pub fn release(&self, caller: Address, id: &CommitmentId) -> MachineResult<()> {
        let _tx = self.begin()?;
        self.release_in(caller, id)
            .inspect_err(|e| rejected("batch", "release", e))
    }

    /// Present the committed item list. Any caller; the first success marks
    /// the batch verified.
    pub fn verify_items(&self, caller: Address, id: &CommitmentId, items: &[Digest]) -> MachineResult<()> {
        let _tx = self.begin()?;
        self.verify_items_in(caller, id, items)
            .inspect_err(|e| rejected("batch", "verify_items", e))
    }

    /// The count and digest check behind `verify_items`, in any state.
    pub fn check_items(&self, id: &CommitmentId, items: &[Digest]) -> MachineResult<()> {
        let record = self.load(id)?;
        self.match_items(id, &record, items)
    }

    /// Check `message` against the attached message digest, in any state.
    pub fn verify_message(&self, id: &CommitmentId, message: &[u8]) -> MachineResult<()> {
        let record = self.load(id)?;
        let expected = record
            .message_digest()
            .ok_or(MachineError::NoMessageDigest(*id))?;
        if self.env.algorithm().verify(message, &expected) {
            Ok(())
        } else {
            Err(MachineError::MessageMismatch(*id))
        }
    }

    pub fn get(&self, id: &CommitmentId) -> BatchRecord {
        match self.store.get(id) {
            Ok(record) => record.unwrap_or_default(),
            Err(e) => {
                warn!(id = %id.short_id(), error = %e, "batch read failed; reporting absent");
                BatchRecord::default()
            }
        }
    }

    pub fn find(&self, id: &CommitmentId) -> MachineResult<Option<BatchRecord>> {
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

    fn load(&self, id: &CommitmentId) -> MachineResult<BatchRecord> {
        self.store.get(id)?.ok_or(MachineError::NotFound(*id))
    }

    fn match_items(&self, id: &CommitmentId, record: &BatchRecord, items: &[Digest]) -> MachineResult<()> {
        self.env
            .aggregator()
            .verify(items, record.item_count, &record.aggregate_digest)
            .map_err(|mismatch| match mismatch {
                AggregateMismatch::Count { expected, actual } => MachineError::CountMismatch {
                    id: *id,
                    expected,
                    actual,
                },
                AggregateMismatch::Digest { .. } => MachineError::DigestMismatch(*id),
            })
    }

    fn create_in(
        &self,
        caller: Address,
        claimant: Address,
        items: &[Digest],
        message_digest: Digest,
        deadline: Timestamp,
    ) -> MachineResult<CommitmentId> {
        if items.is_empty() {
            return Err(MachineError::EmptyItems);
        }
        let limit = self.env.config().max_batch_items;
        if items.len() > limit {
            return Err(MachineError::TooManyItems {
                count: items.len(),
                limit,
            });
        }
        let now = self.env.now();
        self.env.check_deadline(deadline, now)?;
        if claimant.is_null() {
            return Err(MachineError::InvalidClaimant);
        }

        let aggregate_digest = self.env.aggregator().aggregate(items);
        let terms = BatchTerms {
            locker: caller,
            claimant,
            aggregate_digest,
            message_digest,
            deadline,
        };
        let id = self.env.deriver().batch_id(&terms);
        let record = BatchRecord {
            locker: caller,
            claimant,
            item_count: items.len() as u64,
            aggregate_digest,
            message_digest,
            deadline,
            disclosure: Disclosure::Sealed,
            verification: Verification::Pending,
        };
        self.store.insert(id, record)?;

        self.env.emit(
            now,
            AuditEvent::BatchCreated {
                id,
                terms,
                items: items.to_vec(),
            },
        );
        info!(
            id = %id.short_id(),
            locker = %caller,
            claimant = %claimant,
            items = items.len(),
            aggregate = %aggregate_digest.short_hex(),
            "batch created"
        );
        Ok(id)
    }

    fn release_in(&self, caller: Address, id: &CommitmentId) -> MachineResult<()> {
        let mut record = self.load(id)?;
        if caller != record.locker {
            return Err(MachineError::NotLocker { id: *id, caller });
        }
        record.disclosure.release(id)?;

        let now = self.env.now();
        self.store.replace(id, record)?;
        self.env.emit(
            now,
            AuditEvent::BatchReleased {
                id: *id,
                locker: caller,
                aggregate_digest: record.aggregate_digest,
            },
        );
        info!(id = %id.short_id(), aggregate = %record.aggregate_digest, "batch released");
        Ok(())
    }

    fn verify_items_in(&self, caller: Address, id: &CommitmentId, items: &[Digest]) -> MachineResult<()> {
        let mut record = self.load(id)?;
        if record.is_verified() {
            return Err(MachineError::AlreadyVerified(*id));
        }
        self.match_items(id, &record, items)?;
        record.verification.verify(id)?;

        let now = self.env.now();
        self.store.replace(id, record)?;
        self.env.emit(
            now,
            AuditEvent::BatchItemsVerified {
                id: *id,
                verifier: caller,
            },
        );
        info!(id = %id.short_id(), verifier = %caller, items = items.len(), "batch items verified");
        Ok(())
    }
}

impl<S> std::fmt::Debug for BatchAggregationMachine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchAggregationMachine")
            .field("env", &self.env)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use htlc_audit::{AuditLog, InMemoryAuditLog, ObservedState, ReconciliationProjection};
    use htlc_crypto::{AggregateHasher, HashAlgorithm, IdentifierDeriver};
    use htlc_store::{JournalCommitmentStore, JournalConfig};

    use super::*;
    use crate::config::MachineConfig;
    use crate::error::ErrorKind;
    use crate::host::ManualClock;

    const MESSAGE: &[u8] = b"anchor: 3 documents";

    struct Fixture {
        audit: Arc<InMemoryAuditLog>,
        machine: BatchAggregationMachine,
        locker: Address,
        claimant: Address,
        items: Vec<Digest>,
    }

    fn fixture_with(config: MachineConfig) -> Fixture {
        let audit = Arc::new(InMemoryAuditLog::new());
        let env = Environment::new(
            config,
            Arc::new(ManualClock::new(Timestamp::from_secs(10_000))),
            audit.clone(),
        );
        Fixture {
            audit,
            machine: BatchAggregationMachine::new(env),
            locker: Address::from_label("publisher"),
            claimant: Address::from_label("auditor"),
            items: vec![
                Digest::from_bytes([0xa1; 32]),
                Digest::from_bytes([0xb2; 32]),
                Digest::from_bytes([0xc3; 32]),
            ],
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MachineConfig::default())
    }

    fn deadline() -> Timestamp {
        Timestamp::from_secs(20_000)
    }

    impl Fixture {
        fn create(&self) -> CommitmentId {
            self.machine
                .create_batch(
                    self.locker,
                    self.claimant,
                    &self.items,
                    Some(HashAlgorithm::Blake3.digest(MESSAGE)),
                    deadline(),
                )
                .unwrap()
        }
    }

    #[test]
    fn three_item_batch_lifecycle() {
        let fx = fixture();
        let id = fx.create();

        fx.machine.release(fx.locker, &id).unwrap();
        let err = fx.machine.release(fx.locker, &id).unwrap_err();
        assert!(matches!(err, MachineError::AlreadyReleased(_)));
        assert_eq!(err.kind(), ErrorKind::StateConflict);

        let mut reordered = fx.items.clone();
        reordered.swap(0, 2);
        let err = fx
            .machine
            .verify_items(fx.claimant, &id, &reordered)
            .unwrap_err();
        assert!(matches!(err, MachineError::DigestMismatch(_)));
        assert!(!fx.machine.get(&id).is_verified());

        fx.machine.verify_items(fx.claimant, &id, &fx.items).unwrap();
        assert!(fx.machine.get(&id).is_verified());

        fx.machine.verify_message(&id, MESSAGE).unwrap();
        let err = fx.machine.verify_message(&id, b"anchor: 4 documents").unwrap_err();
        assert!(matches!(err, MachineError::MessageMismatch(_)));
        assert_eq!(err.kind(), ErrorKind::IntegrityFailure);
    }

    #[test]
    fn stored_record_keeps_only_count_and_digest() {
        let fx = fixture();
        let id = fx.create();
        let record = fx.machine.get(&id);
        assert_eq!(record.item_count, 3);
        assert_eq!(
            record.aggregate_digest,
            AggregateHasher::new(HashAlgorithm::Blake3).aggregate(&fx.items)
        );
        assert_eq!(
            id,
            IdentifierDeriver::new(HashAlgorithm::Blake3).batch_id(&record.terms())
        );
        assert!(!record.is_released());
        assert_eq!(record.deadline, deadline());
    }

    #[test]
    fn verify_items_is_open_to_anyone_but_one_shot() {
        let fx = fixture();
        let id = fx.create();
        let stranger = Address::from_label("stranger");

        fx.machine.verify_items(stranger, &id, &fx.items).unwrap();
        let err = fx.machine.verify_items(fx.claimant, &id, &fx.items).unwrap_err();
        assert!(matches!(err, MachineError::AlreadyVerified(_)));

        fx.machine.check_items(&id, &fx.items).unwrap();
        assert!(!fx.machine.get(&id).is_released());
    }

    #[test]
    fn count_is_checked_before_digest() {
        let fx = fixture();
        let id = fx.create();
        let err = fx
            .machine
            .verify_items(fx.claimant, &id, &fx.items[..2])
            .unwrap_err();
        assert!(matches!(
            err,
            MachineError::CountMismatch { expected: 3, actual: 2, .. }
        ));

        let mut flipped = fx.items.clone();
        let mut bytes = *flipped[1].as_bytes();
        bytes[31] ^= 1;
        flipped[1] = Digest::from_bytes(bytes);
        let err = fx.machine.check_items(&id, &flipped).unwrap_err();
        assert!(matches!(err, MachineError::DigestMismatch(_)));
    }

    #[test]
    fn release_is_locker_only() {
        let fx = fixture();
        let id = fx.create();
        let err = fx.machine.release(fx.claimant, &id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthorizationFailure);

        let missing = CommitmentId::from_hash([0; 32]);
        let err = fx.machine.release(fx.locker, &missing).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = fx.machine.verify_items(fx.locker, &missing, &fx.items).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn create_preconditions() {
        let fx = fixture_with(MachineConfig {
            max_batch_items: 2,
            ..MachineConfig::default()
        });

        let err = fx
            .machine
            .create_batch(fx.locker, fx.claimant, &[], None, deadline())
            .unwrap_err();
        assert!(matches!(err, MachineError::EmptyItems));

        let err = fx
            .machine
            .create_batch(fx.locker, fx.claimant, &fx.items, None, deadline())
            .unwrap_err();
        assert!(matches!(err, MachineError::TooManyItems { count: 3, limit: 2 }));
        assert_eq!(err.kind(), ErrorKind::PreconditionFailure);

        let two = &fx.items[..2];
        let err = fx
            .machine
            .create_batch(fx.locker, fx.claimant, two, None, Timestamp::from_secs(10_000))
            .unwrap_err();
        assert!(matches!(err, MachineError::InvalidDeadline { .. }));

        let err = fx
            .machine
            .create_batch(fx.locker, Address::ZERO, two, None, deadline())
            .unwrap_err();
        assert!(matches!(err, MachineError::InvalidClaimant));

        fx.machine
            .create_batch(fx.locker, fx.claimant, two, None, deadline())
            .unwrap();
        let err = fx
            .machine
            .create_batch(fx.locker, fx.claimant, two, Some(Digest::ZERO), deadline())
            .unwrap_err();
        assert!(matches!(err, MachineError::AlreadyExists(_)));
        assert_eq!(fx.audit.len().unwrap(), 1);
    }

    #[test]
    fn batch_without_message() {
        let fx = fixture();
        let id = fx
            .machine
            .create_batch(fx.locker, fx.claimant, &fx.items, None, deadline())
            .unwrap();
        assert_eq!(fx.machine.get(&id).message_digest(), None);
        let err = fx.machine.verify_message(&id, MESSAGE).unwrap_err();
        assert!(matches!(err, MachineError::NoMessageDigest(_)));
        assert_eq!(err.kind(), ErrorKind::PreconditionFailure);
    }

    #[test]
    fn items_are_recoverable_from_the_trail() {
        let fx = fixture();
        let id = fx.create();
        fx.machine.release(fx.locker, &id).unwrap();
        fx.machine.verify_items(fx.claimant, &id, &fx.items).unwrap();

        let projection =
            ReconciliationProjection::replay(&fx.audit.read_all().unwrap(), HashAlgorithm::Blake3);
        assert!(projection.is_consistent());
        match &projection.get(&id).unwrap().state {
            ObservedState::Batch {
                items,
                released,
                verified,
                ..
            } => {
                assert_eq!(items, &fx.items);
                assert!(*released && *verified);
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn journal_backed_batches_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batches.journal");
        let env = Environment::new(
            MachineConfig::default(),
            Arc::new(ManualClock::new(Timestamp::from_secs(10_000))),
            Arc::new(InMemoryAuditLog::new()),
        );
        let locker = Address::from_label("publisher");
        let items = [Digest::from_bytes([1; 32])];

        let id = {
            let store: JournalCommitmentStore<BatchRecord> =
                JournalCommitmentStore::open(&path, JournalConfig::default()).unwrap();
            let machine = BatchAggregationMachine::with_store(env.clone(), store);
            let id = machine
                .create_batch(locker, Address::from_label("auditor"), &items, None, deadline())
                .unwrap();
            machine.release(locker, &id).unwrap();
            id
        };

        let store: JournalCommitmentStore<BatchRecord> =
            JournalCommitmentStore::open(&path, JournalConfig::default()).unwrap();
        let machine = BatchAggregationMachine::with_store(env, store);
        assert!(machine.get(&id).is_released());
        machine.check_items(&id, &items).unwrap();
        assert!(matches!(
            machine.release(locker, &id),
            Err(MachineError::AlreadyReleased(_))
        ));
    }
}
