use std::collections::BTreeMap;

use htlc_crypto::{AggregateHasher, HashAlgorithm, IdentifierDeriver};
use htlc_types::{Amount, BatchTerms, CommitmentId, Digest, EscrowTerms, LogTerms, Secret};
use tracing::warn;

use crate::event::AuditEvent;
use crate::record::AuditRecord;

/// How an escrow ended, as seen from the trail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EscrowOutcome {
    Open,
    Withdrawn { secret: Secret },
    Refunded,
}

/// State of one commitment reconstructed from audit events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObservedState {
    Escrow {
        terms: EscrowTerms,
        amount: Amount,
        outcome: EscrowOutcome,
    },
    Log {
        terms: LogTerms,
        verified: bool,
    },
    Batch {
        terms: BatchTerms,
        items: Vec<Digest>,
        released: bool,
        verified: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservedCommitment {
    pub id: CommitmentId,
    pub created_seq: u64,
    pub last_seq: u64,
    pub state: ObservedState,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProjectionViolationKind {
    /// The published terms do not hash to the published identifier.
    IdentifierMismatch,
    /// A batch's items do not hash to its committed aggregate.
    AggregateMismatch,
    DuplicateCreation,
    UnknownCommitment,
    /// A transition event of one machine names a record of another.
    KindMismatch,
    /// The record was not in a state that permits this transition.
    InvalidTransition,
    /// A revealed secret or message does not hash to its commitment.
    PreimageMismatch,
    ActorMismatch,
    AmountMismatch,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectionViolation {
    pub seq: u64,
    pub id: CommitmentId,
    pub kind: ProjectionViolationKind,
    pub description: String,
}

type Rejection = (ProjectionViolationKind, String);

/// Off-chain reconciliation of an audit trail.
///
/// Replays events in order without trusting any of them: identifiers are
/// re-derived from published terms, batch aggregates from the disclosed
/// items, and every revealed secret or message is re-hashed against its
/// commitment. Events that fail a check are reported and not applied.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconciliationProjection {
    pub commitments: BTreeMap<CommitmentId, ObservedCommitment>,
    pub violations: Vec<ProjectionViolation>,
}

impl ReconciliationProjection {
    pub fn replay(records: &[AuditRecord], algorithm: HashAlgorithm) -> Self {
        let mut projection = Self::default();
        let deriver = IdentifierDeriver::new(algorithm);
        let aggregator = AggregateHasher::new(algorithm);

        for record in records {
            let outcome = if record.event.kind().is_creation() {
                projection.create(record, &deriver, &aggregator)
            } else {
                projection.transition(record, algorithm)
            };

            if let Err((kind, description)) = outcome {
                warn!(seq = record.seq, ?kind, %description, "audit event rejected during reconciliation");
                projection.violations.push(ProjectionViolation {
                    seq: record.seq,
                    id: *record.event.id(),
                    kind,
                    description,
                });
            }
        }

        projection
    }

    pub fn get(&self, id: &CommitmentId) -> Option<&ObservedCommitment> {
        self.commitments.get(id)
    }

    /// Returns `true` if every event was applied.
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }

    fn create(
        &mut self,
        record: &AuditRecord,
        deriver: &IdentifierDeriver,
        aggregator: &AggregateHasher,
    ) -> Result<(), Rejection> {
        let (id, derived, state) = match &record.event {
            AuditEvent::EscrowCreated { id, terms, amount } => (
                *id,
                deriver.escrow_id(terms),
                ObservedState::Escrow {
                    terms: *terms,
                    amount: *amount,
                    outcome: EscrowOutcome::Open,
                },
            ),
            AuditEvent::LogCreated { id, terms } => (
                *id,
                deriver.log_id(terms),
                ObservedState::Log {
                    terms: *terms,
                    verified: false,
                },
            ),
            AuditEvent::BatchCreated { id, terms, items } => {
                let computed = aggregator.aggregate(items);
                if computed != terms.aggregate_digest {
                    return Err((
                        ProjectionViolationKind::AggregateMismatch,
                        format!(
                            "items hash to {computed}, terms commit to {}",
                            terms.aggregate_digest
                        ),
                    ));
                }
                (
                    *id,
                    deriver.batch_id(terms),
                    ObservedState::Batch {
                        terms: *terms,
                        items: items.clone(),
                        released: false,
                        verified: false,
                    },
                )
            }
            _ => unreachable!("create called with a transition event"),
        };

        if derived != id {
            return Err((
                ProjectionViolationKind::IdentifierMismatch,
                format!("terms derive {derived}, event claims {id}"),
            ));
        }
        if self.commitments.contains_key(&id) {
            return Err((
                ProjectionViolationKind::DuplicateCreation,
                "identifier already created earlier in the trail".into(),
            ));
        }

        self.commitments.insert(
            id,
            ObservedCommitment {
                id,
                created_seq: record.seq,
                last_seq: record.seq,
                state,
            },
        );
        Ok(())
    }

    fn transition(&mut self, record: &AuditRecord, algorithm: HashAlgorithm) -> Result<(), Rejection> {
        let id = record.event.id();
        let entry = self.commitments.get_mut(id).ok_or_else(|| {
            (
                ProjectionViolationKind::UnknownCommitment,
                "transition on an identifier never created".to_string(),
            )
        })?;

        match (&record.event, &mut entry.state) {
            (
                AuditEvent::EscrowWithdrawn { claimant, secret, amount, .. },
                ObservedState::Escrow { terms, amount: locked, outcome },
            ) => {
                require_open(outcome)?;
                require_actor(claimant == &terms.claimant, "claimant")?;
                if !algorithm.verify(secret.as_bytes(), &terms.hashlock) {
                    return Err((
                        ProjectionViolationKind::PreimageMismatch,
                        "revealed secret does not hash to the hashlock".into(),
                    ));
                }
                require_amount(*amount, *locked)?;
                *outcome = EscrowOutcome::Withdrawn { secret: *secret };
            }
            (
                AuditEvent::EscrowRefunded { locker, amount, .. },
                ObservedState::Escrow { terms, amount: locked, outcome },
            ) => {
                require_open(outcome)?;
                require_actor(locker == &terms.locker, "locker")?;
                if record.timestamp < terms.deadline {
                    return Err((
                        ProjectionViolationKind::InvalidTransition,
                        format!(
                            "refund at {} precedes deadline {}",
                            record.timestamp, terms.deadline
                        ),
                    ));
                }
                require_amount(*amount, *locked)?;
                *outcome = EscrowOutcome::Refunded;
            }
            (
                AuditEvent::LogVerified { claimant, message, .. },
                ObservedState::Log { terms, verified },
            ) => {
                if *verified {
                    return Err(already("log commitment already verified"));
                }
                require_actor(claimant == &terms.claimant, "claimant")?;
                if !algorithm.verify(message, &terms.message_digest) {
                    return Err((
                        ProjectionViolationKind::PreimageMismatch,
                        "disclosed message does not hash to the message digest".into(),
                    ));
                }
                *verified = true;
            }
            (
                AuditEvent::BatchReleased { locker, aggregate_digest, .. },
                ObservedState::Batch { terms, released, .. },
            ) => {
                if *released {
                    return Err(already("batch already released"));
                }
                require_actor(locker == &terms.locker, "locker")?;
                if *aggregate_digest != terms.aggregate_digest {
                    return Err((
                        ProjectionViolationKind::AggregateMismatch,
                        "released digest differs from the committed aggregate".into(),
                    ));
                }
                *released = true;
            }
            (AuditEvent::BatchItemsVerified { .. }, ObservedState::Batch { verified, .. }) => {
                if *verified {
                    return Err(already("batch items already verified"));
                }
                *verified = true;
            }
            (event, _) => {
                return Err((
                    ProjectionViolationKind::KindMismatch,
                    format!("{} does not apply to this kind of record", event.kind()),
                ));
            }
        }

        entry.last_seq = record.seq;
        Ok(())
    }
}

fn already(reason: &str) -> Rejection {
    (ProjectionViolationKind::InvalidTransition, reason.to_string())
}

fn require_open(outcome: &EscrowOutcome) -> Result<(), Rejection> {
    match outcome {
        EscrowOutcome::Open => Ok(()),
        other => Err(already(&format!("escrow already final: {other:?}"))),
    }
}

fn require_actor(matches: bool, role: &str) -> Result<(), Rejection> {
    if matches {
        Ok(())
    } else {
        Err((
            ProjectionViolationKind::ActorMismatch,
            format!("event actor is not the record's {role}"),
        ))
    }
}

fn require_amount(paid: Amount, locked: Amount) -> Result<(), Rejection> {
    if paid == locked {
        Ok(())
    } else {
        Err((
            ProjectionViolationKind::AmountMismatch,
            format!("paid out {paid}, locked {locked}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use htlc_types::{Address, Timestamp};

    use super::*;
    use crate::memory::InMemoryAuditLog;
    use crate::traits::AuditLog;

    const ALG: HashAlgorithm = HashAlgorithm::Blake3;

    fn escrow_terms(secret: &Secret) -> EscrowTerms {
        EscrowTerms {
            locker: Address::from_label("locker"),
            claimant: Address::from_label("claimant"),
            hashlock: ALG.digest(secret.as_bytes()),
            deadline: Timestamp::from_secs(1_000),
        }
    }

    fn created(terms: EscrowTerms) -> AuditEvent {
        AuditEvent::EscrowCreated {
            id: IdentifierDeriver::new(ALG).escrow_id(&terms),
            terms,
            amount: 300_000,
        }
    }

    fn replay(events: Vec<(u64, AuditEvent)>) -> ReconciliationProjection {
        let log = InMemoryAuditLog::new();
        for (ts, event) in events {
            log.append(Timestamp::from_secs(ts), event).unwrap();
        }
        ReconciliationProjection::replay(&log.read_all().unwrap(), ALG)
    }

    #[test]
    fn withdraw_is_reconstructed() {
        let secret = Secret::from_bytes([7; 32]);
        let terms = escrow_terms(&secret);
        let id = IdentifierDeriver::new(ALG).escrow_id(&terms);

        let projection = replay(vec![
            (10, created(terms)),
            (
                20,
                AuditEvent::EscrowWithdrawn {
                    id,
                    claimant: terms.claimant,
                    secret,
                    amount: 300_000,
                },
            ),
        ]);

        assert!(projection.is_consistent());
        let observed = projection.get(&id).unwrap();
        assert_eq!(observed.created_seq, 1);
        assert_eq!(observed.last_seq, 2);
        assert!(matches!(
            &observed.state,
            ObservedState::Escrow { outcome: EscrowOutcome::Withdrawn { secret: s }, .. } if *s == secret
        ));
    }

    #[test]
    fn forged_identifier_is_rejected() {
        let terms = escrow_terms(&Secret::from_bytes([1; 32]));
        let projection = replay(vec![(
            10,
            AuditEvent::EscrowCreated {
                id: CommitmentId::from_hash([0xff; 32]),
                terms,
                amount: 1,
            },
        )]);
        assert!(projection.commitments.is_empty());
        assert_eq!(
            projection.violations[0].kind,
            ProjectionViolationKind::IdentifierMismatch
        );
    }

    #[test]
    fn second_terminal_transition_is_rejected() {
        let secret = Secret::from_bytes([2; 32]);
        let terms = escrow_terms(&secret);
        let id = IdentifierDeriver::new(ALG).escrow_id(&terms);

        let projection = replay(vec![
            (10, created(terms)),
            (
                20,
                AuditEvent::EscrowWithdrawn {
                    id,
                    claimant: terms.claimant,
                    secret,
                    amount: 300_000,
                },
            ),
            (
                2_000,
                AuditEvent::EscrowRefunded {
                    id,
                    locker: terms.locker,
                    amount: 300_000,
                },
            ),
        ]);

        assert_eq!(projection.violations.len(), 1);
        assert_eq!(projection.violations[0].seq, 3);
        assert_eq!(
            projection.violations[0].kind,
            ProjectionViolationKind::InvalidTransition
        );
    }

    #[test]
    fn early_refund_and_bad_secret_are_rejected() {
        let secret = Secret::from_bytes([3; 32]);
        let terms = escrow_terms(&secret);
        let id = IdentifierDeriver::new(ALG).escrow_id(&terms);

        let projection = replay(vec![
            (10, created(terms)),
            (
                20,
                AuditEvent::EscrowRefunded {
                    id,
                    locker: terms.locker,
                    amount: 300_000,
                },
            ),
            (
                30,
                AuditEvent::EscrowWithdrawn {
                    id,
                    claimant: terms.claimant,
                    secret: Secret::from_bytes([4; 32]),
                    amount: 300_000,
                },
            ),
        ]);

        let kinds: Vec<_> = projection.violations.iter().map(|v| v.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ProjectionViolationKind::InvalidTransition,
                ProjectionViolationKind::PreimageMismatch
            ]
        );
        assert!(matches!(
            projection.get(&id).unwrap().state,
            ObservedState::Escrow { outcome: EscrowOutcome::Open, .. }
        ));
    }

    #[test]
    fn batch_items_must_match_aggregate() {
        let items = vec![Digest::from_bytes([1; 32]), Digest::from_bytes([2; 32])];
        let terms = BatchTerms {
            locker: Address::from_label("locker"),
            claimant: Address::from_label("claimant"),
            aggregate_digest: AggregateHasher::new(ALG).aggregate(&items),
            message_digest: Digest::ZERO,
            deadline: Timestamp::from_secs(500),
        };
        let id = IdentifierDeriver::new(ALG).batch_id(&terms);
        let mut swapped = items.clone();
        swapped.swap(0, 1);

        let honest = replay(vec![(1, AuditEvent::BatchCreated { id, terms, items })]);
        assert!(honest.is_consistent());

        let forged = replay(vec![(
            1,
            AuditEvent::BatchCreated {
                id,
                terms,
                items: swapped,
            },
        )]);
        assert_eq!(
            forged.violations[0].kind,
            ProjectionViolationKind::AggregateMismatch
        );
    }

    #[test]
    fn transition_on_unknown_id_is_rejected() {
        let projection = replay(vec![(
            1,
            AuditEvent::BatchItemsVerified {
                id: CommitmentId::from_hash([9; 32]),
                verifier: Address::ZERO,
            },
        )]);
        assert_eq!(
            projection.violations[0].kind,
            ProjectionViolationKind::UnknownCommitment
        );
    }
}
