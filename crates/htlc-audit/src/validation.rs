use crate::record::AuditRecord;

/// Result of audit stream validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    pub record_count: u64,
    pub hash_chain_valid: bool,
    pub sequence_monotonic: bool,
    pub timestamps_monotonic: bool,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A specific integrity violation detected during validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub seq: u64,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    SequenceGap,
    HashChainBreak,
    HashMismatch,
    TimestampRegression,
}

/// Audit stream integrity validator.
///
/// Unlike [`HashChainVerifier`], which stops at the first broken link, the
/// validator walks the whole stream and reports every violation it finds.
///
/// [`HashChainVerifier`]: htlc_crypto::HashChainVerifier
pub struct StreamValidator;

impl StreamValidator {
    pub fn validate(records: &[AuditRecord]) -> ValidationReport {
        let mut violations = Vec::new();
        let mut hash_chain_valid = true;
        let mut sequence_monotonic = true;
        let mut timestamps_monotonic = true;

        for (index, record) in records.iter().enumerate() {
            let expected_seq = (index + 1) as u64;
            if record.seq != expected_seq {
                sequence_monotonic = false;
                violations.push(Violation {
                    seq: record.seq,
                    kind: ViolationKind::SequenceGap,
                    description: format!("expected seq {expected_seq}, got {}", record.seq),
                });
            }

            let previous = index.checked_sub(1).map(|i| &records[i]);
            if record.prev_hash != previous.map(|p| p.record_hash) {
                hash_chain_valid = false;
                violations.push(Violation {
                    seq: record.seq,
                    kind: ViolationKind::HashChainBreak,
                    description: "previous hash link mismatch".into(),
                });
            }

            if let Some(prev) = previous {
                if record.timestamp < prev.timestamp {
                    timestamps_monotonic = false;
                    violations.push(Violation {
                        seq: record.seq,
                        kind: ViolationKind::TimestampRegression,
                        description: format!(
                            "timestamp {} precedes previous record's {}",
                            record.timestamp, prev.timestamp
                        ),
                    });
                }
            }

            let recomputed = record.recompute_hash();
            if recomputed.as_ref() != Ok(&record.record_hash) {
                hash_chain_valid = false;
                violations.push(Violation {
                    seq: record.seq,
                    kind: ViolationKind::HashMismatch,
                    description: "record hash does not match computed".into(),
                });
            }
        }

        ValidationReport {
            record_count: records.len() as u64,
            hash_chain_valid,
            sequence_monotonic,
            timestamps_monotonic,
            violations,
        }
    }
}
