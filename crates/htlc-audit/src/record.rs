use htlc_crypto::{ChainLinked, HashChainVerifier};
use htlc_types::{Digest, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, AuditResult};
use crate::event::AuditEvent;

/// One entry of the audit trail.
///
/// `record_hash` covers `(seq, timestamp, event)` and the previous record's
/// hash, so reordering, dropping or editing any record breaks the chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// 1-based position in the trail.
    pub seq: u64,
    /// Host time at which the transition executed.
    pub timestamp: Timestamp,
    pub prev_hash: Option<Digest>,
    pub record_hash: Digest,
    pub event: AuditEvent,
}

impl AuditRecord {
    /// Seal a new record onto the chain after `prev_hash`.
    pub fn seal(
        seq: u64,
        timestamp: Timestamp,
        prev_hash: Option<Digest>,
        event: AuditEvent,
    ) -> AuditResult<Self> {
        let payload = canonical_payload(seq, timestamp, &event)?;
        let hash = HashChainVerifier::compute_hash(&payload, prev_hash.map(<[u8; 32]>::from));
        Ok(Self {
            seq,
            timestamp,
            prev_hash,
            record_hash: Digest::from_bytes(hash),
            event,
        })
    }

    /// Recompute this record's hash from its contents.
    pub fn recompute_hash(&self) -> AuditResult<Digest> {
        let payload = canonical_payload(self.seq, self.timestamp, &self.event)?;
        let hash = HashChainVerifier::compute_hash(&payload, self.prev_hash.map(<[u8; 32]>::from));
        Ok(Digest::from_bytes(hash))
    }
}

fn canonical_payload(seq: u64, timestamp: Timestamp, event: &AuditEvent) -> AuditResult<Vec<u8>> {
    serde_json::to_vec(&(seq, timestamp, event)).map_err(|e| AuditError::Serialization(e.to_string()))
}

impl ChainLinked for AuditRecord {
    fn record_hash(&self) -> [u8; 32] {
        self.record_hash.into()
    }

    fn prev_hash(&self) -> Option<[u8; 32]> {
        self.prev_hash.map(Into::into)
    }

    fn payload_bytes(&self) -> Vec<u8> {
        // An unserializable event yields an empty payload and fails verification.
        canonical_payload(self.seq, self.timestamp, &self.event).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use htlc_types::{Address, CommitmentId};

    use super::*;

    fn event(n: u8) -> AuditEvent {
        AuditEvent::BatchItemsVerified {
            id: CommitmentId::from_hash([n; 32]),
            verifier: Address::from_label("v"),
        }
    }

    #[test]
    fn sealed_records_chain() {
        let first = AuditRecord::seal(1, Timestamp::from_secs(5), None, event(1)).unwrap();
        let second =
            AuditRecord::seal(2, Timestamp::from_secs(6), Some(first.record_hash), event(2))
                .unwrap();
        assert!(HashChainVerifier::verify_chain(&[first, second]).is_ok());
    }

    #[test]
    fn recompute_matches_seal() {
        let record = AuditRecord::seal(1, Timestamp::from_secs(5), None, event(1)).unwrap();
        assert_eq!(record.recompute_hash().unwrap(), record.record_hash);
    }

    #[test]
    fn timestamp_is_covered_by_hash() {
        let mut record = AuditRecord::seal(1, Timestamp::from_secs(5), None, event(1)).unwrap();
        record.timestamp = Timestamp::from_secs(6);
        assert_ne!(record.recompute_hash().unwrap(), record.record_hash);
    }

    #[test]
    fn json_roundtrip_preserves_hash() {
        let record = AuditRecord::seal(1, Timestamp::from_secs(5), None, event(3)).unwrap();
        let json = serde_json::to_string(&record).unwrap();
        let parsed: AuditRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.recompute_hash().unwrap(), record.record_hash);
    }
}
