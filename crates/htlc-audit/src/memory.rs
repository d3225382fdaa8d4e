use std::collections::HashMap;
use std::sync::RwLock;

use htlc_types::{CommitmentId, Timestamp};
use tracing::debug;

use crate::error::{AuditError, AuditResult};
use crate::event::AuditEvent;
use crate::record::AuditRecord;
use crate::traits::AuditLog;

/// In-memory audit trail for tests, local demos, and embedding.
pub struct InMemoryAuditLog {
    inner: RwLock<LogState>,
}

#[derive(Default)]
struct LogState {
    records: Vec<AuditRecord>,
    by_id: HashMap<CommitmentId, Vec<usize>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LogState::default()),
        }
    }

    /// Rebuild a log from exported records, e.g. to keep appending to it.
    ///
    /// The records are taken as-is; run [`StreamValidator`] first if their
    /// origin is untrusted.
    ///
    /// [`StreamValidator`]: crate::StreamValidator
    pub fn from_records(records: Vec<AuditRecord>) -> Self {
        let mut by_id: HashMap<CommitmentId, Vec<usize>> = HashMap::new();
        for (index, record) in records.iter().enumerate() {
            by_id.entry(*record.event.id()).or_default().push(index);
        }
        Self {
            inner: RwLock::new(LogState { records, by_id }),
        }
    }

    /// Export the trail as pretty-printed JSON.
    pub fn to_json(&self) -> AuditResult<String> {
        let records = self.read_all()?;
        serde_json::to_string_pretty(&records).map_err(|e| AuditError::Serialization(e.to_string()))
    }
}

impl Default for InMemoryAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLog for InMemoryAuditLog {
    fn append(&self, timestamp: Timestamp, event: AuditEvent) -> AuditResult<AuditRecord> {
        let mut state = self.inner.write().map_err(|_| AuditError::LockPoisoned)?;

        let seq = state.records.len() as u64 + 1;
        let prev_hash = state.records.last().map(|r| r.record_hash);
        let record = AuditRecord::seal(seq, timestamp, prev_hash, event)?;

        let index = state.records.len();
        state
            .by_id
            .entry(*record.event.id())
            .or_default()
            .push(index);
        state.records.push(record.clone());

        debug!(seq, kind = %record.event.kind(), id = %record.event.id().short_id(), "audit append");
        Ok(record)
    }

    fn read_all(&self) -> AuditResult<Vec<AuditRecord>> {
        let state = self.inner.read().map_err(|_| AuditError::LockPoisoned)?;
        Ok(state.records.clone())
    }

    fn records_for(&self, id: &CommitmentId) -> AuditResult<Vec<AuditRecord>> {
        let state = self.inner.read().map_err(|_| AuditError::LockPoisoned)?;
        Ok(state
            .by_id
            .get(id)
            .map(|indices| indices.iter().map(|&i| state.records[i].clone()).collect())
            .unwrap_or_default())
    }

    fn head(&self) -> AuditResult<Option<AuditRecord>> {
        let state = self.inner.read().map_err(|_| AuditError::LockPoisoned)?;
        Ok(state.records.last().cloned())
    }

    fn len(&self) -> AuditResult<u64> {
        let state = self.inner.read().map_err(|_| AuditError::LockPoisoned)?;
        Ok(state.records.len() as u64)
    }
}

impl std::fmt::Debug for InMemoryAuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len().unwrap_or_default();
        f.debug_struct("InMemoryAuditLog")
            .field("record_count", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use htlc_crypto::HashChainVerifier;
    use htlc_types::Address;

    use super::*;

    fn released(n: u8) -> AuditEvent {
        AuditEvent::BatchReleased {
            id: CommitmentId::from_hash([n; 32]),
            locker: Address::from_label("locker"),
            aggregate_digest: htlc_types::Digest::from_bytes([n; 32]),
        }
    }

    #[test]
    fn append_assigns_sequence_and_links() {
        let log = InMemoryAuditLog::new();
        let first = log.append(Timestamp::from_secs(1), released(1)).unwrap();
        let second = log.append(Timestamp::from_secs(2), released(2)).unwrap();

        assert_eq!(first.seq, 1);
        assert_eq!(first.prev_hash, None);
        assert_eq!(second.seq, 2);
        assert_eq!(second.prev_hash, Some(first.record_hash));
        assert_eq!(log.len().unwrap(), 2);
        assert_eq!(log.head().unwrap(), Some(second));
        assert!(HashChainVerifier::verify_chain(&log.read_all().unwrap()).is_ok());
    }

    #[test]
    fn records_for_filters_by_id() {
        let log = InMemoryAuditLog::new();
        log.append(Timestamp::from_secs(1), released(1)).unwrap();
        log.append(Timestamp::from_secs(2), released(2)).unwrap();
        log.append(Timestamp::from_secs(3), released(1)).unwrap();

        let hits = log.records_for(&CommitmentId::from_hash([1; 32])).unwrap();
        assert_eq!(hits.iter().map(|r| r.seq).collect::<Vec<_>>(), vec![1, 3]);
        assert!(log
            .records_for(&CommitmentId::from_hash([7; 32]))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn json_export_reloads() {
        let log = InMemoryAuditLog::new();
        log.append(Timestamp::from_secs(1), released(1)).unwrap();
        let json = log.to_json().unwrap();

        let records: Vec<AuditRecord> = serde_json::from_str(&json).unwrap();
        let reloaded = InMemoryAuditLog::from_records(records);
        let next = reloaded.append(Timestamp::from_secs(2), released(2)).unwrap();
        assert_eq!(next.seq, 2);
        assert!(HashChainVerifier::verify_chain(&reloaded.read_all().unwrap()).is_ok());
    }
}
