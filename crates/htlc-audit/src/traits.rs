use htlc_types::{CommitmentId, Timestamp};

use crate::error::AuditResult;
use crate::event::AuditEvent;
use crate::record::AuditRecord;

/// Append boundary for audit records.
///
/// Implementations assign the next sequence number, link the record to the
/// current head and return the sealed record.
pub trait AuditLog: Send + Sync {
    fn append(&self, timestamp: Timestamp, event: AuditEvent) -> AuditResult<AuditRecord>;

    fn read_all(&self) -> AuditResult<Vec<AuditRecord>>;

    /// Records referring to one identifier, in trail order.
    fn records_for(&self, id: &CommitmentId) -> AuditResult<Vec<AuditRecord>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| r.event.id() == id)
            .collect())
    }

    fn head(&self) -> AuditResult<Option<AuditRecord>> {
        Ok(self.read_all()?.pop())
    }

    fn len(&self) -> AuditResult<u64>;

    fn is_empty(&self) -> AuditResult<bool> {
        Ok(self.len()? == 0)
    }
}
