use htlc_types::CommitmentId;

use crate::error::StoreResult;

/// Identifier-keyed, append-only record store.
///
/// All implementations must satisfy these invariants:
/// - `insert` succeeds at most once per identifier; a second insert fails
///   with [`StoreError::AlreadyExists`] and leaves the first record intact.
/// - `replace` only updates an existing record and fails with
///   [`StoreError::NotFound`] otherwise.
/// - There is no delete operation.
/// - A failed call leaves the store unchanged.
///
/// Check-then-write sequences spanning several calls are not atomic here;
/// callers serialize their own transitions.
///
/// [`StoreError::AlreadyExists`]: crate::StoreError::AlreadyExists
/// [`StoreError::NotFound`]: crate::StoreError::NotFound
pub trait CommitmentStore<R>: Send + Sync {
    /// Read a record. Returns `Ok(None)` if the identifier is unoccupied.
    fn get(&self, id: &CommitmentId) -> StoreResult<Option<R>>;

    /// Store a record under a fresh identifier.
    fn insert(&self, id: CommitmentId, record: R) -> StoreResult<()>;

    /// Overwrite the record stored under an occupied identifier.
    fn replace(&self, id: &CommitmentId, record: R) -> StoreResult<()>;

    /// Whether the identifier is occupied.
    fn contains(&self, id: &CommitmentId) -> StoreResult<bool> {
        Ok(self.get(id)?.is_some())
    }

    /// Every stored record, sorted by identifier.
    fn records(&self) -> StoreResult<Vec<(CommitmentId, R)>>;

    /// Number of stored records.
    fn len(&self) -> StoreResult<usize>;

    /// Returns `true` if nothing has been stored yet.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}
