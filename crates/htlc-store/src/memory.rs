use std::collections::HashMap;
use std::sync::RwLock;

use htlc_types::CommitmentId;

use crate::error::{StoreError, StoreResult};
use crate::traits::CommitmentStore;

/// In-memory, HashMap-based commitment store.
///
/// Intended for tests and embedding. Records are held behind a `RwLock` and
/// cloned on read.
pub struct InMemoryCommitmentStore<R> {
    records: RwLock<HashMap<CommitmentId, R>>,
}

impl<R> InMemoryCommitmentStore<R> {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Sorted list of all occupied identifiers.
    pub fn all_ids(&self) -> Vec<CommitmentId> {
        let map = self.records.read().expect("lock poisoned");
        let mut ids: Vec<CommitmentId> = map.keys().copied().collect();
        ids.sort();
        ids
    }
}

impl<R> Default for InMemoryCommitmentStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Clone + Send + Sync> CommitmentStore<R> for InMemoryCommitmentStore<R> {
    fn get(&self, id: &CommitmentId) -> StoreResult<Option<R>> {
        let map = self.records.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }

    fn insert(&self, id: CommitmentId, record: R) -> StoreResult<()> {
        let mut map = self.records.write().expect("lock poisoned");
        if map.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        map.insert(id, record);
        Ok(())
    }

    fn replace(&self, id: &CommitmentId, record: R) -> StoreResult<()> {
        let mut map = self.records.write().expect("lock poisoned");
        match map.get_mut(id) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(StoreError::NotFound(*id)),
        }
    }

    fn contains(&self, id: &CommitmentId) -> StoreResult<bool> {
        let map = self.records.read().expect("lock poisoned");
        Ok(map.contains_key(id))
    }

    fn records(&self) -> StoreResult<Vec<(CommitmentId, R)>> {
        let map = self.records.read().expect("lock poisoned");
        let mut all: Vec<(CommitmentId, R)> =
            map.iter().map(|(id, r)| (*id, r.clone())).collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(all)
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.records.read().expect("lock poisoned").len())
    }
}

impl<R> std::fmt::Debug for InMemoryCommitmentStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.records.read().map(|m| m.len()).unwrap_or_default();
        f.debug_struct("InMemoryCommitmentStore")
            .field("record_count", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> CommitmentId {
        CommitmentId::from_hash([n; 32])
    }

    #[test]
    fn insert_then_get() {
        let store = InMemoryCommitmentStore::new();
        store.insert(id(1), "first".to_string()).unwrap();
        assert_eq!(store.get(&id(1)).unwrap(), Some("first".to_string()));
        assert_eq!(store.get(&id(2)).unwrap(), None);
        assert!(store.contains(&id(1)).unwrap());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn second_insert_is_rejected_and_keeps_original() {
        let store = InMemoryCommitmentStore::new();
        store.insert(id(1), 10u32).unwrap();
        let err = store.insert(id(1), 20u32).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(x) if x == id(1)));
        assert_eq!(store.get(&id(1)).unwrap(), Some(10));
    }

    #[test]
    fn replace_requires_existing_record() {
        let store = InMemoryCommitmentStore::new();
        let err = store.replace(&id(3), 1u32).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.is_empty().unwrap());

        store.insert(id(3), 1u32).unwrap();
        store.replace(&id(3), 2u32).unwrap();
        assert_eq!(store.get(&id(3)).unwrap(), Some(2));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn listings_are_sorted() {
        let store = InMemoryCommitmentStore::new();
        for n in [5u8, 1, 3] {
            store.insert(id(n), n).unwrap();
        }
        assert_eq!(store.all_ids(), vec![id(1), id(3), id(5)]);
        assert_eq!(
            store.records().unwrap(),
            vec![(id(1), 1), (id(3), 3), (id(5), 5)]
        );
    }
}
