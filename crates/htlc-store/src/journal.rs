use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use htlc_types::CommitmentId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::CommitmentStore;

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Flush/sync strategy for the journal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// `fsync` after every frame.
    EveryWrite,
    /// Flush to the OS and rely on page-cache buffering.
    #[default]
    OsDefault,
}

/// Configuration for a [`JournalCommitmentStore`].
#[derive(Clone, Debug, Default)]
pub struct JournalConfig {
    pub sync_mode: SyncMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum FrameOp {
    Insert,
    Replace,
}

struct JournalWriter {
    file: File,
    /// End of the last complete frame.
    len: u64,
}

#[derive(Serialize, Deserialize)]
struct Frame<R> {
    op: FrameOp,
    id: CommitmentId,
    record: R,
}

/// File-backed commitment store.
///
/// Every insert and replace appends one frame to a single journal file. On
/// open the journal is replayed front-to-back into memory, so reads never
/// touch the disk.
///
/// On-disk format per frame:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized op, id, record)]
/// ```
///
/// A truncated tail frame (torn write) ends recovery and is cut off before
/// the next append. A frame whose write fails is cut off the same way.
/// Frames failing the CRC check are skipped with a warning.
pub struct JournalCommitmentStore<R> {
    path: PathBuf,
    records: RwLock<HashMap<CommitmentId, R>>,
    writer: Mutex<JournalWriter>,
    config: JournalConfig,
}

impl<R> JournalCommitmentStore<R>
where
    R: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    /// Open (or create) a journal and replay its contents.
    pub fn open(path: &Path, config: JournalConfig) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let (records, len) = Self::recover(path)?;
        if file.metadata()?.len() > len {
            warn!(path = %path.display(), len, "discarding torn journal tail");
            file.set_len(len)?;
            file.sync_all()?;
        }
        debug!(path = %path.display(), records = records.len(), "journal opened");

        Ok(Self {
            path: path.to_path_buf(),
            records: RwLock::new(records),
            writer: Mutex::new(JournalWriter { file, len }),
            config,
        })
    }

    /// Path of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replay every frame. Also returns the offset just past the last
    /// complete frame.
    fn recover(path: &Path) -> StoreResult<(HashMap<CommitmentId, R>, u64)> {
        let data = fs::read(path)?;
        let mut records = HashMap::new();
        let mut offset = 0usize;

        while offset + HEADER_SIZE <= data.len() {
            let length = u32::from_le_bytes([
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            ]) as usize;
            let expected_crc = u32::from_le_bytes([
                data[offset + 4],
                data[offset + 5],
                data[offset + 6],
                data[offset + 7],
            ]);

            let start = offset + HEADER_SIZE;
            if length == 0 || start + length > data.len() {
                warn!(offset, length, "truncated journal frame; stopping recovery");
                break;
            }
            let payload = &data[start..start + length];
            offset = start + length;

            if crc32fast::hash(payload) != expected_crc {
                warn!(offset, "journal CRC mismatch; skipping frame");
                continue;
            }

            let frame: Frame<R> = match bincode::deserialize(payload) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(offset, error = %e, "undecodable journal frame; skipping");
                    continue;
                }
            };

            match frame.op {
                FrameOp::Insert if records.contains_key(&frame.id) => {
                    warn!(id = %frame.id, "duplicate insert frame; keeping first record");
                }
                FrameOp::Replace if !records.contains_key(&frame.id) => {
                    warn!(id = %frame.id, "replace frame for unknown record; skipping");
                }
                _ => {
                    records.insert(frame.id, frame.record);
                }
            }
        }

        Ok((records, offset as u64))
    }

    fn append(&self, op: FrameOp, id: &CommitmentId, record: &R) -> StoreResult<()> {
        let payload = bincode::serialize(&Frame { op, id: *id, record })
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let length = u32::try_from(payload.len())
            .map_err(|_| StoreError::Serialization("journal frame exceeds 4 GiB".into()))?;
        let crc = crc32fast::hash(&payload);

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&payload);

        let mut w = self.writer.lock().expect("journal mutex poisoned");
        let written = w.file.write_all(&frame).and_then(|()| match self.config.sync_mode {
            SyncMode::EveryWrite => w.file.sync_all(),
            SyncMode::OsDefault => Ok(()),
        });
        if let Err(e) = written {
            if let Err(cut) = w.file.set_len(w.len) {
                warn!(len = w.len, error = %cut, "could not cut failed journal frame");
            }
            return Err(e.into());
        }
        w.len += frame.len() as u64;

        debug!(id = %id.short_id(), ?op, len = payload.len(), "journal append");
        Ok(())
    }
}

impl<R> CommitmentStore<R> for JournalCommitmentStore<R>
where
    R: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    fn get(&self, id: &CommitmentId) -> StoreResult<Option<R>> {
        let map = self.records.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }

    fn insert(&self, id: CommitmentId, record: R) -> StoreResult<()> {
        let mut map = self.records.write().expect("lock poisoned");
        if map.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        self.append(FrameOp::Insert, &id, &record)?;
        map.insert(id, record);
        Ok(())
    }

    fn replace(&self, id: &CommitmentId, record: R) -> StoreResult<()> {
        let mut map = self.records.write().expect("lock poisoned");
        if !map.contains_key(id) {
            return Err(StoreError::NotFound(*id));
        }
        self.append(FrameOp::Replace, id, &record)?;
        map.insert(*id, record);
        Ok(())
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

impl<R> std::fmt::Debug for JournalCommitmentStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalCommitmentStore")
            .field("path", &self.path)
            .finish()
    }
}
