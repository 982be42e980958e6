use crate::snapshot::{SnapshotDescription, SnapshotManager};
use crate::store::{MatchStore, MemoryMatchStore, UpsertOutcome};
use crate::wal::{WalEntry, WriteAheadLog};
use ahash::AHashSet;
use findora_core::{Error, ItemId, Match, MatchStatus, PairKey, Result};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

pub const WAL_FILE: &str = "matches.wal";

/// Durable match store: in-memory records backed by a snapshot plus an
/// append-only log of changes since that snapshot.
///
/// Every mutation is logged and then applied in memory under one commit
/// lock, so the log order always equals the in-memory order and a failed
/// log write leaves memory untouched. Unchanged upserts are not logged.
pub struct MatchStorage {
    records: MemoryMatchStore,
    wal: WriteAheadLog,
    snapshots: SnapshotManager,
    commit: Mutex<()>,
    data_dir: PathBuf,
    sync_writes: bool,
}

impl MatchStorage {
    /// Open (or create) storage under `data_dir`, restoring the snapshot
    /// and replaying the log on top of it
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let snapshots = SnapshotManager::new(data_dir.join("snapshots")).map_err(storage_error)?;
        let records = MemoryMatchStore::new();

        if let Some(saved) = snapshots.load().map_err(storage_error)? {
            tracing::info!(records = saved.len(), "restoring matches from snapshot");
            records.restore(saved);
        }

        let wal_path = data_dir.join(WAL_FILE);
        let entries = WriteAheadLog::recover(&wal_path).map_err(storage_error)?;
        if !entries.is_empty() {
            tracing::info!(entries = entries.len(), "replaying match log");
        }
        for entry in entries {
            match entry {
                WalEntry::Upsert { record } => records.restore([record]),
                WalEntry::Remove { key } => {
                    records.remove(&key)?;
                }
                WalEntry::Status { key, status } => records.restore_status(&key, status),
            }
        }

        let wal = WriteAheadLog::new(&wal_path).map_err(storage_error)?;

        Ok(Self {
            records,
            wal,
            snapshots,
            commit: Mutex::new(()),
            data_dir,
            sync_writes: false,
        })
    }

    /// fdatasync the log after every commit
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    #[inline]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Write a snapshot of every record and truncate the log
    pub fn save(&self) -> Result<SnapshotDescription> {
        let _guard = self.commit.lock();
        let all = self.records.all();
        let desc = self.snapshots.write(&all).map_err(storage_error)?;
        self.wal.truncate().map_err(storage_error)?;
        tracing::info!(records = desc.records, size = desc.size, "match snapshot saved");
        Ok(desc)
    }

    fn log(&self, entries: &[WalEntry]) -> Result<()> {
        self.wal.append(entries).map_err(storage_error)?;
        if self.sync_writes {
            self.wal.sync().map_err(storage_error)?;
        }
        Ok(())
    }
}

impl MatchStore for MatchStorage {
    fn upsert(&self, record: Match) -> Result<UpsertOutcome> {
        let mut outcomes = self.upsert_batch(vec![record])?;
        Ok(outcomes.pop().unwrap_or(UpsertOutcome::Unchanged))
    }

    fn upsert_batch(&self, records: Vec<Match>) -> Result<Vec<UpsertOutcome>> {
        let _guard = self.commit.lock();
        let staged = self.records.stage(&records);
        let changed: Vec<WalEntry> = staged
            .iter()
            .filter(|(outcome, _)| outcome.changed())
            .map(|(_, record)| WalEntry::Upsert { record: record.clone() })
            .collect();
        self.log(&changed)?;
        self.records.upsert_batch(records)
    }

    fn remove(&self, key: &PairKey) -> Result<bool> {
        let _guard = self.commit.lock();
        if self.records.get(key).is_none() {
            return Ok(false);
        }
        self.log(&[WalEntry::Remove { key: key.clone() }])?;
        self.records.remove(key)
    }

    fn remove_item(&self, id: &ItemId) -> Result<usize> {
        let _guard = self.commit.lock();
        let entries: Vec<WalEntry> = self
            .records
            .matches_for(id)
            .iter()
            .map(|record| WalEntry::Remove { key: record.key() })
            .collect();
        self.log(&entries)?;
        self.records.remove_item(id)
    }

    fn set_status(&self, key: &PairKey, status: MatchStatus) -> Result<()> {
        let _guard = self.commit.lock();
        if self.records.get(key).is_none() {
            return Err(Error::Storage(format!("no match for pair {}", key)));
        }
        self.log(&[WalEntry::Status { key: key.clone(), status }])?;
        self.records.set_status(key, status)
    }

    fn get(&self, key: &PairKey) -> Option<Match> {
        self.records.get(key)
    }

    fn matches_for(&self, id: &ItemId) -> Vec<Match> {
        self.records.matches_for(id)
    }

    fn matched_ids(&self, id: &ItemId) -> AHashSet<ItemId> {
        self.records.matched_ids(id)
    }

    fn all(&self) -> Vec<Match> {
        self.records.all()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

fn storage_error(e: anyhow::Error) -> Error {
    Error::Storage(format!("{:#}", e))
}
