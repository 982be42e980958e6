use ahash::{AHashMap, AHashSet};
use findora_core::{Error, ItemId, Match, MatchStatus, PairKey, Result};
use parking_lot::RwLock;

/// What an upsert did to the stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Scores equal the stored ones; the stored record was left untouched
    Unchanged,
}

impl UpsertOutcome {
    #[inline]
    pub fn changed(self) -> bool {
        self != UpsertOutcome::Unchanged
    }
}

/// Pair-keyed match storage.
///
/// Records are keyed by the unordered item pair, so runs triggered from
/// either side of a pair converge on one record. `upsert_batch` applies all
/// records of one match run under a single write, so readers never see a
/// half-committed run.
pub trait MatchStore: Send + Sync {
    fn upsert(&self, record: Match) -> Result<UpsertOutcome>;

    fn upsert_batch(&self, records: Vec<Match>) -> Result<Vec<UpsertOutcome>>;

    fn remove(&self, key: &PairKey) -> Result<bool>;

    /// Drop every record involving `id`, returning how many were removed
    fn remove_item(&self, id: &ItemId) -> Result<usize>;

    fn set_status(&self, key: &PairKey, status: MatchStatus) -> Result<()>;

    fn get(&self, key: &PairKey) -> Option<Match>;

    /// Records involving `id`, in no particular order
    fn matches_for(&self, id: &ItemId) -> Vec<Match>;

    /// Ids already matched against `id`
    fn matched_ids(&self, id: &ItemId) -> AHashSet<ItemId>;

    fn all(&self) -> Vec<Match>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct Records {
    by_key: AHashMap<PairKey, Match>,
    by_item: AHashMap<ItemId, AHashSet<PairKey>>,
}

impl Records {
    fn upsert(&mut self, mut record: Match) -> UpsertOutcome {
        let key = record.key();
        match self.by_key.get_mut(&key) {
            Some(existing) if existing.same_scores(&record) => UpsertOutcome::Unchanged,
            Some(existing) => {
                record.status = existing.status;
                *existing = record;
                UpsertOutcome::Updated
            }
            None => {
                let (a, b) = key.ids();
                self.by_item.entry(a.clone()).or_default().insert(key.clone());
                self.by_item.entry(b.clone()).or_default().insert(key.clone());
                self.by_key.insert(key, record);
                UpsertOutcome::Inserted
            }
        }
    }

    fn remove(&mut self, key: &PairKey) -> Option<Match> {
        let removed = self.by_key.remove(key)?;
        let (a, b) = key.ids();
        for id in [a, b] {
            if let Some(keys) = self.by_item.get_mut(id) {
                keys.remove(key);
                if keys.is_empty() {
                    self.by_item.remove(id);
                }
            }
        }
        Some(removed)
    }
}

/// In-memory [`MatchStore`]
#[derive(Default)]
pub struct MemoryMatchStore {
    records: RwLock<Records>,
}

impl MemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// What `upsert_batch(records)` would do, with each record as it would
    /// be stored, without applying anything
    pub(crate) fn stage(&self, records: &[Match]) -> Vec<(UpsertOutcome, Match)> {
        let stored = self.records.read();
        let mut pending: AHashMap<PairKey, Match> = AHashMap::new();
        records
            .iter()
            .map(|record| {
                let key = record.key();
                let staged = match pending.get(&key).or_else(|| stored.by_key.get(&key)) {
                    Some(existing) if existing.same_scores(record) => {
                        (UpsertOutcome::Unchanged, existing.clone())
                    }
                    Some(existing) => {
                        let mut updated = record.clone();
                        updated.status = existing.status;
                        (UpsertOutcome::Updated, updated)
                    }
                    None => (UpsertOutcome::Inserted, record.clone()),
                };
                pending.insert(key, staged.1.clone());
                staged
            })
            .collect()
    }

    fn remove_item_keys(&self, id: &ItemId) -> Vec<PairKey> {
        let mut records = self.records.write();
        let keys: Vec<PairKey> = records
            .by_item
            .get(id)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        for key in &keys {
            records.remove(key);
        }
        keys
    }

    /// Load records without change tracking (snapshot/log replay)
    pub(crate) fn restore(&self, records: impl IntoIterator<Item = Match>) {
        let mut guard = self.records.write();
        for record in records {
            let key = record.key();
            guard.remove(&key);
            guard.upsert(record);
        }
    }

    pub(crate) fn restore_status(&self, key: &PairKey, status: MatchStatus) {
        if let Some(record) = self.records.write().by_key.get_mut(key) {
            record.status = status;
        }
    }
}

impl MatchStore for MemoryMatchStore {
    fn upsert(&self, record: Match) -> Result<UpsertOutcome> {
        Ok(self.records.write().upsert(record))
    }

    fn upsert_batch(&self, records: Vec<Match>) -> Result<Vec<UpsertOutcome>> {
        let mut guard = self.records.write();
        Ok(records.into_iter().map(|record| guard.upsert(record)).collect())
    }

    fn remove(&self, key: &PairKey) -> Result<bool> {
        Ok(self.records.write().remove(key).is_some())
    }

    fn remove_item(&self, id: &ItemId) -> Result<usize> {
        Ok(self.remove_item_keys(id).len())
    }

    fn set_status(&self, key: &PairKey, status: MatchStatus) -> Result<()> {
        let mut records = self.records.write();
        let record = records
            .by_key
            .get_mut(key)
            .ok_or_else(|| Error::Storage(format!("no match for pair {}", key)))?;
        record.status = status;
        Ok(())
    }

    fn get(&self, key: &PairKey) -> Option<Match> {
        self.records.read().by_key.get(key).cloned()
    }

    fn matches_for(&self, id: &ItemId) -> Vec<Match> {
        let records = self.records.read();
        records
            .by_item
            .get(id)
            .map(|keys| keys.iter().filter_map(|k| records.by_key.get(k).cloned()).collect())
            .unwrap_or_default()
    }

    fn matched_ids(&self, id: &ItemId) -> AHashSet<ItemId> {
        let records = self.records.read();
        records
            .by_item
            .get(id)
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| {
                        let (a, b) = k.ids();
                        if a == id { Some(b.clone()) } else { Some(a.clone()) }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn all(&self) -> Vec<Match> {
        self.records.read().by_key.values().cloned().collect()
    }

    fn len(&self) -> usize {
        self.records.read().by_key.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use findora_core::{ComponentScores, ConfidenceLevel};

    pub(crate) fn record(lost: &str, found: &str, confidence: f32) -> Match {
        Match {
            lost_item_id: ItemId::from(lost),
            found_item_id: ItemId::from(found),
            confidence,
            scores: ComponentScores { image: Some(confidence), text: 0.5, proximity: 0.5 },
            level: if confidence >= 0.8 { ConfidenceLevel::High } else { ConfidenceLevel::Moderate },
            status: MatchStatus::Pending,
            computed_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = MemoryMatchStore::new();
        assert_eq!(store.upsert(record("l1", "f1", 0.9)).unwrap(), UpsertOutcome::Inserted);
        let before = store.get(&PairKey::new(&"l1".into(), &"f1".into())).unwrap();

        // Same scores, later timestamp: the stored record must not change
        let mut again = record("l1", "f1", 0.9);
        again.computed_at = Utc::now();
        assert_eq!(store.upsert(again).unwrap(), UpsertOutcome::Unchanged);

        let after = store.get(&before.key()).unwrap();
        assert_eq!(before, after);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_stage_matches_upsert_without_applying() {
        let store = MemoryMatchStore::new();
        store.upsert(record("l1", "f1", 0.6)).unwrap();
        store.set_status(&record("l1", "f1", 0.6).key(), MatchStatus::Accepted).unwrap();

        let batch = vec![record("l1", "f1", 0.6), record("l1", "f1", 0.7), record("l2", "f2", 0.5)];
        let staged = store.stage(&batch);
        assert_eq!(store.len(), 1);

        let outcomes: Vec<UpsertOutcome> = staged.iter().map(|(outcome, _)| *outcome).collect();
        assert_eq!(
            outcomes,
            vec![UpsertOutcome::Unchanged, UpsertOutcome::Updated, UpsertOutcome::Inserted]
        );
        assert_eq!(staged[1].1.status, MatchStatus::Accepted);
        assert_eq!(store.upsert_batch(batch).unwrap(), outcomes);
    }

    #[test]
    fn test_update_preserves_review_status() {
        let store = MemoryMatchStore::new();
        store.upsert(record("l1", "f1", 0.6)).unwrap();
        let key = PairKey::new(&"f1".into(), &"l1".into());
        store.set_status(&key, MatchStatus::Accepted).unwrap();

        assert_eq!(store.upsert(record("l1", "f1", 0.7)).unwrap(), UpsertOutcome::Updated);
        let stored = store.get(&key).unwrap();
        assert_eq!(stored.confidence, 0.7);
        assert_eq!(stored.status, MatchStatus::Accepted);
    }

    #[test]
    fn test_matches_for_and_matched_ids() {
        let store = MemoryMatchStore::new();
        store
            .upsert_batch(vec![record("l1", "f1", 0.9), record("l1", "f2", 0.5), record("l2", "f1", 0.4)])
            .unwrap();

        assert_eq!(store.matches_for(&"l1".into()).len(), 2);
        assert_eq!(store.matches_for(&"f1".into()).len(), 2);
        assert!(store.matches_for(&"nobody".into()).is_empty());

        let ids = store.matched_ids(&"f1".into());
        assert!(ids.contains(&ItemId::from("l1")));
        assert!(ids.contains(&ItemId::from("l2")));
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_remove_item_drops_all_its_pairs() {
        let store = MemoryMatchStore::new();
        store
            .upsert_batch(vec![record("l1", "f1", 0.9), record("l1", "f2", 0.5), record("l2", "f2", 0.4)])
            .unwrap();

        assert_eq!(store.remove_item(&"l1".into()).unwrap(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.matches_for(&"f1".into()).is_empty());
        assert_eq!(store.matches_for(&"f2".into()).len(), 1);
    }

    #[test]
    fn test_set_status_on_missing_pair_fails() {
        let store = MemoryMatchStore::new();
        let key = PairKey::new(&"a".into(), &"b".into());
        assert!(store.set_status(&key, MatchStatus::Rejected).is_err());
    }
}
