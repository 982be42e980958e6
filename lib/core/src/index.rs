use crate::{Category, CategoryCompatibility, Error, Item, ItemId, ItemStatus, ItemType, Result};
use ahash::{AHashMap, AHashSet};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Source of match candidates for an item.
///
/// Implementations return every active, opposite-type item whose category is
/// the same as or compatible with the item's, minus the ids in `exclude`.
/// Ordering is unspecified; the result must be exhaustive and reflect the
/// catalog at call time. The bucket scan in [`CandidateIndex`] can be swapped
/// for an approximate nearest-neighbour structure behind this trait.
pub trait CandidateSource: Send + Sync {
    fn candidates_for(&self, item: &Item, exclude: &AHashSet<ItemId>) -> Result<Vec<Arc<Item>>>;

    fn get(&self, id: &ItemId) -> Result<Option<Arc<Item>>>;

    fn counts(&self) -> IndexCounts;
}

/// Per-type item counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexCounts {
    pub lost: usize,
    pub found: usize,
    pub active: usize,
}

#[derive(Default)]
struct Catalog {
    items: AHashMap<ItemId, Arc<Item>>,
    buckets: AHashMap<(ItemType, Category), Vec<ItemId>>,
}

/// In-memory catalog bucketed by `(type, category)`
pub struct CandidateIndex {
    catalog: RwLock<Catalog>,
    compatibility: CategoryCompatibility,
    available: AtomicBool,
}

impl CandidateIndex {
    pub fn new(compatibility: CategoryCompatibility) -> Self {
        Self {
            catalog: RwLock::new(Catalog::default()),
            compatibility,
            available: AtomicBool::new(true),
        }
    }

    pub fn compatibility(&self) -> &CategoryCompatibility {
        &self.compatibility
    }

    /// Add a new item. Items are immutable, so a second insert with the same
    /// id is rejected rather than overwriting the stored embedding.
    pub fn insert(&self, item: Item) -> Result<Arc<Item>> {
        let mut catalog = self.catalog.write();
        if catalog.items.contains_key(&item.id) {
            return Err(Error::ItemExists(item.id.to_string()));
        }

        let item = Arc::new(item);
        catalog
            .buckets
            .entry((item.item_type, item.category))
            .or_default()
            .push(item.id.clone());
        catalog.items.insert(item.id.clone(), item.clone());
        Ok(item)
    }

    /// Remove an item, returning it if it was present
    pub fn remove(&self, id: &ItemId) -> Option<Arc<Item>> {
        let mut catalog = self.catalog.write();
        let item = catalog.items.remove(id)?;
        if let Some(bucket) = catalog.buckets.get_mut(&(item.item_type, item.category)) {
            bucket.retain(|bucket_id| bucket_id != id);
        }
        Some(item)
    }

    /// Update lifecycle status. Status is not a scoring input, so existing
    /// matches stay valid.
    pub fn set_status(&self, id: &ItemId, status: ItemStatus) -> Result<()> {
        let mut catalog = self.catalog.write();
        let slot = catalog
            .items
            .get_mut(id)
            .ok_or_else(|| Error::ItemNotFound(id.to_string()))?;
        if slot.status != status {
            let mut updated = (**slot).clone();
            updated.status = status;
            *slot = Arc::new(updated);
        }
        Ok(())
    }

    #[inline]
    pub fn contains(&self, id: &ItemId) -> bool {
        self.catalog.read().items.contains_key(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.catalog.read().items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn count_items(&self) -> IndexCounts {
        let catalog = self.catalog.read();
        let mut counts = IndexCounts::default();
        for item in catalog.items.values() {
            match item.item_type {
                ItemType::Lost => counts.lost += 1,
                ItemType::Found => counts.found += 1,
            }
            if item.is_active() {
                counts.active += 1;
            }
        }
        counts
    }

    /// Snapshot of all items
    pub fn iter(&self) -> Vec<Arc<Item>> {
        self.catalog.read().items.values().cloned().collect()
    }

    /// Mark the index as (un)reachable. While unavailable every lookup fails
    /// with [`Error::IndexUnavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    #[inline]
    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::IndexUnavailable("candidate index is offline".to_string()))
        }
    }
}

impl CandidateSource for CandidateIndex {
    fn candidates_for(&self, item: &Item, exclude: &AHashSet<ItemId>) -> Result<Vec<Arc<Item>>> {
        self.ensure_available()?;

        let wanted_type = item.item_type.opposite();
        let catalog = self.catalog.read();
        let mut out = Vec::new();

        for category in self.compatibility.compatible_with(item.category) {
            let Some(bucket) = catalog.buckets.get(&(wanted_type, category)) else {
                continue;
            };
            for id in bucket {
                if id == &item.id || exclude.contains(id) {
                    continue;
                }
                if let Some(candidate) = catalog.items.get(id) {
                    if candidate.is_active() {
                        out.push(candidate.clone());
                    }
                }
            }
        }

        tracing::trace!(item_id = %item.id, candidates = out.len(), "candidate lookup");
        Ok(out)
    }

    fn get(&self, id: &ItemId) -> Result<Option<Arc<Item>>> {
        self.ensure_available()?;
        Ok(self.catalog.read().items.get(id).cloned())
    }

    fn counts(&self) -> IndexCounts {
        self.count_items()
    }
}

impl Default for CandidateIndex {
    fn default() -> Self {
        Self::new(CategoryCompatibility::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ItemReport, Location};
    use chrono::Utc;

    fn item(id: &str, item_type: ItemType, category: Category) -> Item {
        let report = ItemReport {
            item_type,
            category,
            title: String::new(),
            description: format!("{} {}", item_type, category),
            location: Location::named("library"),
            created_at: Utc::now(),
            reward: None,
            contact: String::new(),
        };
        Item::from_report(ItemId::from(id), report, None).unwrap()
    }

    fn ids(items: &[Arc<Item>]) -> Vec<&str> {
        let mut ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_candidates_are_opposite_type_and_compatible_category() {
        let index = CandidateIndex::default();
        index.insert(item("f-bag", ItemType::Found, Category::Bag)).unwrap();
        index.insert(item("f-backpack", ItemType::Found, Category::Backpack)).unwrap();
        index.insert(item("f-keys", ItemType::Found, Category::Keys)).unwrap();
        index.insert(item("l-bag", ItemType::Lost, Category::Bag)).unwrap();

        let query = item("q", ItemType::Lost, Category::Backpack);
        let found = index.candidates_for(&query, &AHashSet::new()).unwrap();
        assert_eq!(ids(&found), vec!["f-backpack", "f-bag"]);
    }

    #[test]
    fn test_excluded_and_inactive_items_are_skipped() {
        let index = CandidateIndex::default();
        index.insert(item("f1", ItemType::Found, Category::Wallet)).unwrap();
        index.insert(item("f2", ItemType::Found, Category::Wallet)).unwrap();
        index.insert(item("f3", ItemType::Found, Category::Wallet)).unwrap();
        index.set_status(&ItemId::from("f3"), ItemStatus::Closed).unwrap();

        let mut exclude = AHashSet::new();
        exclude.insert(ItemId::from("f1"));

        let query = item("q", ItemType::Lost, Category::Wallet);
        let found = index.candidates_for(&query, &exclude).unwrap();
        assert_eq!(ids(&found), vec!["f2"]);
    }

    #[test]
    fn test_lookup_reflects_current_catalog() {
        let index = CandidateIndex::default();
        let query = item("q", ItemType::Found, Category::Phone);
        assert!(index.candidates_for(&query, &AHashSet::new()).unwrap().is_empty());

        index.insert(item("l1", ItemType::Lost, Category::Phone)).unwrap();
        assert_eq!(index.candidates_for(&query, &AHashSet::new()).unwrap().len(), 1);

        index.remove(&ItemId::from("l1"));
        assert!(index.candidates_for(&query, &AHashSet::new()).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let index = CandidateIndex::default();
        index.insert(item("a", ItemType::Lost, Category::Keys)).unwrap();
        let err = index.insert(item("a", ItemType::Lost, Category::Keys)).unwrap_err();
        assert!(matches!(err, Error::ItemExists(_)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_unavailable_index_is_retryable() {
        let index = CandidateIndex::default();
        index.set_available(false);
        let query = item("q", ItemType::Lost, Category::Keys);
        let err = index.candidates_for(&query, &AHashSet::new()).unwrap_err();
        assert!(err.is_retryable());

        index.set_available(true);
        assert!(index.candidates_for(&query, &AHashSet::new()).is_ok());
    }

    #[test]
    fn test_counts() {
        let index = CandidateIndex::default();
        index.insert(item("l1", ItemType::Lost, Category::Keys)).unwrap();
        index.insert(item("f1", ItemType::Found, Category::Keys)).unwrap();
        index.insert(item("f2", ItemType::Found, Category::Keys)).unwrap();
        index.set_status(&ItemId::from("f2"), ItemStatus::Matched).unwrap();

        assert_eq!(index.counts(), IndexCounts { lost: 1, found: 2, active: 2 });
    }
}
