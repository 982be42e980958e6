//! Match runs
//!
//! A run scores one newly created item against every candidate the index
//! returns and commits the surviving pairs in a single batch. Runs for
//! different items are independent; two runs that reach the same pair from
//! opposite sides converge on one record because the store is keyed by the
//! unordered pair and upserts are idempotent.

use crate::notify::{LogNotifier, MatchNotifier};
use chrono::Utc;
use findora_core::{CandidateSource, Error, Item, ItemId, Match, PairKey, Result};
use findora_similarity::PairScorer;
use findora_storage::{MatchStore, UpsertOutcome};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of one match run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub item_id: ItemId,
    /// Candidates returned by the index
    pub candidates: usize,
    /// Pairs at or above the confidence floor, after the per-run cap
    pub matched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub high_confidence: usize,
    /// The item left the catalog before the run committed
    pub discarded: bool,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Catalog and match totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub lost_items: usize,
    pub found_items: usize,
    pub active_items: usize,
    pub matches: usize,
    pub high_confidence_matches: usize,
}

pub struct MatchOrchestrator {
    source: Arc<dyn CandidateSource>,
    store: Arc<dyn MatchStore>,
    scorer: PairScorer,
    notifier: Arc<dyn MatchNotifier>,
    max_matches_per_item: Option<usize>,
}

impl MatchOrchestrator {
    pub fn new(source: Arc<dyn CandidateSource>, store: Arc<dyn MatchStore>, scorer: PairScorer) -> Self {
        Self {
            source,
            store,
            scorer,
            notifier: Arc::new(LogNotifier),
            max_matches_per_item: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn MatchNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_max_matches(mut self, max_matches_per_item: Option<usize>) -> Self {
        self.max_matches_per_item = max_matches_per_item;
        self
    }

    pub fn scorer(&self) -> &PairScorer {
        &self.scorer
    }

    pub fn store(&self) -> &Arc<dyn MatchStore> {
        &self.store
    }

    /// Score a new item against its candidates and commit the matches.
    ///
    /// Nothing is written if the candidate lookup fails; the error is
    /// returned so the caller can retry the whole run.
    pub fn on_item_created(&self, item: &Item) -> Result<RunSummary> {
        let started = Instant::now();
        let exclude = self.store.matched_ids(&item.id);
        let candidates = self.source.candidates_for(item, &exclude)?;

        let computed_at = Utc::now();
        let mut matches: Vec<Match> = candidates
            .par_iter()
            .filter_map(|candidate| self.scorer.to_match(item, candidate, computed_at))
            .collect();
        matches.sort_by(|a, b| rank(a, b, &item.id));
        if let Some(k) = self.max_matches_per_item {
            matches.truncate(k);
        }

        let mut summary = RunSummary {
            item_id: item.id.clone(),
            candidates: candidates.len(),
            matched: matches.len(),
            inserted: 0,
            updated: 0,
            unchanged: 0,
            high_confidence: 0,
            discarded: false,
            elapsed: Duration::ZERO,
        };

        if self.source.get(&item.id)?.is_none() {
            tracing::debug!(item_id = %item.id, "item removed during run, discarding results");
            summary.discarded = true;
            summary.elapsed = started.elapsed();
            return Ok(summary);
        }

        let outcomes = self.store.upsert_batch(matches.clone())?;

        // Removed between the check above and the commit
        if self.source.get(&item.id)?.is_none() {
            self.store.remove_item(&item.id)?;
            summary.discarded = true;
            summary.elapsed = started.elapsed();
            return Ok(summary);
        }

        for (record, outcome) in matches.iter().zip(&outcomes) {
            // Candidate removed mid-run; its own cleanup may already be done
            if let Some(counterpart) = record.counterpart(&item.id) {
                if self.source.get(counterpart)?.is_none() {
                    self.store.remove(&record.key())?;
                    summary.matched -= 1;
                    tracing::debug!(
                        item_id = %item.id,
                        counterpart = %counterpart,
                        "candidate removed during run"
                    );
                    continue;
                }
            }
            match outcome {
                UpsertOutcome::Inserted => summary.inserted += 1,
                UpsertOutcome::Updated => summary.updated += 1,
                UpsertOutcome::Unchanged => summary.unchanged += 1,
            }
            if record.is_high_confidence() {
                summary.high_confidence += 1;
                if outcome.changed() {
                    self.notifier.notify(record);
                }
            }
        }

        summary.elapsed = started.elapsed();
        tracing::debug!(
            item_id = %item.id,
            candidates = summary.candidates,
            matched = summary.matched,
            high = summary.high_confidence,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "match run committed"
        );
        Ok(summary)
    }

    /// Recompute one pair and store the result.
    ///
    /// Returns the stored record, or `None` (and removes any stored record)
    /// when the pair no longer reaches the floor.
    pub fn rescore_pair(&self, a: &Item, b: &Item) -> Result<Option<Match>> {
        if a.item_type == b.item_type {
            return Err(Error::InvalidItem(format!(
                "{} and {} are both {} items",
                a.id, b.id, a.item_type
            )));
        }

        match self.scorer.to_match(a, b, Utc::now()) {
            Some(record) => {
                let key = record.key();
                let outcome = self.store.upsert(record)?;
                let stored = self.store.get(&key);
                if let Some(stored) = &stored {
                    if outcome.changed() && stored.is_high_confidence() {
                        self.notifier.notify(stored);
                    }
                }
                Ok(stored)
            }
            None => {
                self.store.remove(&PairKey::new(&a.id, &b.id))?;
                Ok(None)
            }
        }
    }

    /// Matches involving `id`, highest confidence first
    pub fn matches_for(&self, id: &ItemId) -> Vec<Match> {
        let mut matches = self.store.matches_for(id);
        matches.sort_by(|a, b| rank(a, b, id));
        matches
    }

    /// Drop every match involving `id`
    pub fn on_item_removed(&self, id: &ItemId) -> Result<usize> {
        let removed = self.store.remove_item(id)?;
        if removed > 0 {
            tracing::debug!(item_id = %id, removed, "dropped matches of removed item");
        }
        Ok(removed)
    }

    pub fn stats(&self) -> EngineStats {
        let counts = self.source.counts();
        let all = self.store.all();
        EngineStats {
            lost_items: counts.lost,
            found_items: counts.found,
            active_items: counts.active,
            matches: all.len(),
            high_confidence_matches: all.iter().filter(|m| m.is_high_confidence()).count(),
        }
    }
}

/// Descending confidence, then ascending counterpart id
fn rank(a: &Match, b: &Match, viewer: &ItemId) -> Ordering {
    OrderedFloat(b.confidence)
        .cmp(&OrderedFloat(a.confidence))
        .then_with(|| a.counterpart(viewer).cmp(&b.counterpart(viewer)))
}
