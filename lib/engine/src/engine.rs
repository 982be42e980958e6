use ahash::AHashSet;
use crate::background::{BackgroundJob, WorkerPool};
use crate::config::{EngineConfig, RetryPolicy};
use crate::notify::{LogNotifier, MatchNotifier};
use crate::orchestrator::{EngineStats, MatchOrchestrator, RunSummary};
use findora_core::{CandidateIndex, Error, Item, ItemId, ItemReport, ItemStatus, Match, Result};
use findora_similarity::{ImageEmbedder, PairScorer, RasterEmbedder};
use findora_storage::MatchStore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

/// Item intake with deferred matching.
///
/// `submit` validates a report and returns its id immediately; embedding,
/// indexing and the match run happen on a worker thread.
pub struct MatchEngine {
    index: Arc<CandidateIndex>,
    orchestrator: Arc<MatchOrchestrator>,
    embedder: Arc<dyn ImageEmbedder>,
    retry: RetryPolicy,
    counters: Arc<RunCounters>,
    /// Ids accepted by `submit` but not yet in the index
    queued: Arc<Mutex<AHashSet<ItemId>>>,
    pool: WorkerPool,
}

#[derive(Default)]
struct RunCounters {
    completed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
}

impl MatchEngine {
    pub fn new(config: EngineConfig, store: Arc<dyn MatchStore>) -> Result<Self> {
        Self::with_notifier(config, store, Arc::new(LogNotifier))
    }

    pub fn with_notifier(
        mut config: EngineConfig,
        store: Arc<dyn MatchStore>,
        notifier: Arc<dyn MatchNotifier>,
    ) -> Result<Self> {
        config.validate_and_normalize()?;

        let embedder = Arc::new(RasterEmbedder::new(config.similarity.embedder.clone()));
        let index = Arc::new(CandidateIndex::new(config.similarity.categories.clone()));
        let scorer = PairScorer::new(config.similarity)?;
        let orchestrator = MatchOrchestrator::new(index.clone(), store, scorer)
            .with_notifier(notifier)
            .with_max_matches(config.max_matches_per_item);

        let pool = WorkerPool::new("findora-intake", config.worker.threads)?;
        tracing::debug!(threads = config.worker.threads, "match engine started");

        Ok(Self {
            index,
            orchestrator: Arc::new(orchestrator),
            embedder,
            retry: config.worker.retry,
            counters: Arc::new(RunCounters::default()),
            queued: Arc::new(Mutex::new(AHashSet::new())),
            pool,
        })
    }

    pub fn index(&self) -> &Arc<CandidateIndex> {
        &self.index
    }

    pub fn orchestrator(&self) -> &MatchOrchestrator {
        &self.orchestrator
    }

    /// Accept a report with a freshly generated id
    pub fn submit(&self, report: ItemReport, image: Option<Vec<u8>>) -> Result<ItemId> {
        self.submit_with_id(ItemId::generate(), report, image)
    }

    /// Accept a report under a caller-chosen id
    pub fn submit_with_id(
        &self,
        id: ItemId,
        report: ItemReport,
        image: Option<Vec<u8>>,
    ) -> Result<ItemId> {
        report.validate()?;
        let mut queued = self.queued.lock();
        if self.index.contains(&id) || !queued.insert(id.clone()) {
            return Err(Error::ItemExists(id.to_string()));
        }

        let job = IntakeJob {
            id: id.clone(),
            report,
            image,
            embedder: self.embedder.clone(),
            index: self.index.clone(),
            orchestrator: self.orchestrator.clone(),
            retry: self.retry,
            counters: self.counters.clone(),
            queued: self.queued.clone(),
        };
        if let Err(e) = self.pool.submit(Box::new(job)) {
            queued.remove(&id);
            return Err(e);
        }
        drop(queued);
        tracing::debug!(item_id = %id, "item queued");
        Ok(id)
    }

    /// Remove an item from the catalog along with its matches
    pub fn remove_item(&self, id: &ItemId) -> Result<bool> {
        let removed = self.index.remove(id).is_some();
        self.orchestrator.on_item_removed(id)?;
        Ok(removed)
    }

    /// Update lifecycle status. Non-active items stop appearing as candidates;
    /// existing matches are kept.
    pub fn set_item_status(&self, id: &ItemId, status: ItemStatus) -> Result<()> {
        self.index.set_status(id, status)
    }

    pub fn matches_for(&self, id: &ItemId) -> Vec<Match> {
        self.orchestrator.matches_for(id)
    }

    pub fn stats(&self) -> EngineStats {
        self.orchestrator.stats()
    }

    /// Runs that gave up (invalid item, duplicate id, retries exhausted)
    pub fn failed_runs(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }

    pub fn completed_runs(&self) -> u64 {
        self.counters.completed.load(Ordering::Relaxed)
    }

    pub fn retried_runs(&self) -> u64 {
        self.counters.retried.load(Ordering::Relaxed)
    }

    pub fn pending(&self) -> usize {
        self.pool.pending()
    }

    /// Block until every submitted item has been processed
    pub fn wait_idle(&self) {
        self.pool.wait_idle();
    }

    /// Finish queued work and stop the workers
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}

struct IntakeJob {
    id: ItemId,
    report: ItemReport,
    image: Option<Vec<u8>>,
    embedder: Arc<dyn ImageEmbedder>,
    index: Arc<CandidateIndex>,
    orchestrator: Arc<MatchOrchestrator>,
    retry: RetryPolicy,
    counters: Arc<RunCounters>,
    queued: Arc<Mutex<AHashSet<ItemId>>>,
}

impl IntakeJob {
    fn build_item(&self) -> Result<Item> {
        let embedding = match &self.image {
            Some(bytes) => match self.embedder.embed(bytes) {
                Ok(embedding) => Some(embedding),
                Err(e) => {
                    tracing::warn!(item_id = %self.id, error = %e, "image not usable, scoring without it");
                    None
                }
            },
            None => None,
        };
        Item::from_report(self.id.clone(), self.report.clone(), embedding)
    }

    fn run_with_retry(&self, item: &Item) -> Result<RunSummary> {
        let mut attempt = 1;
        loop {
            match self.orchestrator.on_item_created(item) {
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        item_id = %item.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "match run failed, retrying"
                    );
                    self.counters.retried.fetch_add(1, Ordering::Relaxed);
                    thread::sleep(delay);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

impl BackgroundJob for IntakeJob {
    fn execute(self: Box<Self>) {
        let indexed = self.build_item().and_then(|item| self.index.insert(item));
        // Indexed (or failed) ids are no longer duplicates-in-waiting
        self.queued.lock().remove(&self.id);
        let outcome = indexed.and_then(|item| self.run_with_retry(&item));

        match outcome {
            Ok(summary) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    item_id = %self.id,
                    candidates = summary.candidates,
                    matched = summary.matched,
                    high = summary.high_confidence,
                    "item matched"
                );
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(item_id = %self.id, error = %e, "match run abandoned");
            }
        }
    }
}
