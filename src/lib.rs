//! # Findora
//!
//! A lost-and-found match engine. Every new lost or found report is scored
//! against the catalog's opposite-type, category-compatible items using
//! image, text and spatial-temporal evidence; pairs above the confidence
//! floor are stored as matches and high-confidence ones trigger a
//! notification.
//!
//! ## Quick Start
//!
//! ### From the command line
//!
//! ```bash
//! findora match --catalog reports.json --images ./photos
//! findora agent --inbox ./inbox --interval 30 --data-dir ./data
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use findora::prelude::*;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryMatchStore::new());
//! let engine = MatchEngine::new(EngineConfig::default(), store).unwrap();
//!
//! let report = ItemReport {
//!     item_type: ItemType::Lost,
//!     category: Category::Wallet,
//!     title: "Black wallet".to_string(),
//!     description: "black leather wallet with gold clasp".to_string(),
//!     location: Location::at("Main St", 40.0, -73.0).unwrap(),
//!     created_at: chrono::Utc::now(),
//!     reward: Some(50.0),
//!     contact: "owner@example.com".to_string(),
//! };
//! let photo = std::fs::read("wallet.jpg").ok();
//! let id = engine.submit(report, photo).unwrap();
//!
//! engine.wait_idle();
//! for m in engine.matches_for(&id) {
//!     println!("{} <-> {}: {:.1}%", m.lost_item_id, m.found_item_id, m.percent());
//! }
//! ```
//!
//! ## Crate Structure
//!
//! - `findora-core` - items, embeddings, match records, candidate index
//! - `findora-similarity` - image embedder, text and proximity scorers, fusion
//! - `findora-storage` - pair-keyed match store, write-ahead log, snapshots
//! - `findora-engine` - match runs, deferred intake, notifications

pub mod catalog;

// Re-export core types
pub use findora_core::{
    CandidateIndex, CandidateSource, Category, CategoryCompatibility, CategoryRelation,
    ComponentScores, ConfidenceLevel, Embedding, Error, GeoPoint, Item, ItemId, ItemReport,
    ItemStatus, ItemType, Location, Match, MatchStatus, PairKey, Result,
};

// Re-export scoring
pub use findora_similarity::{ImageEmbedder, PairScore, PairScorer, RasterEmbedder, SimilarityConfig};

// Re-export storage
pub use findora_storage::{MatchStorage, MatchStore, MemoryMatchStore};

// Re-export engine
pub use findora_engine::{
    EngineConfig, EngineStats, LogNotifier, MatchEngine, MatchNotifier, MatchOrchestrator,
    RetryPolicy, RunSummary,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Category, EngineConfig, Error, Item, ItemId, ItemReport, ItemType, Location, Match,
        MatchEngine, MatchStorage, MatchStore, MemoryMatchStore, PairScorer, Result,
    };
}
