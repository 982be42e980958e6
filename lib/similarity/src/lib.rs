//! # Findora Similarity
//!
//! The scoring layer of the Findora match engine.
//!
//! ## Components
//!
//! - **Embedder**: image bytes to a unit-length visual [`Embedding`](findora_core::Embedding)
//! - **Text**: description overlap plus a category bonus, capped across categories
//! - **Proximity**: great-circle distance decay (or location-label overlap) times temporal decay
//! - **Fusion**: weighted combination with image-weight redistribution and a category ceiling
//! - **Scorer**: all of the above for one pair, producing a [`PairScore`]
//!
//! ## Example
//!
//! ```rust
//! use findora_similarity::{PairScorer, SimilarityConfig};
//! use findora_core::{Category, Item, ItemId, ItemReport, ItemType, Location};
//! use chrono::Utc;
//!
//! let scorer = PairScorer::new(SimilarityConfig::default()).unwrap();
//!
//! let lost = ItemReport {
//!     item_type: ItemType::Lost,
//!     category: Category::Keys,
//!     title: String::new(),
//!     description: "three keys on a red lanyard".to_string(),
//!     location: Location::at("Riverside Park", 40.80, -73.97).unwrap(),
//!     created_at: Utc::now(),
//!     reward: Some(20.0),
//!     contact: "owner@example.com".to_string(),
//! };
//! let found = ItemReport {
//!     item_type: ItemType::Found,
//!     description: "keys with red lanyard".to_string(),
//!     reward: None,
//!     ..lost.clone()
//! };
//!
//! let lost = Item::from_report(ItemId::from("lost-1"), lost, None).unwrap();
//! let found = Item::from_report(ItemId::from("found-1"), found, None).unwrap();
//!
//! let pair = scorer.score(&lost, &found);
//! assert!(pair.scores.image.is_none());
//! assert!((0.0..=1.0).contains(&pair.confidence));
//! ```
//!
//! ## Scoring Flow
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//! │  Embedding  │   │    Text     │   │  Proximity  │
//! │  (dot prod) │   │ (+category) │   │ (geo × time)│
//! └──────┬──────┘   └──────┬──────┘   └──────┬──────┘
//!        └─────────────────┼─────────────────┘
//!                   ┌──────┴──────┐
//!                   │   Fusion    │
//!                   │ (weights,   │
//!                   │  ceilings)  │
//!                   └─────────────┘
//! ```

pub mod config;
pub mod embedder;
pub mod fusion;
pub mod proximity;
pub mod scorer;
pub mod text;

pub use config::{
    ConfigError, EmbedderConfig, FusionWeights, ProximityConfig, SimilarityConfig, TextConfig,
    Thresholds,
};
pub use embedder::{EmbedError, ImageEmbedder, RasterEmbedder, RASTER_DIM};
pub use fusion::{Contributions, Fusion};
pub use proximity::{haversine_km, ProximityScorer};
pub use scorer::{PairScore, PairScorer};
pub use text::TextScorer;
