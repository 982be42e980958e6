//! # Findora Core
//!
//! Core data structures for the Findora lost-and-found match engine.
//!
//! - [`Item`] - An immutable lost or found report with its image [`Embedding`]
//! - [`Match`] - A scored relation between one lost and one found item
//! - [`CandidateIndex`] - `(type, category)` buckets for candidate retrieval
//! - [`CategoryCompatibility`] - Which categories may describe the same object
//!
//! ## Example
//!
//! ```rust
//! use findora_core::{
//!     CandidateIndex, CandidateSource, Category, Item, ItemId, ItemReport, ItemType, Location,
//! };
//! use ahash::AHashSet;
//! use chrono::Utc;
//!
//! let index = CandidateIndex::default();
//!
//! let report = ItemReport {
//!     item_type: ItemType::Found,
//!     category: Category::Backpack,
//!     title: "Blue backpack".to_string(),
//!     description: "blue backpack with laptop sleeve".to_string(),
//!     location: Location::named("Library, 2nd floor"),
//!     created_at: Utc::now(),
//!     reward: None,
//!     contact: "desk@library.example".to_string(),
//! };
//! index.insert(Item::from_report(ItemId::from("found-1"), report.clone(), None).unwrap()).unwrap();
//!
//! // A lost "bag" sees the found "backpack": the categories are compatible.
//! let lost = ItemReport { item_type: ItemType::Lost, category: Category::Bag, ..report };
//! let lost = Item::from_report(ItemId::from("lost-1"), lost, None).unwrap();
//! let candidates = index.candidates_for(&lost, &AHashSet::new()).unwrap();
//! assert_eq!(candidates.len(), 1);
//! ```

pub mod category;
pub mod embedding;
pub mod error;
pub mod index;
pub mod item;
pub mod matching;

pub use category::{CategoryCompatibility, CategoryRelation};
pub use embedding::Embedding;
pub use error::{Error, Result};
pub use index::{CandidateIndex, CandidateSource, IndexCounts};
pub use item::{Category, GeoPoint, Item, ItemId, ItemReport, ItemStatus, ItemType, Location};
pub use matching::{ComponentScores, ConfidenceLevel, Match, MatchStatus, PairKey};
