//! Pair scoring
//!
//! Runs the image, text and proximity scorers for one (lost, found) pair and
//! fuses the result. Scoring is a pure function of the two items.

use crate::config::{ConfigError, SimilarityConfig};
use crate::fusion::{Contributions, Fusion};
use crate::proximity::ProximityScorer;
use crate::text::TextScorer;
use chrono::{DateTime, Utc};
use findora_core::{
    CategoryCompatibility, CategoryRelation, ComponentScores, ConfidenceLevel, Item, Match,
};
use serde::Serialize;

/// Everything computed for one pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairScore {
    pub scores: ComponentScores,
    pub relation: CategoryRelation,
    pub confidence: f32,
    /// `None` when the pair falls below the persistence floor
    pub level: Option<ConfidenceLevel>,
    pub contributions: Contributions,
}

impl PairScore {
    #[inline]
    pub fn is_match(&self) -> bool {
        self.level.is_some()
    }
}

/// Scores candidate pairs
#[derive(Debug, Clone)]
pub struct PairScorer {
    text: TextScorer,
    proximity: ProximityScorer,
    fusion: Fusion,
    categories: CategoryCompatibility,
}

impl PairScorer {
    /// Build from a config, validating and normalizing it first
    pub fn new(mut config: SimilarityConfig) -> Result<Self, ConfigError> {
        config.validate_and_normalize()?;
        Ok(Self {
            text: TextScorer::new(config.text, config.categories.clone()),
            proximity: ProximityScorer::new(config.proximity),
            fusion: Fusion::new(config.weights, config.thresholds),
            categories: config.categories,
        })
    }

    pub fn fusion(&self) -> &Fusion {
        &self.fusion
    }

    pub fn text(&self) -> &TextScorer {
        &self.text
    }

    pub fn proximity(&self) -> &ProximityScorer {
        &self.proximity
    }

    /// Visual similarity, or `None` when either side has no embedding
    pub fn image_score(&self, a: &Item, b: &Item) -> Option<f32> {
        match (&a.embedding, &b.embedding) {
            (Some(ea), Some(eb)) => Some(ea.similarity(eb)),
            _ => None,
        }
    }

    pub fn score(&self, a: &Item, b: &Item) -> PairScore {
        let relation = self.categories.relation(a.category, b.category);
        let scores = ComponentScores {
            image: self.image_score(a, b),
            text: self.text.score(a, b),
            proximity: self.proximity.score(a, b),
        };
        let confidence = self.fusion.confidence(&scores, relation);

        PairScore {
            scores,
            relation,
            confidence,
            level: self.fusion.classify(confidence),
            contributions: self.fusion.contributions(&scores),
        }
    }

    /// Score a pair and build the match record, or `None` below the floor
    pub fn to_match(&self, a: &Item, b: &Item, computed_at: DateTime<Utc>) -> Option<Match> {
        let pair = self.score(a, b);
        pair.level
            .map(|level| Match::between(a, b, pair.confidence, pair.scores, level, computed_at))
    }
}

impl Default for PairScorer {
    fn default() -> Self {
        Self {
            text: TextScorer::default(),
            proximity: ProximityScorer::default(),
            fusion: Fusion::default(),
            categories: CategoryCompatibility::default(),
        }
    }
}
