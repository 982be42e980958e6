use crate::{Item, ItemId, ItemType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unordered pair of item ids, the storage key of a match.
///
/// `PairKey::new(a, b) == PairKey::new(b, a)`, so runs triggered from either
/// side of a pair write to the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    low: ItemId,
    high: ItemId,
}

impl PairKey {
    pub fn new(a: &ItemId, b: &ItemId) -> Self {
        if a <= b {
            Self { low: a.clone(), high: b.clone() }
        } else {
            Self { low: b.clone(), high: a.clone() }
        }
    }

    #[inline]
    pub fn contains(&self, id: &ItemId) -> bool {
        &self.low == id || &self.high == id
    }

    #[inline]
    pub fn ids(&self) -> (&ItemId, &ItemId) {
        (&self.low, &self.high)
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.low, self.high)
    }
}

/// The three component scores that produced a confidence value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    /// `None` when either image failed to decode
    pub image: Option<f32>,
    pub text: f32,
    pub proximity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Moderate,
}

/// Review state of a match; kept across recomputation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

/// A scored relation between one lost item and one found item.
///
/// Derived data: written only by the orchestrator, never edited by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub lost_item_id: ItemId,
    pub found_item_id: ItemId,
    pub confidence: f32,
    pub scores: ComponentScores,
    pub level: ConfidenceLevel,
    pub status: MatchStatus,
    pub computed_at: DateTime<Utc>,
}

impl Match {
    /// Orient a scored pair as (lost, found) regardless of argument order
    pub fn between(
        a: &Item,
        b: &Item,
        confidence: f32,
        scores: ComponentScores,
        level: ConfidenceLevel,
        computed_at: DateTime<Utc>,
    ) -> Self {
        let (lost, found) = match a.item_type {
            ItemType::Lost => (a, b),
            ItemType::Found => (b, a),
        };
        Self {
            lost_item_id: lost.id.clone(),
            found_item_id: found.id.clone(),
            confidence,
            scores,
            level,
            status: MatchStatus::Pending,
            computed_at,
        }
    }

    #[inline]
    pub fn key(&self) -> PairKey {
        PairKey::new(&self.lost_item_id, &self.found_item_id)
    }

    #[inline]
    pub fn involves(&self, id: &ItemId) -> bool {
        &self.lost_item_id == id || &self.found_item_id == id
    }

    /// The other side of the pair, if `id` is one side
    pub fn counterpart(&self, id: &ItemId) -> Option<&ItemId> {
        if &self.lost_item_id == id {
            Some(&self.found_item_id)
        } else if &self.found_item_id == id {
            Some(&self.lost_item_id)
        } else {
            None
        }
    }

    #[inline]
    pub fn is_high_confidence(&self) -> bool {
        self.level == ConfidenceLevel::High
    }

    /// Confidence as a display percentage
    #[inline]
    pub fn percent(&self) -> f32 {
        self.confidence * 100.0
    }

    /// Same score inputs and outputs, ignoring bookkeeping fields
    pub fn same_scores(&self, other: &Match) -> bool {
        self.lost_item_id == other.lost_item_id
            && self.found_item_id == other.found_item_id
            && self.confidence == other.confidence
            && self.scores == other.scores
            && self.level == other.level
    }
}
