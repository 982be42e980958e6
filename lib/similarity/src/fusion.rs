//! Fusion of component scores into one confidence value

use crate::config::{FusionWeights, Thresholds};
use findora_core::{CategoryRelation, ComponentScores, ConfidenceLevel};
use serde::Serialize;

/// Weighted contribution of each component to a fused confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Contributions {
    pub image: f32,
    pub text: f32,
    pub proximity: f32,
}

/// Combines image, text and proximity scores with fixed weights
#[derive(Debug, Clone)]
pub struct Fusion {
    weights: FusionWeights,
    thresholds: Thresholds,
}

impl Fusion {
    /// `weights` are expected to be validated and normalized already
    pub fn new(weights: FusionWeights, thresholds: Thresholds) -> Self {
        Self { weights, thresholds }
    }

    pub fn weights(&self) -> &FusionWeights {
        &self.weights
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Weights actually applied, with the image weight spread proportionally
    /// over text and proximity when there is no image score
    pub fn effective_weights(&self, has_image: bool) -> FusionWeights {
        if has_image {
            return self.weights;
        }
        let rest = self.weights.text + self.weights.proximity;
        if rest <= 0.0 {
            return FusionWeights { image: 0.0, text: 0.5, proximity: 0.5 };
        }
        FusionWeights {
            image: 0.0,
            text: self.weights.text / rest,
            proximity: self.weights.proximity / rest,
        }
    }

    pub fn contributions(&self, scores: &ComponentScores) -> Contributions {
        let image = scores.image.map(unit);
        let w = self.effective_weights(image.is_some());
        Contributions {
            image: image.map(|s| s * w.image).unwrap_or(0.0),
            text: unit(scores.text) * w.text,
            proximity: unit(scores.proximity) * w.proximity,
        }
    }

    /// Fused confidence in [0, 1], rounded to the configured precision.
    ///
    /// Cross-category pairs are capped below the persistence floor whatever
    /// their component scores.
    pub fn confidence(&self, scores: &ComponentScores, relation: CategoryRelation) -> f32 {
        let c = self.contributions(scores);
        let mut confidence = (c.image + c.text + c.proximity).clamp(0.0, 1.0);

        if relation == CategoryRelation::Mismatch {
            confidence = confidence.min(self.thresholds.cross_category_ceiling);
        }

        round_to(confidence, self.thresholds.decimals)
    }

    /// `None` means the pair is below the floor and must not be stored
    pub fn classify(&self, confidence: f32) -> Option<ConfidenceLevel> {
        if confidence < self.thresholds.min_confidence {
            None
        } else if confidence >= self.thresholds.high_confidence {
            Some(ConfidenceLevel::High)
        } else {
            Some(ConfidenceLevel::Moderate)
        }
    }
}

impl Default for Fusion {
    fn default() -> Self {
        Self::new(FusionWeights::default(), Thresholds::default())
    }
}

/// NaN counts as no evidence
#[inline]
fn unit(score: f32) -> f32 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Round to `decimals` places in f64 so the stored value is stable
pub fn round_to(value: f32, decimals: u32) -> f32 {
    let factor = 10f64.powi(decimals as i32);
    ((value as f64 * factor).round() / factor) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(image: Option<f32>, text: f32, proximity: f32) -> ComponentScores {
        ComponentScores { image, text, proximity }
    }

    #[test]
    fn test_weighted_sum() {
        let fusion = Fusion::default();
        let c = fusion.confidence(&scores(Some(1.0), 0.5, 0.0), CategoryRelation::Same);
        assert!((c - 0.65).abs() < 1e-6);
    }

    #[test]
    fn test_missing_image_redistributes_weight() {
        let fusion = Fusion::default();
        let w = fusion.effective_weights(false);
        assert_eq!(w.image, 0.0);
        assert!((w.text - 0.6).abs() < 1e-6);
        assert!((w.proximity - 0.4).abs() < 1e-6);

        // Perfect text and proximity reach full confidence without an image
        let c = fusion.confidence(&scores(None, 1.0, 1.0), CategoryRelation::Same);
        assert!((c - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_image_beats_zero_image() {
        let fusion = Fusion::default();
        let missing = fusion.confidence(&scores(None, 0.8, 0.9), CategoryRelation::Same);
        let zero = fusion.confidence(&scores(Some(0.0), 0.8, 0.9), CategoryRelation::Same);
        assert!(missing > zero);
    }

    #[test]
    fn test_mismatch_ceiling() {
        let fusion = Fusion::default();
        let c = fusion.confidence(&scores(Some(1.0), 1.0, 1.0), CategoryRelation::Mismatch);
        assert_eq!(c, 0.25);
        assert_eq!(fusion.classify(c), None);
    }

    #[test]
    fn test_out_of_range_inputs_are_clamped() {
        let fusion = Fusion::default();
        let c = fusion.confidence(&scores(Some(3.0), 2.0, f32::NAN), CategoryRelation::Same);
        assert!((0.0..=1.0).contains(&c));
        let c = fusion.confidence(&scores(Some(-1.0), -2.0, -0.5), CategoryRelation::Same);
        assert_eq!(c, 0.0);
    }

    #[test]
    fn test_classification() {
        let fusion = Fusion::default();
        assert_eq!(fusion.classify(0.29), None);
        assert_eq!(fusion.classify(0.30), Some(ConfidenceLevel::Moderate));
        assert_eq!(fusion.classify(0.7999), Some(ConfidenceLevel::Moderate));
        assert_eq!(fusion.classify(0.80), Some(ConfidenceLevel::High));
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round_to(0.123456, 4), 0.1235);
        assert_eq!(round_to(0.5, 4), 0.5);
    }
}
