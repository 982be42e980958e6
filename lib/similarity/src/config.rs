//! Scoring configuration
//!
//! Every tunable of the scoring pipeline lives here: fusion weights,
//! confidence thresholds, text and proximity decay parameters, the image
//! embedder's layout and the category compatibility table. All sections
//! deserialize with defaults, so a config file only names what it changes.

use findora_core::CategoryCompatibility;
use serde::{Deserialize, Serialize};

/// Full scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SimilarityConfig {
    pub weights: FusionWeights,
    pub thresholds: Thresholds,
    pub text: TextConfig,
    pub proximity: ProximityConfig,
    pub embedder: EmbedderConfig,
    pub categories: CategoryCompatibility,
}

impl SimilarityConfig {
    /// Validate every section and normalize fusion weights to sum to 1.0
    pub fn validate_and_normalize(&mut self) -> Result<(), ConfigError> {
        self.weights.validate_and_normalize()?;
        self.thresholds.validate()?;
        self.text.validate()?;
        self.proximity.validate()?;
        self.embedder.validate()?;
        Ok(())
    }
}

/// Relative weight of each modality in the fused confidence
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FusionWeights {
    pub image: f32,
    pub text: f32,
    pub proximity: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            image: 0.5,
            text: 0.3,
            proximity: 0.2,
        }
    }
}

impl FusionWeights {
    pub fn validate_and_normalize(&mut self) -> Result<(), ConfigError> {
        for (name, weight) in [("image", self.image), ("text", self.text), ("proximity", self.proximity)] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::NegativeWeight(name.to_string()));
            }
        }

        // Text and proximity carry the whole score when an image is missing.
        if self.text + self.proximity <= 0.0 {
            return Err(ConfigError::ZeroTotalWeight);
        }

        let sum = self.image + self.text + self.proximity;
        if (sum - 1.0).abs() > 0.001 {
            self.image /= sum;
            self.text /= sum;
            self.proximity /= sum;
        }
        Ok(())
    }
}

/// Confidence cut-offs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Thresholds {
    /// Pairs below this are discarded, not stored
    pub min_confidence: f32,
    /// Pairs at or above this are high-confidence
    pub high_confidence: f32,
    /// Cap on the fused confidence of a cross-category pair
    pub cross_category_ceiling: f32,
    /// Decimal places kept in the stored confidence
    pub decimals: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_confidence: 0.30,
            high_confidence: 0.80,
            cross_category_ceiling: 0.25,
            decimals: 4,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_interval("thresholds.min_confidence", self.min_confidence)?;
        unit_interval("thresholds.high_confidence", self.high_confidence)?;
        unit_interval("thresholds.cross_category_ceiling", self.cross_category_ceiling)?;
        if self.min_confidence > self.high_confidence {
            return Err(ConfigError::Inconsistent(
                "min_confidence must not exceed high_confidence".to_string(),
            ));
        }
        if self.cross_category_ceiling >= self.high_confidence {
            return Err(ConfigError::Inconsistent(
                "cross_category_ceiling must stay below high_confidence".to_string(),
            ));
        }
        if self.decimals == 0 || self.decimals > 6 {
            return Err(ConfigError::OutOfRange {
                field: "thresholds.decimals".to_string(),
                value: self.decimals as f64,
            });
        }
        Ok(())
    }
}

/// Text scorer parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TextConfig {
    /// Share of the text score taken by the category bonus
    pub category_bonus_weight: f32,
    /// Bonus awarded for compatible (not identical) categories
    pub compatible_bonus: f32,
    /// Cap on the text score of a cross-category pair
    pub cross_category_ceiling: f32,
    /// Share of character trigrams in the lexical blend (rest is term cosine)
    pub trigram_weight: f32,
    /// Prepend the title to the description before scoring
    pub include_title: bool,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            category_bonus_weight: 0.2,
            compatible_bonus: 0.5,
            cross_category_ceiling: 0.3,
            trigram_weight: 0.25,
            include_title: false,
        }
    }
}

impl TextConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_interval("text.category_bonus_weight", self.category_bonus_weight)?;
        unit_interval("text.compatible_bonus", self.compatible_bonus)?;
        unit_interval("text.cross_category_ceiling", self.cross_category_ceiling)?;
        unit_interval("text.trigram_weight", self.trigram_weight)?;
        Ok(())
    }
}

/// Spatial and temporal decay parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProximityConfig {
    /// Distance at which the spatial score reaches its floor
    pub radius_km: f64,
    pub spatial_floor: f32,
    /// e-folding time of the temporal decay
    pub temporal_scale_days: f64,
    pub temporal_floor: f32,
    /// Score used when a location label is missing on either side
    pub unknown_location_score: f32,
    /// Location labels that normalize to the same text
    pub same_label_score: f32,
    /// One location label contains the other
    pub contained_label_score: f32,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            radius_km: 10.0,
            spatial_floor: 0.05,
            temporal_scale_days: 30.0,
            temporal_floor: 0.30,
            unknown_location_score: 0.5,
            same_label_score: 0.8,
            contained_label_score: 0.7,
        }
    }
}

impl ProximityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("proximity.radius_km", self.radius_km)?;
        positive("proximity.temporal_scale_days", self.temporal_scale_days)?;
        unit_interval("proximity.spatial_floor", self.spatial_floor)?;
        unit_interval("proximity.temporal_floor", self.temporal_floor)?;
        unit_interval("proximity.unknown_location_score", self.unknown_location_score)?;
        unit_interval("proximity.same_label_score", self.same_label_score)?;
        unit_interval("proximity.contained_label_score", self.contained_label_score)?;
        Ok(())
    }
}

/// Layout of the raster embedding
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbedderConfig {
    /// Side of the square thumbnail features are computed on
    pub thumbnail_size: u32,
    /// Reject encoded images larger than this many bytes
    pub max_image_bytes: usize,
    /// Weight of the colour histogram block
    pub color_weight: f32,
    /// Weight of the luminance layout block
    pub layout_weight: f32,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            thumbnail_size: 32,
            max_image_bytes: 20 * 1024 * 1024,
            color_weight: 0.5,
            layout_weight: 0.5,
        }
    }
}

impl EmbedderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thumbnail_size < 8 || self.thumbnail_size % 8 != 0 {
            return Err(ConfigError::OutOfRange {
                field: "embedder.thumbnail_size".to_string(),
                value: self.thumbnail_size as f64,
            });
        }
        if self.max_image_bytes == 0 {
            return Err(ConfigError::OutOfRange {
                field: "embedder.max_image_bytes".to_string(),
                value: 0.0,
            });
        }
        for (name, weight) in [
            ("embedder.color_weight", self.color_weight),
            ("embedder.layout_weight", self.layout_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::NegativeWeight(name.to_string()));
            }
        }
        if self.color_weight + self.layout_weight <= 0.0 {
            return Err(ConfigError::ZeroTotalWeight);
        }
        Ok(())
    }
}

fn unit_interval(field: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field: field.to_string(),
            value: value as f64,
        })
    }
}

fn positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field: field.to_string(),
            value,
        })
    }
}

/// Errors that can occur during config validation
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Weight '{0}' must be a non-negative number")]
    NegativeWeight(String),

    #[error("Total weight cannot be zero")]
    ZeroTotalWeight,

    #[error("'{field}' is out of range: {value}")]
    OutOfRange { field: String, value: f64 },

    #[error("Inconsistent thresholds: {0}")]
    Inconsistent(String),
}

impl From<ConfigError> for findora_core::Error {
    fn from(e: ConfigError) -> Self {
        findora_core::Error::InvalidConfig(e.to_string())
    }
}
