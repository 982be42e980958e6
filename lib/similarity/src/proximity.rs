//! Spatial-temporal proximity
//!
//! Where both reports carry coordinates the spatial term decays with
//! great-circle distance; otherwise the free-text location labels are
//! compared. The temporal term multiplies the spatial one and only ever
//! penalizes: a late "found" report is still a valid candidate.

use crate::config::ProximityConfig;
use crate::text::{jaccard_tokens, tokenize};
use chrono::{DateTime, Utc};
use findora_core::{GeoPoint, Item, Location};

/// Mean Earth radius (IUGG)
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Default)]
pub struct ProximityScorer {
    config: ProximityConfig,
}

impl ProximityScorer {
    pub fn new(config: ProximityConfig) -> Self {
        Self { config }
    }

    /// Spatial score times temporal decay, in [0, 1]
    pub fn score(&self, a: &Item, b: &Item) -> f32 {
        let spatial = self.spatial_score(&a.location, &b.location);
        let temporal = self.temporal_score(a.created_at, b.created_at);
        (spatial * temporal).clamp(0.0, 1.0)
    }

    pub fn spatial_score(&self, a: &Location, b: &Location) -> f32 {
        match (a.coordinates, b.coordinates) {
            (Some(pa), Some(pb)) => self.distance_decay(haversine_km(pa, pb)),
            _ => self.label_score(&a.label, &b.label),
        }
    }

    /// 1.0 at zero distance, strictly decreasing until it meets the floor;
    /// `exp(-3)` at the configured radius is already below the default floor.
    pub fn distance_decay(&self, distance_km: f64) -> f32 {
        if !distance_km.is_finite() {
            return self.config.spatial_floor;
        }
        if distance_km >= self.config.radius_km {
            return self.config.spatial_floor;
        }
        let decay = (-3.0 * distance_km.max(0.0) / self.config.radius_km).exp() as f32;
        decay.max(self.config.spatial_floor).min(1.0)
    }

    /// Coarse comparison of free-text location labels
    pub fn label_score(&self, a: &str, b: &str) -> f32 {
        let tokens_a = tokenize(a);
        let tokens_b = tokenize(b);
        if tokens_a.is_empty() || tokens_b.is_empty() {
            return self.config.unknown_location_score;
        }

        let joined_a = tokens_a.join(" ");
        let joined_b = tokens_b.join(" ");
        if joined_a == joined_b {
            return self.config.same_label_score;
        }
        if joined_a.contains(&joined_b) || joined_b.contains(&joined_a) {
            return self.config.contained_label_score;
        }

        // Tops out below the contained-label score: partial token overlap is
        // weaker evidence than one label containing the other.
        let ceiling = self.config.contained_label_score;
        (0.1 + (ceiling - 0.1).max(0.0) * jaccard_tokens(&tokens_a, &tokens_b)).clamp(0.0, ceiling)
    }

    /// Exponential decay in the gap between two report times, floored
    pub fn temporal_score(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> f32 {
        let gap_days = (a - b).num_seconds().unsigned_abs() as f64 / SECONDS_PER_DAY;
        let decay = (-gap_days / self.config.temporal_scale_days).exp() as f32;
        decay.max(self.config.temporal_floor).min(1.0)
    }
}

/// Great-circle distance in kilometres.
///
/// The two points are put in a canonical order first, so the result is
/// bit-identical for (a, b) and (b, a).
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (p, q) = if (a.latitude, a.longitude) <= (b.latitude, b.longitude) {
        (a, b)
    } else {
        (b, a)
    };

    let lat1 = p.latitude.to_radians();
    let lat2 = q.latitude.to_radians();
    let dlat = (q.latitude - p.latitude).to_radians();
    let dlon = (q.longitude - p.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use findora_core::{Category, ItemId, ItemReport, ItemType};

    fn geo(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    fn item(location: Location, created_at: DateTime<Utc>) -> Item {
        let report = ItemReport {
            item_type: ItemType::Found,
            category: Category::Phone,
            title: String::new(),
            description: "phone".to_string(),
            location,
            created_at,
            reward: None,
            contact: String::new(),
        };
        Item::from_report(ItemId::generate(), report, None).unwrap()
    }

    #[test]
    fn test_haversine_known_distance() {
        // Paris to London, roughly 344 km
        let d = haversine_km(geo(48.8566, 2.3522), geo(51.5074, -0.1278));
        assert!((d - 344.0).abs() < 2.0, "got {}", d);
        assert_eq!(haversine_km(geo(10.0, 10.0), geo(10.0, 10.0)), 0.0);
    }

    #[test]
    fn test_distance_decay_strictly_decreasing_until_floor() {
        let scorer = ProximityScorer::default();
        let mut previous = scorer.distance_decay(0.0);
        assert_eq!(previous, 1.0);

        let mut reached_floor = false;
        for step in 1..=60 {
            let score = scorer.distance_decay(step as f64 * 0.25);
            if reached_floor {
                assert_eq!(score, ProximityConfig::default().spatial_floor);
            } else if score == ProximityConfig::default().spatial_floor {
                reached_floor = true;
            } else {
                assert!(score < previous, "not decreasing at step {}", step);
            }
            previous = score;
        }
        assert!(reached_floor);
    }

    #[test]
    fn test_far_away_is_floor_not_zero() {
        let scorer = ProximityScorer::default();
        let score = scorer.distance_decay(500.0);
        assert!(score > 0.0);
        assert_eq!(score, ProximityConfig::default().spatial_floor);
    }

    #[test]
    fn test_temporal_decay_penalizes_but_never_eliminates() {
        let scorer = ProximityScorer::default();
        let t0 = Utc::now();
        let same = scorer.temporal_score(t0, t0);
        let two_hours = scorer.temporal_score(t0, t0 + Duration::hours(2));
        let week = scorer.temporal_score(t0, t0 + Duration::days(7));
        let year = scorer.temporal_score(t0, t0 + Duration::days(365));

        assert_eq!(same, 1.0);
        assert!(two_hours < same && two_hours > 0.99);
        assert!(week < two_hours);
        assert_eq!(year, ProximityConfig::default().temporal_floor);
        assert_eq!(scorer.temporal_score(t0 + Duration::days(7), t0), week);
    }

    #[test]
    fn test_label_fallback() {
        let scorer = ProximityScorer::default();
        assert_eq!(scorer.label_score("Central Station", "central station"), 0.8);
        assert_eq!(scorer.label_score("Central Station", "Central Station, platform 4"), 0.7);
        assert_eq!(scorer.label_score("", "Central Station"), 0.5);

        let partial = scorer.label_score("Central Station north exit", "Central Park");
        let none = scorer.label_score("Central Station", "Airport Terminal");
        assert!(partial > none);
        assert!(partial < 0.7);
        assert!((none - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_score_is_symmetric_and_bounded() {
        let scorer = ProximityScorer::default();
        let t0 = Utc::now();
        let a = item(Location::at("pier", 40.0, -73.0).unwrap(), t0);
        let b = item(Location::at("pier 2", 40.001, -73.001).unwrap(), t0 + Duration::hours(2));
        let c = item(Location::named("Pier 2 ticket office"), t0 + Duration::days(3));

        for (x, y) in [(&a, &b), (&a, &c), (&b, &c)] {
            let s = scorer.score(x, y);
            assert_eq!(s, scorer.score(y, x));
            assert!((0.0..=1.0).contains(&s));
        }
        assert!(scorer.score(&a, &b) > 0.9);
    }
}
