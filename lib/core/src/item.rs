use crate::{Embedding, Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque item identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Mint a fresh random id
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_string())
    }
}

impl From<Uuid> for ItemId {
    fn from(u: Uuid) -> Self {
        ItemId(u.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Lost,
    Found,
}

impl ItemType {
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            ItemType::Lost => ItemType::Found,
            ItemType::Found => ItemType::Lost,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::Lost => f.write_str("lost"),
            ItemType::Found => f.write_str("found"),
        }
    }
}

impl FromStr for ItemType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lost" => Ok(ItemType::Lost),
            "found" => Ok(ItemType::Found),
            other => Err(Error::InvalidItem(format!("unknown item type '{}'", other))),
        }
    }
}

/// Closed set of item categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Wallet,
    Phone,
    Keys,
    Bag,
    Backpack,
    Jewelry,
    Documents,
    Electronics,
    Clothing,
    Accessories,
    Other,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Wallet,
        Category::Phone,
        Category::Keys,
        Category::Bag,
        Category::Backpack,
        Category::Jewelry,
        Category::Documents,
        Category::Electronics,
        Category::Clothing,
        Category::Accessories,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Wallet => "wallet",
            Category::Phone => "phone",
            Category::Keys => "keys",
            Category::Bag => "bag",
            Category::Backpack => "backpack",
            Category::Jewelry => "jewelry",
            Category::Documents => "documents",
            Category::Electronics => "electronics",
            Category::Clothing => "clothing",
            Category::Accessories => "accessories",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| Error::InvalidItem(format!("unknown category '{}'", s.trim())))
    }
}

/// Lifecycle state owned by the external catalog.
///
/// Only `Active` items are offered as candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Active,
    Matched,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::InvalidItem(format!("latitude {} out of range", latitude)));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::InvalidItem(format!("longitude {} out of range", longitude)));
        }
        Ok(Self { latitude, longitude })
    }
}

/// Free-text place description with optional coordinates
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub label: String,
    #[serde(default)]
    pub coordinates: Option<GeoPoint>,
}

impl Location {
    pub fn named(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            coordinates: None,
        }
    }

    pub fn at(label: impl Into<String>, latitude: f64, longitude: f64) -> Result<Self> {
        Ok(Self {
            label: label.into(),
            coordinates: Some(GeoPoint::new(latitude, longitude)?),
        })
    }
}

/// An item report as submitted by the intake component, before the engine
/// assigns an id and extracts the embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemReport {
    pub item_type: ItemType,
    pub category: Category,
    #[serde(default)]
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub location: Location,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reward: Option<f64>,
    #[serde(default)]
    pub contact: String,
}

impl ItemReport {
    /// Reject reports the engine cannot score.
    pub fn validate(&self) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(Error::InvalidItem("description must not be empty".to_string()));
        }
        if let Some(coords) = self.location.coordinates {
            GeoPoint::new(coords.latitude, coords.longitude)?;
        }
        if let Some(reward) = self.reward {
            if self.item_type != ItemType::Lost {
                return Err(Error::InvalidItem(
                    "reward is only allowed on lost items".to_string(),
                ));
            }
            if !reward.is_finite() || reward < 0.0 {
                return Err(Error::InvalidItem(format!("invalid reward {}", reward)));
            }
        }
        Ok(())
    }
}

/// A catalog item.
///
/// Items are never updated in place: a correction arrives as a new report.
/// The embedding is computed once at creation; `None` means the image could
/// not be decoded and the item is scored without a visual term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub item_type: ItemType,
    pub category: Category,
    pub title: String,
    pub description: String,
    pub location: Location,
    pub created_at: DateTime<Utc>,
    pub reward: Option<f64>,
    pub contact: String,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default)]
    pub embedding: Option<Embedding>,
}

impl Item {
    /// Build a catalog item from a validated report
    pub fn from_report(id: ItemId, report: ItemReport, embedding: Option<Embedding>) -> Result<Self> {
        report.validate()?;
        Ok(Self {
            id,
            item_type: report.item_type,
            category: report.category,
            title: report.title,
            description: report.description,
            location: report.location,
            created_at: report.created_at,
            reward: report.reward,
            contact: report.contact,
            status: ItemStatus::Active,
            embedding,
        })
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == ItemStatus::Active
    }

    #[inline]
    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(item_type: ItemType) -> ItemReport {
        ItemReport {
            item_type,
            category: Category::Wallet,
            title: "Wallet".to_string(),
            description: "black leather wallet".to_string(),
            location: Location::named("Central Station"),
            created_at: Utc::now(),
            reward: None,
            contact: "owner@example.com".to_string(),
        }
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("Wallet".parse::<Category>().unwrap(), Category::Wallet);
        assert_eq!(" backpack ".parse::<Category>().unwrap(), Category::Backpack);
        assert!(matches!("umbrella".parse::<Category>(), Err(Error::InvalidItem(_))));
    }

    #[test]
    fn test_item_type_opposite() {
        assert_eq!(ItemType::Lost.opposite(), ItemType::Found);
        assert_eq!(ItemType::Found.opposite(), ItemType::Lost);
        assert_eq!("FOUND".parse::<ItemType>().unwrap(), ItemType::Found);
    }

    #[test]
    fn test_report_requires_description() {
        let mut r = report(ItemType::Lost);
        r.description = "   ".to_string();
        assert!(matches!(r.validate(), Err(Error::InvalidItem(_))));
    }

    #[test]
    fn test_reward_only_on_lost_items() {
        let mut lost = report(ItemType::Lost);
        lost.reward = Some(50.0);
        assert!(lost.validate().is_ok());

        let mut found = report(ItemType::Found);
        found.reward = Some(50.0);
        assert!(matches!(found.validate(), Err(Error::InvalidItem(_))));

        lost.reward = Some(-1.0);
        assert!(lost.validate().is_err());
    }

    #[test]
    fn test_coordinates_validated() {
        assert!(Location::at("north pole", 90.0, 0.0).is_ok());
        assert!(Location::at("nowhere", 91.0, 0.0).is_err());
        assert!(Location::at("nowhere", 0.0, -181.0).is_err());
    }

    #[test]
    fn test_serde_uses_lowercase_variants() {
        let item = Item::from_report(ItemId::from("i1"), report(ItemType::Lost), None).unwrap();
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["item_type"], "lost");
        assert_eq!(json["category"], "wallet");
        assert_eq!(json["status"], "active");
        assert_eq!(json["id"], "i1");
    }
}
