//! Text similarity between item descriptions
//!
//! All functions return a similarity in [0.0, 1.0] and are symmetric in their
//! arguments. Term bags use ordered maps so the floating point summation order
//! does not depend on which item comes first.

use crate::config::TextConfig;
use findora_core::{CategoryCompatibility, CategoryRelation, Item};
use std::collections::{BTreeMap, HashSet};

const STOP_WORDS: &[&str] = &[
    "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "in", "is", "it",
    "its", "my", "of", "on", "or", "that", "the", "this", "to", "was", "were", "with",
];

/// Scores two items by description overlap and category agreement
#[derive(Debug, Clone)]
pub struct TextScorer {
    config: TextConfig,
    categories: CategoryCompatibility,
}

impl TextScorer {
    pub fn new(config: TextConfig, categories: CategoryCompatibility) -> Self {
        Self { config, categories }
    }

    /// Full text score for a pair, including the category bonus and the
    /// cross-category ceiling
    pub fn score(&self, a: &Item, b: &Item) -> f32 {
        let relation = self.categories.relation(a.category, b.category);
        let lexical = self.lexical_similarity(&self.item_text(a), &self.item_text(b));
        self.combine(lexical, relation)
    }

    /// Fold the category relation into a lexical similarity
    pub fn combine(&self, lexical: f32, relation: CategoryRelation) -> f32 {
        let bonus = match relation {
            CategoryRelation::Same => 1.0,
            CategoryRelation::Compatible => self.config.compatible_bonus,
            CategoryRelation::Mismatch => 0.0,
        };
        let w = self.config.category_bonus_weight;
        let score = ((1.0 - w) * lexical.clamp(0.0, 1.0) + w * bonus).clamp(0.0, 1.0);

        match relation {
            CategoryRelation::Mismatch => score.min(self.config.cross_category_ceiling),
            CategoryRelation::Same | CategoryRelation::Compatible => score,
        }
    }

    /// Blend of term-frequency cosine and character trigram overlap
    pub fn lexical_similarity(&self, a: &str, b: &str) -> f32 {
        let tokens_a = tokenize(a);
        let tokens_b = tokenize(b);
        if tokens_a.is_empty() || tokens_b.is_empty() {
            return 0.0;
        }

        let cosine = term_cosine(&tokens_a, &tokens_b);
        let trigram = trigram_similarity(&tokens_a.join(" "), &tokens_b.join(" "));
        let t = self.config.trigram_weight;
        ((1.0 - t) * cosine + t * trigram).clamp(0.0, 1.0)
    }

    fn item_text(&self, item: &Item) -> String {
        if self.config.include_title && !item.title.trim().is_empty() {
            format!("{} {}", item.title, item.description)
        } else {
            item.description.clone()
        }
    }
}

impl Default for TextScorer {
    fn default() -> Self {
        Self::new(TextConfig::default(), CategoryCompatibility::default())
    }
}

/// Lower-case, split on whitespace and punctuation, drop one-character
/// tokens and stop words
pub fn tokenize(text: &str) -> Vec<String> {
    text.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .map(|s| s.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|s| s.chars().count() > 1 && !STOP_WORDS.contains(s))
        .map(str::to_string)
        .collect()
}

/// Cosine similarity of term-frequency bags
fn term_cosine(a: &[String], b: &[String]) -> f32 {
    let bag_a = term_frequencies(a);
    let bag_b = term_frequencies(b);

    let dot: f32 = bag_a
        .iter()
        .filter_map(|(term, &tf_a)| bag_b.get(term).map(|&tf_b| (tf_a * tf_b) as f32))
        .sum();
    let norm_a = (bag_a.values().map(|&tf| tf * tf).sum::<u32>() as f32).sqrt();
    let norm_b = (bag_b.values().map(|&tf| tf * tf).sum::<u32>() as f32).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
    }
}

fn term_frequencies(tokens: &[String]) -> BTreeMap<&str, u32> {
    let mut bag = BTreeMap::new();
    for token in tokens {
        *bag.entry(token.as_str()).or_insert(0) += 1;
    }
    bag
}

/// Jaccard similarity over character trigrams
pub fn trigram_similarity(a: &str, b: &str) -> f32 {
    let trigrams_a = generate_trigrams(a);
    let trigrams_b = generate_trigrams(b);

    if trigrams_a.is_empty() || trigrams_b.is_empty() {
        return 0.0;
    }

    let intersection = trigrams_a.intersection(&trigrams_b).count();
    let union = trigrams_a.union(&trigrams_b).count();

    if union == 0 { 0.0 } else { intersection as f32 / union as f32 }
}

/// Jaccard similarity between token sets
pub fn jaccard_tokens(a: &[String], b: &[String]) -> f32 {
    let set_a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = b.iter().map(String::as_str).collect();

    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    set_a.intersection(&set_b).count() as f32 / union as f32
}

fn generate_trigrams(s: &str) -> HashSet<String> {
    let padded = format!("  {}  ", s);
    let chars: Vec<char> = padded.chars().collect();

    if chars.len() < 3 {
        return HashSet::new();
    }

    chars.windows(3).map(|w| w.iter().collect::<String>()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use findora_core::{Category, ItemId, ItemReport, ItemType, Location};

    fn item(category: Category, description: &str) -> Item {
        let report = ItemReport {
            item_type: ItemType::Lost,
            category,
            title: String::new(),
            description: description.to_string(),
            location: Location::default(),
            created_at: Utc::now(),
            reward: None,
            contact: String::new(),
        };
        Item::from_report(ItemId::generate(), report, None).unwrap()
    }

    #[test]
    fn test_tokenize_normalizes() {
        assert_eq!(
            tokenize("  Black LEATHER wallet, with a gold-clasp! "),
            vec!["black", "leather", "wallet", "gold", "clasp"]
        );
    }

    #[test]
    fn test_identical_descriptions_same_category() {
        let scorer = TextScorer::default();
        let a = item(Category::Wallet, "brown wallet");
        let b = item(Category::Wallet, "Brown wallet");
        assert!((scorer.score(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_wallet_descriptions_overlap() {
        let scorer = TextScorer::default();
        let a = item(Category::Wallet, "black leather wallet with gold clasp");
        let b = item(Category::Wallet, "black leather wallet gold buckle");
        let score = scorer.score(&a, &b);
        assert!(score > 0.7, "expected strong overlap, got {}", score);
    }

    #[test]
    fn test_score_is_symmetric() {
        let scorer = TextScorer::default();
        let pairs = [
            ("black leather wallet with gold clasp", "black leather wallet gold buckle"),
            ("iphone 13 cracked screen blue case", "blue phone case cracked"),
            ("keys keys keys on a red lanyard", "red lanyard"),
        ];
        for (x, y) in pairs {
            let a = item(Category::Phone, x);
            let b = item(Category::Electronics, y);
            assert_eq!(scorer.score(&a, &b), scorer.score(&b, &a));
        }
    }

    #[test]
    fn test_cross_category_ceiling() {
        let scorer = TextScorer::default();
        let a = item(Category::Wallet, "black leather wallet with gold clasp");
        let b = item(Category::Keys, "black leather wallet with gold clasp");
        assert!(scorer.score(&a, &b) <= 0.3 + 1e-6);
    }

    #[test]
    fn test_compatible_category_gets_partial_bonus() {
        let scorer = TextScorer::default();
        let same = scorer.score(
            &item(Category::Bag, "navy canvas bag"),
            &item(Category::Bag, "navy canvas bag"),
        );
        let compatible = scorer.score(
            &item(Category::Bag, "navy canvas bag"),
            &item(Category::Backpack, "navy canvas bag"),
        );
        assert!(compatible < same);
        assert!(compatible > 0.3);
    }

    #[test]
    fn test_stop_word_only_text_scores_zero() {
        let scorer = TextScorer::default();
        assert_eq!(scorer.lexical_similarity("with the", "the with"), 0.0);
    }

    #[test]
    fn test_jaccard_tokens() {
        let a = tokenize("central station platform");
        let b = tokenize("station platform north");
        assert!((jaccard_tokens(&a, &b) - 0.5).abs() < 1e-6);
        assert_eq!(jaccard_tokens(&[], &[]), 0.0);
    }
}
