use crate::Category;
use ahash::AHashSet;
use serde::{Deserialize, Serialize};

/// How two categories relate for matching purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryRelation {
    Same,
    Compatible,
    Mismatch,
}

/// Symmetric set of category pairs that may describe the same object
/// (a "bag" report can be a "backpack" report seen by someone else).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<[Category; 2]>", into = "Vec<[Category; 2]>")]
pub struct CategoryCompatibility {
    pairs: AHashSet<(Category, Category)>,
}

impl CategoryCompatibility {
    /// No cross-category compatibility at all
    pub fn none() -> Self {
        Self {
            pairs: AHashSet::new(),
        }
    }

    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Category, Category)>,
    {
        let mut compat = Self::none();
        for (a, b) in pairs {
            compat.allow(a, b);
        }
        compat
    }

    /// Mark `a` and `b` as compatible. Stored in canonical order, so the
    /// relation is symmetric by construction.
    pub fn allow(&mut self, a: Category, b: Category) {
        if a != b {
            self.pairs.insert(Self::canonical(a, b));
        }
    }

    pub fn relation(&self, a: Category, b: Category) -> CategoryRelation {
        if a == b {
            CategoryRelation::Same
        } else if self.pairs.contains(&Self::canonical(a, b)) {
            CategoryRelation::Compatible
        } else {
            CategoryRelation::Mismatch
        }
    }

    /// Categories whose bucket should be searched for `category`, itself first
    pub fn compatible_with(&self, category: Category) -> Vec<Category> {
        let mut out = vec![category];
        out.extend(
            Category::ALL
                .iter()
                .copied()
                .filter(|&other| self.relation(category, other) == CategoryRelation::Compatible),
        );
        out
    }

    #[inline]
    fn canonical(a: Category, b: Category) -> (Category, Category) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

impl Default for CategoryCompatibility {
    fn default() -> Self {
        Self::from_pairs([
            (Category::Bag, Category::Backpack),
            (Category::Phone, Category::Electronics),
            (Category::Jewelry, Category::Accessories),
            (Category::Wallet, Category::Documents),
        ])
    }
}

impl From<Vec<[Category; 2]>> for CategoryCompatibility {
    fn from(pairs: Vec<[Category; 2]>) -> Self {
        Self::from_pairs(pairs.into_iter().map(|[a, b]| (a, b)))
    }
}

impl From<CategoryCompatibility> for Vec<[Category; 2]> {
    fn from(compat: CategoryCompatibility) -> Self {
        let mut pairs: Vec<[Category; 2]> = compat.pairs.into_iter().map(|(a, b)| [a, b]).collect();
        pairs.sort();
        pairs
    }
}
