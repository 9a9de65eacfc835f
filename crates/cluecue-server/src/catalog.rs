//! The immutable card catalog: a fixed list of guessable terms loaded once at
//! startup, supplying random sampling without replacement.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use cluecue_lib::Card;
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

const BUILTIN_CARDS: &str = include_str!("../words.txt");

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog holds {have} cards but {wanted} were requested")]
    InsufficientCards { wanted: usize, have: usize },
}

#[derive(Debug, Clone)]
pub struct Catalog {
    cards: Vec<Card>,
}

impl Catalog {
    /// One term per line; blank lines and surrounding whitespace are ignored,
    /// duplicates keep their first occurrence.
    pub fn from_text(text: &str) -> Self {
        let mut seen = HashSet::new();
        let cards = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter(|line| seen.insert(line.to_owned()))
            .map(Card::new)
            .collect();
        Self { cards }
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read card file {}", path.display()))?;
        Ok(Self::from_text(&text))
    }

    pub fn builtin() -> Self {
        Self::from_text(BUILTIN_CARDS)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Draw `n` distinct cards uniformly at random without replacement.
    pub fn sample(&self, rng: &mut impl Rng, n: usize) -> Result<Vec<Card>, CatalogError> {
        if n > self.cards.len() {
            return Err(CatalogError::InsufficientCards {
                wanted: n,
                have: self.cards.len(),
            });
        }

        let mut drawn: Vec<Card> = self.cards.choose_multiple(rng, n).cloned().collect();
        // choose_multiple leaves the result in selection order
        drawn.shuffle(rng);
        Ok(drawn)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::{Catalog, CatalogError};

    #[test]
    fn parsing_skips_blanks_and_duplicates() {
        let catalog = Catalog::from_text("igloo\n\n  kayak  \nigloo\nlasso\n");
        assert_eq!(catalog.len(), 3);
        assert!(!catalog.is_empty());
    }

    #[test]
    fn builtin_catalog_is_large_enough_for_a_full_table() {
        // Ten players at eight cards each.
        assert!(Catalog::builtin().len() >= 80);
    }

    #[test]
    fn sample_returns_distinct_cards() {
        let catalog = Catalog::builtin();
        let mut rng = StdRng::seed_from_u64(7);

        let drawn = catalog.sample(&mut rng, 40).unwrap();
        assert_eq!(drawn.len(), 40);
        let unique: HashSet<_> = drawn.iter().collect();
        assert_eq!(unique.len(), 40);
    }

    #[test]
    fn sample_beyond_catalog_size_fails() {
        let catalog = Catalog::from_text("igloo\nkayak\n");
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(
            catalog.sample(&mut rng, 3),
            Err(CatalogError::InsufficientCards { wanted: 3, have: 2 })
        );
    }
}
