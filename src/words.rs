//! Inspiration words for the brainstormer.

use std::collections::BTreeMap;
use std::path::Path;

use rand::seq::SliceRandom;

use crate::types::{InspirationWord, WordCategory};

/// Source of random words by category.
pub trait WordBank: Send + Sync {
    /// Up to `n` distinct words from `category`, in random order.
    fn sample(&self, category: WordCategory, n: usize) -> Vec<String>;
}

/// In-memory word bank.
#[derive(Debug, Clone, Default)]
pub struct StaticWordBank {
    words: BTreeMap<WordCategory, Vec<String>>,
}

impl StaticWordBank {
    pub fn new(words: BTreeMap<WordCategory, Vec<String>>) -> Self {
        Self { words }
    }

    /// Load `{"noun": [...], "place": [...], ...}` from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, std::io::Error> {
        let raw = std::fs::read_to_string(path)?;
        let words: BTreeMap<WordCategory, Vec<String>> = serde_json::from_str(&raw)?;
        Ok(Self::new(words))
    }

    /// A small built-in bank for running without a word store.
    pub fn builtin() -> Self {
        let table: [(WordCategory, &[&str]); 6] = [
            (
                WordCategory::Noun,
                &["llama", "reticulating spline", "arcology", "zoning permit", "monorail"],
            ),
            (
                WordCategory::Adjective,
                &["municipal", "soggy", "unprecedented", "beige", "ceremonial"],
            ),
            (
                WordCategory::Place,
                &["the landfill", "City Hall", "the marina", "the suburbs"],
            ),
            (
                WordCategory::Person,
                &["the Mayor", "a traffic engineer", "the budget advisor"],
            ),
            (WordCategory::Number, &["seven", "a dozen", "one million"]),
            (WordCategory::Other, &["brownout", "tax hike", "ribbon cutting"]),
        ];

        Self::new(
            table
                .into_iter()
                .map(|(cat, words)| (cat, words.iter().map(|w| w.to_string()).collect()))
                .collect(),
        )
    }
}

impl WordBank for StaticWordBank {
    fn sample(&self, category: WordCategory, n: usize) -> Vec<String> {
        let Some(words) = self.words.get(&category) else {
            return Vec::new();
        };
        words
            .choose_multiple(&mut rand::thread_rng(), n)
            .cloned()
            .collect()
    }
}

/// Draw `n` words spread across categories: one per category, round-robin,
/// skipping categories that have run dry.
pub fn sample_inspiration(bank: &dyn WordBank, n: usize) -> Vec<InspirationWord> {
    // Ask each category for enough words to cover a full round-robin.
    let pools: Vec<(WordCategory, Vec<String>)> = WordCategory::ALL
        .iter()
        .map(|&cat| (cat, bank.sample(cat, n)))
        .collect();

    let mut out = Vec::with_capacity(n);
    let mut depth = 0;
    while out.len() < n {
        let mut drew = false;
        for (cat, words) in &pools {
            if out.len() == n {
                break;
            }
            if let Some(word) = words.get(depth) {
                out.push(InspirationWord::new(word.clone(), *cat));
                drew = true;
            }
        }
        if !drew {
            break;
        }
        depth += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inspiration_spreads_across_categories() {
        let words = sample_inspiration(&StaticWordBank::builtin(), 6);
        assert_eq!(words.len(), 6);
        let mut cats: Vec<_> = words.iter().map(|w| w.category).collect();
        cats.dedup();
        assert_eq!(cats.len(), 6);
    }

    #[test]
    fn inspiration_wraps_when_n_exceeds_categories() {
        let mut map = BTreeMap::new();
        map.insert(WordCategory::Noun, vec!["a".into(), "b".into(), "c".into()]);
        map.insert(WordCategory::Place, vec!["x".into()]);
        let words = sample_inspiration(&StaticWordBank::new(map), 4);
        assert_eq!(words.len(), 4);
        assert_eq!(words[0].category, WordCategory::Noun);
        assert_eq!(words[1].category, WordCategory::Place);
        assert_eq!(words[2].category, WordCategory::Noun);
        assert_eq!(words[3].category, WordCategory::Noun);
    }

    #[test]
    fn inspiration_stops_when_bank_is_dry() {
        let mut map = BTreeMap::new();
        map.insert(WordCategory::Other, vec!["only".into()]);
        let words = sample_inspiration(&StaticWordBank::new(map), 5);
        assert_eq!(words.len(), 1);
        assert!(sample_inspiration(&StaticWordBank::default(), 3).is_empty());
    }

    #[test]
    fn word_bank_loads_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.json");
        std::fs::write(&path, r#"{"noun": ["llama"], "person": ["the Mayor"]}"#).unwrap();
        let bank = StaticWordBank::from_json_file(&path).unwrap();
        assert_eq!(bank.sample(WordCategory::Noun, 3), vec!["llama".to_string()]);
        assert!(bank.sample(WordCategory::Place, 3).is_empty());
    }
}
