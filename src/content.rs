use crate::store::CharacterStore;
use itertools::Itertools;
use std::collections::HashSet;
use tracing::{debug, info};

/// Inclusive range of scalar values that count as practice characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetScript {
    pub first: char,
    pub last: char,
}

impl TargetScript {
    /// Common CJK unified ideographs
    pub const CJK: TargetScript = TargetScript {
        first: '\u{4e00}',
        last: '\u{9fa5}',
    };

    pub fn contains(&self, c: char) -> bool {
        (self.first..=self.last).contains(&c)
    }

    /// Script characters of `text` in order, repeats kept
    pub fn extract(&self, text: &str) -> Vec<char> {
        text.chars().filter(|&c| self.contains(c)).collect()
    }

    pub fn count(&self, text: &str) -> usize {
        text.chars().filter(|&c| self.contains(c)).count()
    }
}

impl Default for TargetScript {
    fn default() -> Self {
        Self::CJK
    }
}

/// One generated item with its share of characters outside the round's sample
#[derive(Debug, Clone, PartialEq)]
pub struct ItemAssessment {
    pub text: String,
    pub characters: Vec<char>,
    pub new_characters: usize,
    pub new_char_ratio: f64,
}

/// Result of filtering a batch of generated items
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub kept: Vec<String>,
    pub new_characters: Vec<char>,
    pub overall_new_ratio: f64,
    pub assessments: Vec<ItemAssessment>,
}

/// Keeps generated material anchored to the sampled characters
#[derive(Debug, Clone)]
pub struct ContentFilter {
    pub script: TargetScript,
    pub threshold: f64,
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self {
            script: TargetScript::CJK,
            threshold: 0.2,
        }
    }
}

impl ContentFilter {
    pub fn new(script: TargetScript, threshold: f64) -> Self {
        Self { script, threshold }
    }

    /// Score one item against the sampled set. `None` when the item has no
    /// script characters at all.
    pub fn assess(&self, item: &str, sampled: &HashSet<char>) -> Option<ItemAssessment> {
        let characters = self.script.extract(item);
        if characters.is_empty() {
            return None;
        }
        let new_characters = characters.iter().filter(|c| !sampled.contains(*c)).count();
        Some(ItemAssessment {
            text: item.to_string(),
            new_char_ratio: new_characters as f64 / characters.len() as f64,
            new_characters,
            characters,
        })
    }

    /// Two-stage filter: the whole batch is kept while its overall ratio of
    /// unsampled characters stays within the threshold; past that, only items
    /// that are individually within it survive.
    pub fn filter(
        &self,
        items: &[String],
        sampled: &[char],
        store: &CharacterStore,
    ) -> FilterOutcome {
        let sampled: HashSet<char> = sampled.iter().copied().collect();
        let assessments: Vec<ItemAssessment> = items
            .iter()
            .filter_map(|item| self.assess(item, &sampled))
            .collect();

        let total: usize = assessments.iter().map(|a| a.characters.len()).sum();
        let new: usize = assessments.iter().map(|a| a.new_characters).sum();
        let overall_new_ratio = if total == 0 {
            0.0
        } else {
            new as f64 / total as f64
        };

        let drifted = overall_new_ratio > self.threshold;
        let kept: Vec<&ItemAssessment> = assessments
            .iter()
            .filter(|a| {
                let keep = !drifted || a.new_char_ratio <= self.threshold;
                if !keep {
                    debug!(item = %a.text, ratio = a.new_char_ratio, "dropping off-topic item");
                }
                keep
            })
            .collect();

        let new_characters: Vec<char> = kept
            .iter()
            .flat_map(|a| a.characters.iter().copied())
            .filter(|c| !store.contains(*c))
            .unique()
            .collect();

        info!(
            overall_new_ratio,
            kept = kept.len(),
            generated = items.len(),
            discovered = new_characters.len(),
            "filtered generated content"
        );

        FilterOutcome {
            kept: kept.iter().map(|a| a.text.clone()).collect(),
            new_characters,
            overall_new_ratio,
            assessments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CharacterRecord;

    fn items(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    fn store_of(chars: &str) -> CharacterStore {
        CharacterStore::from_records(chars.chars().map(CharacterRecord::fresh).collect()).unwrap()
    }

    #[test]
    fn target_script_extracts_only_script_characters() {
        let script = TargetScript::CJK;
        assert_eq!(script.extract("小鸟, hello 跑步!"), vec!['小', '鸟', '跑', '步']);
        assert_eq!(script.count("abc"), 0);
        assert!(script.contains('一'));
        assert!(!script.contains('a'));
    }

    #[test]
    fn off_topic_batch_keeps_only_anchored_items() {
        let filter = ContentFilter::default();
        let sampled = ['小', '鸟', '跑', '步'];
        let store = store_of("小鸟跑步");
        let out = filter.filter(&items(&["小鸟跑步", "大笑"]), &sampled, &store);

        assert_eq!(out.assessments[0].new_char_ratio, 0.0);
        assert_eq!(out.assessments[1].new_char_ratio, 1.0);
        assert!((out.overall_new_ratio - 2.0 / 6.0).abs() < 1e-12);
        assert_eq!(out.kept, vec!["小鸟跑步".to_string()]);
        assert!(out.new_characters.is_empty());
    }

    #[test]
    fn acceptable_batch_keeps_every_item() {
        let filter = ContentFilter::default();
        let sampled: Vec<char> = "小鸟跑步大天上飞".chars().collect();
        let store = store_of("小鸟跑步大天上飞");
        // one off-topic char out of ten keeps the batch under threshold
        let out = filter.filter(&items(&["小鸟跑步", "大鸟天上飞", "笑"]), &sampled, &store);
        assert!(out.overall_new_ratio <= 0.2);
        assert_eq!(out.kept.len(), 3);
        assert_eq!(out.new_characters, vec!['笑']);
    }

    #[test]
    fn items_without_script_characters_are_dropped() {
        let filter = ContentFilter::default();
        let store = store_of("小鸟");
        let out = filter.filter(&items(&["hello", "", "小鸟"]), &['小', '鸟'], &store);
        assert_eq!(out.assessments.len(), 1);
        assert_eq!(out.kept, vec!["小鸟".to_string()]);
    }

    #[test]
    fn empty_batch_has_zero_ratio() {
        let filter = ContentFilter::default();
        let out = filter.filter(&[], &['小'], &CharacterStore::new());
        assert_eq!(out.overall_new_ratio, 0.0);
        assert!(out.kept.is_empty());
    }

    #[test]
    fn discovered_characters_come_from_survivors_only() {
        let filter = ContentFilter::default();
        let sampled: Vec<char> = "一二三四五".chars().collect();
        let store = store_of("一二三四五");
        // batch drifts at 3 new of 7; only the first item survives (1/5 = 0.2)
        let out = filter.filter(&items(&["一二三四森", "山水"]), &sampled, &store);
        assert_eq!(out.kept, vec!["一二三四森".to_string()]);
        assert_eq!(out.new_characters, vec!['森']);
    }

    #[test]
    fn sampled_but_unstored_characters_are_still_discovered() {
        let filter = ContentFilter::default();
        let out = filter.filter(&items(&["花花"]), &['花'], &CharacterStore::new());
        assert_eq!(out.new_characters, vec!['花']);
    }
}
