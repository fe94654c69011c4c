use crate::error::{DrillError, Result};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Mastery state for a single character under study
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterRecord {
    pub content: char,
    pub level: i64,
    pub appearances: u32,
    pub correct: u32,
    pub accuracy: f64,
    pub last_seen: Option<NaiveDate>,
}

impl CharacterRecord {
    /// A never-graded record, as registered when a character is first discovered
    pub fn fresh(content: char) -> Self {
        Self {
            content,
            level: 0,
            appearances: 0,
            correct: 0,
            accuracy: 0.0,
            last_seen: None,
        }
    }
}

/// Ordered collection of character records keyed by `content`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharacterStore {
    records: Vec<CharacterRecord>,
    index: HashMap<char, usize>,
}

impl CharacterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from loaded rows, rejecting duplicate keys and impossible counts
    pub fn from_records(records: Vec<CharacterRecord>) -> Result<Self> {
        let mut store = Self::new();
        for record in records {
            if record.correct > record.appearances {
                return Err(DrillError::InvalidRecord {
                    content: record.content.to_string(),
                    reason: format!(
                        "correct ({}) exceeds appearances ({})",
                        record.correct, record.appearances
                    ),
                });
            }
            if store.contains(record.content) {
                return Err(DrillError::InvalidRecord {
                    content: record.content.to_string(),
                    reason: "duplicate character".to_string(),
                });
            }
            store.push(record);
        }
        Ok(store)
    }

    fn push(&mut self, record: CharacterRecord) {
        self.index.insert(record.content, self.records.len());
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, content: char) -> bool {
        self.index.contains_key(&content)
    }

    pub fn get(&self, content: char) -> Option<&CharacterRecord> {
        self.index.get(&content).map(|&i| &self.records[i])
    }

    pub fn get_mut(&mut self, content: char) -> Option<&mut CharacterRecord> {
        match self.index.get(&content) {
            Some(&i) => Some(&mut self.records[i]),
            None => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CharacterRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[CharacterRecord] {
        &self.records
    }

    /// Insert zero-statistics records for characters not yet in the store.
    /// Returns the characters that were actually added, in order.
    pub fn register_new<I>(&mut self, characters: I) -> Vec<char>
    where
        I: IntoIterator<Item = char>,
    {
        let mut added = Vec::new();
        for ch in characters {
            if !self.contains(ch) {
                self.push(CharacterRecord::fresh(ch));
                added.push(ch);
            }
        }
        added
    }
}
