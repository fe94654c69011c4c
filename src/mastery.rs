use crate::content::TargetScript;
use crate::error::{DrillError, Result};
use crate::store::CharacterStore;
use chrono::NaiveDate;
use itertools::Itertools;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Outcome of one graded character on a practice sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    Correct,
    Incorrect,
    Unreadable,
}

impl Grade {
    /// Decode the numeric mark used by the recognition notation
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Grade::Correct),
            0 => Some(Grade::Incorrect),
            -1 => Some(Grade::Unreadable),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Grade::Correct => 1,
            Grade::Incorrect => 0,
            Grade::Unreadable => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub character: char,
    pub grade: Grade,
}

impl Observation {
    pub fn new(character: char, grade: Grade) -> Self {
        Self { character, grade }
    }
}

/// Observations decoded from a batch of recognition lines, plus the lines
/// that could not be decoded at all
#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub observations: Vec<Observation>,
    pub rejected: Vec<DrillError>,
}

/// What a call to [`MasteryUpdater::apply`] changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateReport {
    pub updated: Vec<char>,
    pub unknown: Vec<char>,
    pub unreadable: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    seen: u32,
    correct: u32,
}

/// Smoothed accuracy estimate with prior strength `smoothing`
pub fn smoothed_accuracy(correct: u32, appearances: u32, smoothing: f64) -> f64 {
    (correct as f64 + smoothing) / (appearances as f64 + smoothing + 1.0)
}

/// Folds graded recognition results into per-character mastery state
#[derive(Debug, Clone)]
pub struct MasteryUpdater {
    pub script: TargetScript,
    pub smoothing: f64,
}

impl Default for MasteryUpdater {
    fn default() -> Self {
        Self {
            script: TargetScript::CJK,
            smoothing: 5.0,
        }
    }
}

impl MasteryUpdater {
    pub fn new(script: TargetScript, smoothing: f64) -> Self {
        Self { script, smoothing }
    }

    /// Decode every `char(code)` pair on a line. Noise between pairs and pairs
    /// with an unknown code are skipped; a non-blank line with nothing
    /// decodable is an error.
    pub fn parse_line(&self, line: &str) -> Result<Vec<Observation>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let chars: Vec<char> = trimmed.chars().collect();
        let mut observations = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            let ch = chars[i];
            if !self.script.contains(ch) || chars.get(i + 1) != Some(&'(') {
                i += 1;
                continue;
            }
            let Some(close) = chars[i + 2..].iter().position(|&c| c == ')') else {
                break;
            };
            let code: String = chars[i + 2..i + 2 + close].iter().collect();
            match code.trim().parse::<i64>().ok().and_then(Grade::from_code) {
                Some(grade) => {
                    observations.push(Observation::new(ch, grade));
                    i += close + 3;
                }
                None => {
                    // resume inside the parentheses, a valid pair may start there
                    debug!(character = %ch, code = %code, "skipping undecodable mark");
                    i += 1;
                }
            }
        }

        if observations.is_empty() {
            return Err(DrillError::UnparsableObservation {
                line: trimmed.to_string(),
            });
        }
        Ok(observations)
    }

    /// Parse every line, collecting bad lines instead of failing the batch
    pub fn parse_batch<S: AsRef<str>>(&self, lines: &[S]) -> ParsedBatch {
        let mut batch = ParsedBatch::default();
        for line in lines {
            match self.parse_line(line.as_ref()) {
                Ok(mut obs) => batch.observations.append(&mut obs),
                Err(err) => {
                    warn!("{err}");
                    batch.rejected.push(err);
                }
            }
        }
        batch
    }

    /// Apply one aggregated batch of observations to the store. Each
    /// character's accuracy is recomputed once from its summed counts.
    pub fn apply(
        &self,
        store: &mut CharacterStore,
        observations: &[Observation],
        today: NaiveDate,
    ) -> UpdateReport {
        let mut report = UpdateReport::default();
        let mut tallies: HashMap<char, Tally> = HashMap::new();
        let mut order = Vec::new();

        for obs in observations {
            let correct = match obs.grade {
                Grade::Unreadable => {
                    report.unreadable += 1;
                    continue;
                }
                Grade::Correct => 1,
                Grade::Incorrect => 0,
            };
            let tally = tallies.entry(obs.character).or_insert_with(|| {
                order.push(obs.character);
                Tally::default()
            });
            tally.seen += 1;
            tally.correct += correct;
        }

        for ch in order {
            let tally = tallies[&ch];
            let Some(record) = store.get_mut(ch) else {
                report.unknown.push(ch);
                continue;
            };
            record.appearances = record.appearances.saturating_add(tally.seen);
            record.correct = record.correct.saturating_add(tally.correct);
            record.accuracy = smoothed_accuracy(record.correct, record.appearances, self.smoothing);
            record.last_seen = Some(today);
            report.updated.push(ch);
        }

        if !report.unknown.is_empty() {
            warn!(
                unknown = %report.unknown.iter().join(""),
                "graded characters missing from the store were skipped"
            );
        }
        info!(
            updated = report.updated.len(),
            unreadable = report.unreadable,
            "applied graded observations"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CharacterRecord;
    use assert_matches::assert_matches;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn store_of(chars: &str) -> CharacterStore {
        CharacterStore::from_records(chars.chars().map(CharacterRecord::fresh).collect()).unwrap()
    }

    #[test]
    fn grade_codes() {
        assert_eq!(Grade::from_code(1), Some(Grade::Correct));
        assert_eq!(Grade::from_code(0), Some(Grade::Incorrect));
        assert_eq!(Grade::from_code(-1), Some(Grade::Unreadable));
        assert_eq!(Grade::from_code(2), None);
        assert_eq!(Grade::Unreadable.code(), -1);
    }

    #[test]
    fn parses_concatenated_pairs() {
        let updater = MasteryUpdater::default();
        let obs = updater.parse_line("小(1)鸟(0)大(-1)").unwrap();
        assert_eq!(
            obs,
            vec![
                Observation::new('小', Grade::Correct),
                Observation::new('鸟', Grade::Incorrect),
                Observation::new('大', Grade::Unreadable),
            ]
        );
    }

    #[test]
    fn parse_skips_noise_and_bad_codes() {
        let updater = MasteryUpdater::default();
        let obs = updater.parse_line(" 1. 跑( 1 ) x(1) 步(7) 笑(0)").unwrap();
        assert_eq!(
            obs,
            vec![
                Observation::new('跑', Grade::Correct),
                Observation::new('笑', Grade::Incorrect),
            ]
        );
    }

    #[test]
    fn broken_pair_does_not_swallow_the_next_one() {
        let updater = MasteryUpdater::default();
        let obs = updater.parse_line("小(鸟(1)跑(0)").unwrap();
        assert_eq!(
            obs,
            vec![
                Observation::new('鸟', Grade::Correct),
                Observation::new('跑', Grade::Incorrect),
            ]
        );
    }

    #[test]
    fn blank_line_is_not_an_error() {
        let updater = MasteryUpdater::default();
        assert!(updater.parse_line("   ").unwrap().is_empty());
    }

    #[test]
    fn undecodable_line_is_reported() {
        let updater = MasteryUpdater::default();
        assert_matches!(
            updater.parse_line("小鸟跑步"),
            Err(DrillError::UnparsableObservation { line }) if line == "小鸟跑步"
        );
        assert_matches!(
            updater.parse_line("小(1"),
            Err(DrillError::UnparsableObservation { .. })
        );
    }

    #[test]
    fn parse_batch_keeps_good_lines() {
        let updater = MasteryUpdater::default();
        let batch = updater.parse_batch(&["小(1)", "garbage", "鸟(0)"]);
        assert_eq!(batch.observations.len(), 2);
        assert_eq!(batch.rejected.len(), 1);
        assert_matches!(
            &batch.rejected[0],
            DrillError::UnparsableObservation { line } if line == "garbage"
        );
    }

    #[test]
    fn fresh_record_update_matches_formula() {
        let updater = MasteryUpdater::default();
        let mut store = store_of("小");
        let obs = vec![
            Observation::new('小', Grade::Correct),
            Observation::new('小', Grade::Correct),
            Observation::new('小', Grade::Incorrect),
        ];
        let report = updater.apply(&mut store, &obs, today());

        let r = store.get('小').unwrap();
        assert_eq!(r.appearances, 3);
        assert_eq!(r.correct, 2);
        assert!((r.accuracy - 7.0 / 9.0).abs() < 1e-12);
        assert_eq!(r.last_seen, Some(today()));
        assert_eq!(report.updated, vec!['小']);
    }

    #[test]
    fn unreadable_marks_change_nothing() {
        let updater = MasteryUpdater::default();
        let mut store = store_of("小");
        let before = store.clone();
        let report = updater.apply(
            &mut store,
            &[Observation::new('小', Grade::Unreadable)],
            today(),
        );
        assert_eq!(store, before);
        assert_eq!(report.unreadable, 1);
        assert!(report.updated.is_empty());
    }

    #[test]
    fn unknown_characters_are_skipped() {
        let updater = MasteryUpdater::default();
        let mut store = store_of("小");
        let report = updater.apply(&mut store, &[Observation::new('龙', Grade::Correct)], today());
        assert_eq!(report.unknown, vec!['龙']);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get('小').unwrap().appearances, 0);
    }

    #[test]
    fn empty_batch_leaves_store_unchanged() {
        let updater = MasteryUpdater::default();
        let mut store = store_of("小鸟");
        let before = store.clone();
        let report = updater.apply(&mut store, &[], today());
        assert_eq!(store, before);
        assert_eq!(report, UpdateReport::default());
    }

    #[test]
    fn aggregation_is_order_independent() {
        let updater = MasteryUpdater::default();
        let forward = [
            Observation::new('鸟', Grade::Incorrect),
            Observation::new('鸟', Grade::Correct),
            Observation::new('鸟', Grade::Correct),
        ];
        let mut reversed = forward;
        reversed.reverse();

        let mut a = store_of("鸟");
        let mut b = store_of("鸟");
        updater.apply(&mut a, &forward, today());
        updater.apply(&mut b, &reversed, today());
        assert_eq!(a, b);
    }

    #[test]
    fn accumulates_onto_existing_counts() {
        let updater = MasteryUpdater::default();
        let mut store = CharacterStore::from_records(vec![CharacterRecord {
            content: '天',
            level: 2,
            appearances: 4,
            correct: 1,
            accuracy: 0.6,
            last_seen: NaiveDate::from_ymd_opt(2024, 1, 1),
        }])
        .unwrap();
        updater.apply(&mut store, &[Observation::new('天', Grade::Correct)], today());
        let r = store.get('天').unwrap();
        assert_eq!((r.appearances, r.correct, r.level), (5, 2, 2));
        assert!((r.accuracy - 7.0 / 11.0).abs() < 1e-12);
    }

    #[test]
    fn counts_saturate_instead_of_overflowing() {
        let updater = MasteryUpdater::default();
        let mut store = CharacterStore::from_records(vec![CharacterRecord {
            content: '天',
            level: 1,
            appearances: u32::MAX - 1,
            correct: u32::MAX - 1,
            accuracy: 0.9,
            last_seen: None,
        }])
        .unwrap();
        let obs = [Observation::new('天', Grade::Correct); 3];
        updater.apply(&mut store, &obs, today());
        let r = store.get('天').unwrap();
        assert_eq!((r.appearances, r.correct), (u32::MAX, u32::MAX));
        assert!(r.accuracy > 0.0 && r.accuracy <= 1.0);
    }
}
