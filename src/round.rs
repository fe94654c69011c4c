use crate::collaborator::{ContentGenerator, Generation, GenerationRequest, Recognizer};
use crate::config::Config;
use crate::content::{ContentFilter, TargetScript};
use crate::error::{DrillError, Result};
use crate::layout::{LineFormatter, LINE_SEPARATOR};
use crate::mastery::{MasteryUpdater, UpdateReport};
use crate::sampler::{CharacterSampler, SampleResult};
use crate::store::CharacterStore;
use chrono::NaiveDate;
use rand::RngCore;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Knobs for preparing one practice sheet
#[derive(Debug, Clone)]
pub struct RoundSettings {
    pub sample_size: usize,
    pub num_phrases: usize,
    pub num_sentences: usize,
    pub filter: ContentFilter,
    pub formatter: LineFormatter,
}

impl Default for RoundSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for RoundSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            sample_size: cfg.sample_size,
            num_phrases: cfg.num_phrases,
            num_sentences: cfg.num_sentences,
            filter: ContentFilter::new(TargetScript::CJK, cfg.new_char_threshold),
            formatter: LineFormatter::new(
                TargetScript::CJK,
                cfg.max_line_chars,
                cfg.min_line_chars,
            ),
        }
    }
}

/// A laid-out practice sheet and how it was derived
#[derive(Debug, Clone, PartialEq)]
pub struct PracticeSheet {
    pub sample: SampleResult,
    pub items: Vec<String>,
    pub new_characters: Vec<char>,
    pub overall_new_ratio: f64,
    pub lines: Vec<String>,
}

impl PracticeSheet {
    pub fn render(&self) -> String {
        self.lines.join(LINE_SEPARATOR)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoundOutcome {
    Sheet(PracticeSheet),
    /// Nothing usable came back; the store was left untouched
    NoContent { sample: SampleResult, reason: String },
}

/// Sample, generate, filter, register discovered characters, and lay out
/// one sheet.
pub fn prepare_round(
    store: &mut CharacterStore,
    sampler: &dyn CharacterSampler,
    generator: &dyn ContentGenerator,
    settings: &RoundSettings,
    today: NaiveDate,
    rng: &mut dyn RngCore,
) -> Result<RoundOutcome> {
    let sample = sampler.sample(store, settings.sample_size, today, rng)?;
    info!(characters = sample.len(), "sampled practice characters");

    let request = GenerationRequest {
        characters: sample.clone(),
        num_phrases: settings.num_phrases,
        num_sentences: settings.num_sentences,
    };
    let items = match generator.generate(&request) {
        Ok(Generation::Text(items)) => items,
        Ok(Generation::NoContent) => {
            warn!("generator produced no content");
            return Ok(RoundOutcome::NoContent {
                sample,
                reason: "no content produced".to_string(),
            });
        }
        Err(e) => {
            warn!("generation failed: {e}");
            return Ok(RoundOutcome::NoContent {
                sample,
                reason: e.to_string(),
            });
        }
    };

    let outcome = settings.filter.filter(&items, &sample, store);
    if outcome.kept.is_empty() {
        warn!("every generated item was filtered out");
        return Ok(RoundOutcome::NoContent {
            sample,
            reason: "no generated item passed the new-character filter".to_string(),
        });
    }

    let new_characters = store.register_new(outcome.new_characters);
    if !new_characters.is_empty() {
        info!(count = new_characters.len(), "registered new characters");
    }

    let lines = settings.formatter.format(&outcome.kept);
    Ok(RoundOutcome::Sheet(PracticeSheet {
        sample,
        items: outcome.kept,
        new_characters,
        overall_new_ratio: outcome.overall_new_ratio,
        lines,
    }))
}

/// Result of grading one or more photographed sheets as a single batch
#[derive(Debug, Default)]
pub struct GradeReport {
    pub update: UpdateReport,
    pub lines_read: usize,
    pub rejected: Vec<DrillError>,
    pub failed_images: Vec<(PathBuf, DrillError)>,
}

/// Recognize every image, then apply all observations as one aggregated
/// update so repeated characters across sheets are counted together.
pub fn grade_round<P: AsRef<Path>>(
    store: &mut CharacterStore,
    recognizer: &dyn Recognizer,
    images: &[P],
    updater: &MasteryUpdater,
    today: NaiveDate,
) -> GradeReport {
    let mut report = GradeReport::default();
    let mut lines = Vec::new();
    for image in images {
        let image = image.as_ref();
        match recognizer.recognize(image) {
            Ok(mut found) => {
                info!(image = %image.display(), lines = found.len(), "recognized sheet");
                lines.append(&mut found);
            }
            Err(e) => {
                warn!(image = %image.display(), "recognition failed: {e}");
                report.failed_images.push((image.to_path_buf(), e));
            }
        }
    }

    report.lines_read = lines.len();
    let batch = updater.parse_batch(&lines);
    report.rejected = batch.rejected;
    report.update = updater.apply(store, &batch.observations, today);
    report
}
