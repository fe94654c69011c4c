use crate::error::{DrillError, Result};
use crate::store::CharacterStore;
use crate::weight::weight;
use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use tracing::debug;

/// Characters drawn for one practice round, in draw order
pub type SampleResult = Vec<char>;

/// Trait for different character sampling strategies
pub trait CharacterSampler {
    /// Draw up to `count` distinct characters from the store
    fn sample(
        &self,
        store: &CharacterStore,
        count: usize,
        today: NaiveDate,
        rng: &mut dyn RngCore,
    ) -> Result<SampleResult>;
}

/// Uniform sampling without replacement (random practice mode)
pub struct UniformSampler;

impl CharacterSampler for UniformSampler {
    fn sample(
        &self,
        store: &CharacterStore,
        count: usize,
        _today: NaiveDate,
        rng: &mut dyn RngCore,
    ) -> Result<SampleResult> {
        if store.is_empty() {
            return Err(DrillError::EmptyStore);
        }
        Ok(store
            .records()
            .choose_multiple(rng, count)
            .map(|r| r.content)
            .collect())
    }
}

/// Weighted sampling without replacement driven by mastery state
pub struct WeightedSampler;

impl CharacterSampler for WeightedSampler {
    fn sample(
        &self,
        store: &CharacterStore,
        count: usize,
        today: NaiveDate,
        rng: &mut dyn RngCore,
    ) -> Result<SampleResult> {
        if store.is_empty() {
            return Err(DrillError::EmptyStore);
        }

        let mut remaining: Vec<(char, f64)> = store
            .records()
            .iter()
            .map(|r| r.content)
            .zip(normalized_weights(store, today))
            .collect();

        let draws = count.min(remaining.len());
        let mut picked = Vec::with_capacity(draws);
        for _ in 0..draws {
            let idx = draw_index(&remaining, rng);
            picked.push(remaining.swap_remove(idx).0);
        }

        debug!(requested = count, drawn = picked.len(), "sampled characters");
        Ok(picked)
    }
}

/// Sampling distribution over the store, in store order. Falls back to
/// uniform when every raw weight is zero.
pub fn normalized_weights(store: &CharacterStore, today: NaiveDate) -> Vec<f64> {
    let raw: Vec<f64> = store.iter().map(|r| weight(r, today)).collect();
    let total: f64 = raw.iter().sum();
    if total <= 0.0 {
        let n = raw.len() as f64;
        return raw.iter().map(|_| 1.0 / n).collect();
    }
    raw.into_iter().map(|w| w / total).collect()
}

/// Pick one index proportionally to the remaining weights. Once only
/// zero-weight entries remain the pick is uniform among them.
fn draw_index(remaining: &[(char, f64)], rng: &mut dyn RngCore) -> usize {
    let total: f64 = remaining.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return rng.gen_range(0..remaining.len());
    }

    let target = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    let mut last_positive = 0;
    for (i, (_, w)) in remaining.iter().enumerate() {
        if *w <= 0.0 {
            continue;
        }
        cumulative += w;
        last_positive = i;
        if target < cumulative {
            return i;
        }
    }
    // rounding can leave target just past the final cumulative sum
    last_positive
}
