use crate::store::CharacterRecord;
use chrono::NaiveDate;

/// Gap assumed for characters that have never been graded
pub const DEFAULT_GAP_DAYS: i64 = 30;

/// Whole days since the character was last graded, clamped at zero
pub fn days_since_last_seen(record: &CharacterRecord, today: NaiveDate) -> i64 {
    match record.last_seen {
        Some(last) => (today - last).num_days().max(0),
        None => DEFAULT_GAP_DAYS,
    }
}

/// Sampling weight: low accuracy and long neglect both raise it
pub fn weight(record: &CharacterRecord, today: NaiveDate) -> f64 {
    let accuracy = if record.accuracy.is_nan() {
        0.0
    } else {
        record.accuracy.clamp(0.0, 1.0)
    };
    let days = days_since_last_seen(record, today) as f64;
    (1.0 - accuracy) * (1.0 + days / DEFAULT_GAP_DAYS as f64)
}
