//! Confidence decay and score blending

use chrono::{DateTime, Utc};

/// Hourly multiplicative decay applied to document confidence
pub const DECAY_RATE_PER_HOUR: f64 = 0.995;

/// Confidence never decays below this floor
pub const CONFIDENCE_FLOOR: f64 = 0.1;

/// Confidence decayed by the hours elapsed since the document was updated.
///
/// Unparseable timestamps count as "just updated" (no decay).
pub fn compute_decayed_confidence(confidence: f64, updated_at: &str, now: DateTime<Utc>) -> f64 {
    let updated = DateTime::parse_from_rfc3339(updated_at)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(now);
    let hours = (now - updated).num_seconds().max(0) as f64 / 3600.0;
    (confidence * DECAY_RATE_PER_HOUR.powf(hours)).max(CONFIDENCE_FLOOR)
}

/// Blend factor from decayed confidence
pub fn confidence_blend(decayed: f64) -> f64 {
    0.7 + 0.3 * decayed
}

/// Blend factor from relative importance; callers skip this when no document
/// has a nonzero score
pub fn importance_blend(importance: f64, max_importance: f64) -> f64 {
    0.8 + 0.2 * (importance / max_importance)
}
