// Recency decay: `0.5 ^ (age_days / half_life_days)`.
//
// Content loses half of its score every `half_life_days`. The half-life is
// always supplied by the caller (per content type), never assumed here.

use chrono::{DateTime, Utc};

use crate::error::{EngineError, Result};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Fractional days between `created_at` and `now`, floored at zero so that
/// clock skew (an item "from the future") never boosts a score.
pub fn age_in_days(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - created_at).num_milliseconds().max(0);
    millis as f64 / MILLIS_PER_DAY
}

/// Decay multiplier in (0, 1] for an item of the given age.
pub fn decay_factor(age_days: f64, half_life_days: i64) -> Result<f64> {
    if half_life_days <= 0 {
        return Err(EngineError::invalid(format!(
            "half-life must be a positive number of days, got {half_life_days}"
        )));
    }
    if age_days.is_nan() {
        return Err(EngineError::invalid("age must be a number"));
    }
    let age = age_days.max(0.0);
    Ok(0.5_f64.powf(age / half_life_days as f64))
}

/// Apply the decay factor to a score.
pub fn decay(value: f64, age_days: f64, half_life_days: i64) -> Result<f64> {
    Ok(value * decay_factor(age_days, half_life_days)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fresh_content_has_no_decay() {
        assert_eq!(decay_factor(0.0, 30).unwrap(), 1.0);
    }

    #[test]
    fn test_one_half_life_halves() {
        assert!((decay_factor(30.0, 30).unwrap() - 0.5).abs() < 1e-9);
        assert!((decay_factor(360.0, 180).unwrap() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_negative_age_floors_at_zero() {
        assert_eq!(decay_factor(-3.0, 30).unwrap(), 1.0);
    }

    #[test]
    fn test_non_positive_half_life_rejected() {
        assert!(decay_factor(1.0, 0).is_err());
        assert!(decay_factor(1.0, -30).is_err());
    }

    #[test]
    fn test_age_from_timestamps() {
        let now = Utc::now();
        let age = age_in_days(now - Duration::hours(36), now);
        assert!((age - 1.5).abs() < 1e-9);
        assert_eq!(age_in_days(now + Duration::days(2), now), 0.0);
    }

    #[test]
    fn test_decay_scales_value() {
        assert!((decay(0.8, 30.0, 30).unwrap() - 0.4).abs() < 1e-12);
    }
}
