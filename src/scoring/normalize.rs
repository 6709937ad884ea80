// Signal normalization: raw engagement counts to bounded sub-scores.
//
// Every bonus signal goes through the same saturating log curve:
//
//     normalize(count, cap) = ln(1 + min(count, cap)) / ln(1 + cap)
//
// so 0 maps to 0.0, `cap` and anything above it maps to 1.0, and doubling an
// already-large count buys progressively less. The caps below are tuning
// constants, not contract: NormalizationCaps lets callers override them.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

pub const VIEWS_CAP: i64 = 10_000;
pub const LIKES_CAP: i64 = 500;
pub const BOOKMARKS_CAP: i64 = 200;
pub const COMMENTS_CAP: i64 = 200;
pub const SHARES_CAP: i64 = 200;
pub const REPLIES_CAP: i64 = 100;
pub const VOTES_CAP: i64 = 100;
pub const TAGS_CAP: i64 = 10;
/// Body length in characters at which the content sub-score saturates.
pub const CONTENT_LENGTH_CAP: i64 = 2_000;
pub const ABUSE_REPORTS_CAP: i64 = 10;

/// Upper bound of the rating scale.
pub const MAX_RATING: f64 = 5.0;

/// Rating sub-score for unrated content. Neutral, so that having no ratings
/// is neither a bonus nor a penalty.
pub const NEUTRAL_RATING_SCORE: f64 = 0.5;

/// Per-signal saturation points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationCaps {
    pub views: i64,
    pub likes: i64,
    pub bookmarks: i64,
    pub comments: i64,
    pub shares: i64,
    pub replies: i64,
    pub votes: i64,
    pub tags: i64,
    pub content_length: i64,
    pub abuse_reports: i64,
}

impl Default for NormalizationCaps {
    fn default() -> Self {
        Self {
            views: VIEWS_CAP,
            likes: LIKES_CAP,
            bookmarks: BOOKMARKS_CAP,
            comments: COMMENTS_CAP,
            shares: SHARES_CAP,
            replies: REPLIES_CAP,
            votes: VOTES_CAP,
            tags: TAGS_CAP,
            content_length: CONTENT_LENGTH_CAP,
            abuse_reports: ABUSE_REPORTS_CAP,
        }
    }
}

/// Map a non-negative count to [0, 1] on the saturating log curve.
///
/// Negative counts and non-positive caps are programming errors and fail
/// with `InvalidArgument`.
pub fn normalize(count: i64, cap: i64) -> Result<f64> {
    if count < 0 {
        return Err(EngineError::invalid(format!(
            "count must be non-negative, got {count}"
        )));
    }
    if cap <= 0 {
        return Err(EngineError::invalid(format!(
            "normalization cap must be positive, got {cap}"
        )));
    }
    if count >= cap {
        return Ok(1.0);
    }
    Ok((count as f64).ln_1p() / (cap as f64).ln_1p())
}

/// Rating sub-score: linear rescale of the average onto [0, 1], or the
/// neutral midpoint when nobody has rated the item yet.
pub fn normalize_rating(ratings_count: i64, average: f64) -> Result<f64> {
    if ratings_count < 0 {
        return Err(EngineError::invalid(format!(
            "ratings count must be non-negative, got {ratings_count}"
        )));
    }
    if ratings_count == 0 {
        return Ok(NEUTRAL_RATING_SCORE);
    }
    if !average.is_finite() {
        return Err(EngineError::invalid(format!(
            "ratings average must be finite, got {average}"
        )));
    }
    Ok((average / MAX_RATING).clamp(0.0, 1.0))
}
