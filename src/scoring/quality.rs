// Content quality formula.
//
// The quality score combines normalized engagement signals with caller
// supplied weights, subtracts the weighted abuse penalty and applies
// exponential recency decay:
//
//     S  = Σ weight_i * subscore_i          (bonus signals)
//     P  = weight_abuse * subscore_abuse    (penalty, posts only)
//     Q0 = max(0, S - P)
//     Q  = Q0 * 0.5 ^ (age_days / half_life_days)
//
// The penalty is subtracted rather than multiplied in, so heavy abuse can
// pull an otherwise strong item all the way down to zero, but never below.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{ContentItem, ContentKind};
use crate::error::{EngineError, Result};
use crate::scoring::decay;
use crate::scoring::normalize::{self, NormalizationCaps};

/// One scoring input derived from a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Content,
    Featured,
    Tags,
    Views,
    Bookmarks,
    Comments,
    Likes,
    Ratings,
    Shares,
    Replies,
    Votes,
    AbuseReports,
}

impl Signal {
    pub const ALL: [Signal; 12] = [
        Signal::Content,
        Signal::Featured,
        Signal::Tags,
        Signal::Views,
        Signal::Bookmarks,
        Signal::Comments,
        Signal::Likes,
        Signal::Ratings,
        Signal::Shares,
        Signal::Replies,
        Signal::Votes,
        Signal::AbuseReports,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Content => "content",
            Signal::Featured => "featured",
            Signal::Tags => "tags",
            Signal::Views => "views",
            Signal::Bookmarks => "bookmarks",
            Signal::Comments => "comments",
            Signal::Likes => "likes",
            Signal::Ratings => "ratings",
            Signal::Shares => "shares",
            Signal::Replies => "replies",
            Signal::Votes => "votes",
            Signal::AbuseReports => "abuse_reports",
        }
    }

    /// Penalty signals are subtracted from the weighted sum.
    pub fn is_penalty(&self) -> bool {
        matches!(self, Signal::AbuseReports)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.to_ascii_lowercase().replace('-', "_");
        Signal::ALL
            .into_iter()
            .find(|sig| sig.as_str() == normalized)
            .ok_or_else(|| format!("unknown signal: {s}"))
    }
}

const POST_SIGNALS: &[Signal] = &[
    Signal::Content,
    Signal::Featured,
    Signal::Tags,
    Signal::Views,
    Signal::Bookmarks,
    Signal::Comments,
    Signal::Likes,
    Signal::Ratings,
    Signal::Shares,
    Signal::AbuseReports,
];

const COMMENT_SIGNALS: &[Signal] = &[
    Signal::Content,
    Signal::Featured,
    Signal::Replies,
    Signal::Votes,
];

const REPLY_SIGNALS: &[Signal] = &[Signal::Content, Signal::Votes];

/// Signals that contribute to the quality of the given content kind.
pub fn signals_for(kind: ContentKind) -> &'static [Signal] {
    match kind {
        ContentKind::Post => POST_SIGNALS,
        ContentKind::Comment => COMMENT_SIGNALS,
        ContentKind::Reply => REPLY_SIGNALS,
    }
}

/// Per-signal weights for the quality formula.
///
/// Every weight defaults to 1.0. Weights must be finite and non-negative;
/// pass 0.0 to switch a signal off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub content: f64,
    pub featured: f64,
    pub tags: f64,
    pub views: f64,
    pub bookmarks: f64,
    pub comments: f64,
    pub likes: f64,
    pub ratings: f64,
    pub shares: f64,
    pub replies: f64,
    pub votes: f64,
    /// Scales the abuse penalty, not a bonus.
    pub abuse_reports: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            content: 1.0,
            featured: 1.0,
            tags: 1.0,
            views: 1.0,
            bookmarks: 1.0,
            comments: 1.0,
            likes: 1.0,
            ratings: 1.0,
            shares: 1.0,
            replies: 1.0,
            votes: 1.0,
            abuse_reports: 1.0,
        }
    }
}

impl ScoreWeights {
    pub fn weight(&self, signal: Signal) -> f64 {
        match signal {
            Signal::Content => self.content,
            Signal::Featured => self.featured,
            Signal::Tags => self.tags,
            Signal::Views => self.views,
            Signal::Bookmarks => self.bookmarks,
            Signal::Comments => self.comments,
            Signal::Likes => self.likes,
            Signal::Ratings => self.ratings,
            Signal::Shares => self.shares,
            Signal::Replies => self.replies,
            Signal::Votes => self.votes,
            Signal::AbuseReports => self.abuse_reports,
        }
    }

    pub fn set(&mut self, signal: Signal, weight: f64) {
        let slot = match signal {
            Signal::Content => &mut self.content,
            Signal::Featured => &mut self.featured,
            Signal::Tags => &mut self.tags,
            Signal::Views => &mut self.views,
            Signal::Bookmarks => &mut self.bookmarks,
            Signal::Comments => &mut self.comments,
            Signal::Likes => &mut self.likes,
            Signal::Ratings => &mut self.ratings,
            Signal::Shares => &mut self.shares,
            Signal::Replies => &mut self.replies,
            Signal::Votes => &mut self.votes,
            Signal::AbuseReports => &mut self.abuse_reports,
        };
        *slot = weight;
    }

    pub fn validate(&self) -> Result<()> {
        for signal in Signal::ALL {
            let w = self.weight(signal);
            if !w.is_finite() || w < 0.0 {
                return Err(EngineError::invalid(format!(
                    "weight for {signal} must be a finite number >= 0, got {w}"
                )));
            }
        }
        Ok(())
    }
}

/// One signal's contribution, for explaining a score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalScore {
    pub signal: Signal,
    pub sub_score: f64,
    pub weight: f64,
}

/// Every intermediate value of one quality computation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityBreakdown {
    pub signals: Vec<SignalScore>,
    /// Weighted sum of bonus signals (S).
    pub bonus: f64,
    /// Weighted penalty (P).
    pub penalty: f64,
    /// max(0, S - P).
    pub pre_decay: f64,
    pub age_days: f64,
    pub decay_factor: f64,
    pub quality: f64,
}

/// Pure quality calculator. Holds only the normalization caps; no I/O, no
/// clock, no hidden state, so identical inputs always give identical output.
#[derive(Debug, Clone, Default)]
pub struct QualityCalculator {
    caps: NormalizationCaps,
}

impl QualityCalculator {
    pub fn new(caps: NormalizationCaps) -> Self {
        Self { caps }
    }

    pub fn caps(&self) -> &NormalizationCaps {
        &self.caps
    }

    /// Sub-score in [0, 1] for one signal of one item.
    ///
    /// Fails with `InvalidArgument` when the signal does not apply to the
    /// item's content kind or a counter is negative.
    pub fn signal_score(&self, item: &ContentItem, signal: Signal) -> Result<f64> {
        if !signals_for(item.kind).contains(&signal) {
            return Err(EngineError::invalid(format!(
                "signal {signal} does not apply to {} items",
                item.kind
            )));
        }
        let c = &item.counters;
        let caps = &self.caps;
        match signal {
            Signal::Content => normalize::normalize(item.content_length, caps.content_length),
            Signal::Featured => Ok(if item.featured { 1.0 } else { 0.0 }),
            Signal::Tags => normalize::normalize(item.tags_count, caps.tags),
            Signal::Views => normalize::normalize(c.views, caps.views),
            Signal::Bookmarks => normalize::normalize(c.bookmarks, caps.bookmarks),
            Signal::Comments => normalize::normalize(c.comments, caps.comments),
            Signal::Likes => normalize::normalize(c.likes, caps.likes),
            Signal::Ratings => normalize::normalize_rating(c.ratings, c.ratings_average),
            Signal::Shares => normalize::normalize(c.shares, caps.shares),
            // A comment's children are tracked in its comments counter.
            Signal::Replies => normalize::normalize(c.comments, caps.replies),
            Signal::Votes => votes_score(c.votes, c.yes_votes, caps.votes),
            Signal::AbuseReports => normalize::normalize(c.abuse_reports, caps.abuse_reports),
        }
    }

    /// The decayed quality score for `item` at `now`.
    pub fn calculate(
        &self,
        item: &ContentItem,
        weights: &ScoreWeights,
        half_life_days: i64,
        now: DateTime<Utc>,
    ) -> Result<f64> {
        Ok(self.breakdown(item, weights, half_life_days, now)?.quality)
    }

    /// Same as `calculate`, keeping every intermediate value.
    pub fn breakdown(
        &self,
        item: &ContentItem,
        weights: &ScoreWeights,
        half_life_days: i64,
        now: DateTime<Utc>,
    ) -> Result<QualityBreakdown> {
        // Reject bad parameters before touching the item.
        weights.validate()?;
        if half_life_days <= 0 {
            return Err(EngineError::invalid(format!(
                "half-life must be a positive number of days, got {half_life_days}"
            )));
        }

        let mut signals = Vec::new();
        let mut bonus = 0.0;
        let mut penalty = 0.0;
        for &signal in signals_for(item.kind) {
            let sub_score = self.signal_score(item, signal)?;
            let weight = weights.weight(signal);
            if signal.is_penalty() {
                penalty += weight * sub_score;
            } else {
                bonus += weight * sub_score;
            }
            signals.push(SignalScore {
                signal,
                sub_score,
                weight,
            });
        }

        let pre_decay = (bonus - penalty).max(0.0);
        let age_days = decay::age_in_days(item.created_at, now);
        let decay_factor = decay::decay_factor(age_days, half_life_days)?;

        Ok(QualityBreakdown {
            signals,
            bonus,
            penalty,
            pre_decay,
            age_days,
            decay_factor,
            quality: pre_decay * decay_factor,
        })
    }
}

/// Vote volume scaled by approval: `normalize(votes) * yes / votes`.
///
/// Inconsistent counters (yes > votes) are clamped to full approval rather
/// than producing a sub-score above 1.
fn votes_score(votes: i64, yes_votes: i64, cap: i64) -> Result<f64> {
    if yes_votes < 0 {
        return Err(EngineError::invalid(format!(
            "yes votes must be non-negative, got {yes_votes}"
        )));
    }
    let volume = normalize::normalize(votes, cap)?;
    if votes == 0 {
        return Ok(0.0);
    }
    let approval = (yes_votes as f64 / votes as f64).min(1.0);
    Ok(volume * approval)
}
