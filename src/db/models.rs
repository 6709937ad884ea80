// Data models: the types that flow through the engine.
//
// These are kept separate from the store backends so the scoring code can use
// them without depending on rusqlite or sqlx directly.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// The three content types that carry engagement counters and a quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Post,
    Comment,
    Reply,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [ContentKind::Post, ContentKind::Comment, ContentKind::Reply];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Post => "post",
            ContentKind::Comment => "comment",
            ContentKind::Reply => "reply",
        }
    }

    /// Default recency half-life. Comments and replies stay relevant much
    /// longer than the posts they hang off.
    pub fn default_half_life_days(&self) -> i64 {
        match self {
            ContentKind::Post => 30,
            ContentKind::Comment => 180,
            ContentKind::Reply => 180,
        }
    }

    /// Largest page a ranking query may return for this kind.
    /// Requests above it are capped, not rejected.
    pub fn max_page_size(&self) -> u32 {
        match self {
            ContentKind::Post | ContentKind::Comment => 500,
            ContentKind::Reply => 10_000,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "post" | "posts" => Ok(ContentKind::Post),
            "comment" | "comments" => Ok(ContentKind::Comment),
            "reply" | "replies" => Ok(ContentKind::Reply),
            other => Err(format!("unknown content kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Draft,
    Published,
    Hidden,
    Deleted,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Published => "published",
            ContentStatus::Hidden => "hidden",
            ContentStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "draft" => Ok(ContentStatus::Draft),
            "published" => Ok(ContentStatus::Published),
            "hidden" => Ok(ContentStatus::Hidden),
            "deleted" => Ok(ContentStatus::Deleted),
            other => Err(format!("unknown content status: {other}")),
        }
    }
}

/// One engagement counter column on a content record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Counter {
    Views,
    Likes,
    Comments,
    Bookmarks,
    Shares,
    Ratings,
    AbuseReports,
    Votes,
    YesVotes,
    NoVotes,
}

impl Counter {
    pub const ALL: [Counter; 10] = [
        Counter::Views,
        Counter::Likes,
        Counter::Comments,
        Counter::Bookmarks,
        Counter::Shares,
        Counter::Ratings,
        Counter::AbuseReports,
        Counter::Votes,
        Counter::YesVotes,
        Counter::NoVotes,
    ];

    /// Column name in both the SQLite and Postgres schemas.
    pub fn column(&self) -> &'static str {
        match self {
            Counter::Views => "views_count",
            Counter::Likes => "likes_count",
            Counter::Comments => "comments_count",
            Counter::Bookmarks => "bookmarks_count",
            Counter::Shares => "shares_count",
            Counter::Ratings => "ratings_count",
            Counter::AbuseReports => "abuse_reports_count",
            Counter::Votes => "votes_count",
            Counter::YesVotes => "yes_votes_count",
            Counter::NoVotes => "no_votes_count",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Counter::Views => "views",
            Counter::Likes => "likes",
            Counter::Comments => "comments",
            Counter::Bookmarks => "bookmarks",
            Counter::Shares => "shares",
            Counter::Ratings => "ratings",
            Counter::AbuseReports => "abuse-reports",
            Counter::Votes => "votes",
            Counter::YesVotes => "yes-votes",
            Counter::NoVotes => "no-votes",
        }
    }

    /// Vote counters only move in pairs (see `CounterStore::increment_vote`).
    pub fn is_vote_counter(&self) -> bool {
        matches!(self, Counter::Votes | Counter::YesVotes | Counter::NoVotes)
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Counter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_ascii_lowercase().replace('_', "-");
        Counter::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("unknown counter: {s}"))
    }
}

/// Which side of a vote an increment applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteKind {
    Yes,
    No,
}

impl VoteKind {
    /// The side counter that moves together with `votes_count`.
    pub fn counter(&self) -> Counter {
        match self {
            VoteKind::Yes => Counter::YesVotes,
            VoteKind::No => Counter::NoVotes,
        }
    }
}

/// Engagement counters attached to one content item. All non-negative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementCounters {
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub bookmarks: i64,
    pub shares: i64,
    pub ratings: i64,
    /// Mean rating on the 0-5 scale; meaningless while `ratings == 0`.
    pub ratings_average: f64,
    pub abuse_reports: i64,
    pub votes: i64,
    pub yes_votes: i64,
    pub no_votes: i64,
}

impl EngagementCounters {
    /// `yes + no == votes`. A violation cannot be repaired automatically
    /// because there is no authoritative value to repair towards.
    pub fn votes_consistent(&self) -> bool {
        self.yes_votes + self.no_votes == self.votes
    }
}

/// A post, comment or reply together with its counters.
///
/// `content_quality` is a cached derivation of the counters and the item's
/// age. It is only ever written through compare-and-replace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub kind: ContentKind,
    pub parent_id: Option<String>,
    pub author_id: String,
    pub group_id: Option<String>,
    pub status: ContentStatus,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Body length in characters, feeds the content sub-score.
    pub content_length: i64,
    pub featured: bool,
    pub tags_count: i64,
    pub counters: EngagementCounters,
    pub content_quality: f64,
    /// Bumped by every applied compare-and-replace. Counter increments leave it alone.
    pub version: i64,
}

impl ContentItem {
    /// A freshly created, published item: zero counters, zero quality.
    ///
    /// `created_at` is truncated to the microsecond precision timestamps are
    /// stored at.
    pub fn new(
        id: impl Into<String>,
        kind: ContentKind,
        author_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let created_at = created_at.trunc_subsecs(6);
        Self {
            id: id.into(),
            kind,
            parent_id: None,
            author_id: author_id.into(),
            group_id: None,
            status: ContentStatus::Published,
            created_at,
            modified_at: created_at,
            content_length: 0,
            featured: false,
            tags_count: 0,
            counters: EngagementCounters::default(),
            content_quality: 0.0,
            version: 0,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }
}

/// Key used by the batched "count by many X" queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Parent,
    User,
    Group,
}

impl GroupKey {
    pub fn column(&self) -> &'static str {
        match self {
            GroupKey::Parent => "parent_id",
            GroupKey::User => "author_id",
            GroupKey::Group => "group_id",
        }
    }
}

impl FromStr for GroupKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "parent" | "parents" => Ok(GroupKey::Parent),
            "user" | "users" | "author" => Ok(GroupKey::User),
            "group" | "groups" => Ok(GroupKey::Group),
            other => Err(format!("unknown grouping key: {other}")),
        }
    }
}

/// Sort field for ranking queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    Quality,
    CreatedAt,
    ModifiedAt,
    Counter(Counter),
}

impl OrderBy {
    pub fn column(&self) -> &'static str {
        match self {
            OrderBy::Quality => "content_quality",
            OrderBy::CreatedAt => "created_at",
            OrderBy::ModifiedAt => "modified_at",
            OrderBy::Counter(counter) => counter.column(),
        }
    }
}

impl FromStr for OrderBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quality" | "score" => Ok(OrderBy::Quality),
            "created" | "created-at" | "created_at" => Ok(OrderBy::CreatedAt),
            "modified" | "modified-at" | "modified_at" => Ok(OrderBy::ModifiedAt),
            other => other.parse::<Counter>().map(OrderBy::Counter),
        }
    }
}

/// Row filter shared by ranking and counting queries. `None` means "any".
#[derive(Debug, Clone, PartialEq)]
pub struct ContentFilter {
    pub kind: ContentKind,
    pub status: Option<ContentStatus>,
    pub parent_id: Option<String>,
    pub author_id: Option<String>,
    pub group_id: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

impl ContentFilter {
    pub fn for_kind(kind: ContentKind) -> Self {
        Self {
            kind,
            status: None,
            parent_id: None,
            author_id: None,
            group_id: None,
            created_after: None,
            created_before: None,
        }
    }

    pub fn with_status(mut self, status: ContentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// A filtered, sorted page request, already validated and capped.
#[derive(Debug, Clone, PartialEq)]
pub struct PageQuery {
    pub filter: ContentFilter,
    pub order_by: OrderBy,
    pub descending: bool,
    pub skip: u32,
    pub limit: u32,
}

/// Timestamps are stored as fixed-width RFC 3339 UTC strings so that
/// lexicographic order equals chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_parse_accepts_both_separators() {
        assert_eq!("abuse_reports".parse::<Counter>(), Ok(Counter::AbuseReports));
        assert_eq!("Yes-Votes".parse::<Counter>(), Ok(Counter::YesVotes));
        assert!("karma".parse::<Counter>().is_err());
    }

    #[test]
    fn test_order_by_falls_back_to_counters() {
        assert_eq!("score".parse::<OrderBy>(), Ok(OrderBy::Quality));
        assert_eq!("likes".parse::<OrderBy>(), Ok(OrderBy::Counter(Counter::Likes)));
        assert_eq!(OrderBy::Counter(Counter::Views).column(), "views_count");
    }

    #[test]
    fn test_new_item_starts_at_zero() {
        let item = ContentItem::new("p1", ContentKind::Post, "u1", Utc::now());
        assert_eq!(item.counters, EngagementCounters::default());
        assert_eq!(item.content_quality, 0.0);
        assert!(item.counters.votes_consistent());
    }

    #[test]
    fn test_new_item_timestamps_survive_storage_format() {
        let item = ContentItem::new("p1", ContentKind::Post, "u1", Utc::now());
        let stored = parse_timestamp(&format_timestamp(&item.created_at)).unwrap();
        assert_eq!(stored, item.created_at);
        assert_eq!(item.modified_at, item.created_at);
    }

    #[test]
    fn test_votes_consistency() {
        let mut counters = EngagementCounters::default();
        counters.votes = 3;
        counters.yes_votes = 2;
        counters.no_votes = 1;
        assert!(counters.votes_consistent());
        counters.no_votes = 0;
        assert!(!counters.votes_consistent());
    }

    #[test]
    fn test_timestamp_strings_sort_chronologically() {
        let early = parse_timestamp("2024-01-01T00:00:00Z").unwrap();
        let late = parse_timestamp("2024-01-01T00:00:00.5Z").unwrap();
        assert!(format_timestamp(&early) < format_timestamp(&late));
        assert_eq!(parse_timestamp(&format_timestamp(&late)).unwrap(), late);
    }
}
