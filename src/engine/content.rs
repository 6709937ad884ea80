// Per-content-type engine: the surface the rest of the platform calls.
//
// One ContentEngine exists per content kind (posts, comments, replies). It
// ties the pure QualityCalculator to the store: per-signal scores, the
// composite quality, persisting a computed quality through
// compare-and-replace, counter increments and batched counts.
//
// Compute and persist are separate so callers can recompute in bulk off
// the write path (see recompute.rs).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::counters::AggregateCounterService;
use super::ranking::RankingService;
use crate::db::models::{ContentFilter, ContentItem, ContentKind, ContentStatus, Counter, PageQuery, VoteKind};
use crate::db::CounterStore;
use crate::error::{EngineError, Result};
use crate::scoring::quality::{QualityBreakdown, QualityCalculator, ScoreWeights, Signal};

#[derive(Clone)]
pub struct ContentEngine {
    kind: ContentKind,
    store: Arc<dyn CounterStore>,
    calculator: QualityCalculator,
    counters: AggregateCounterService,
    ranking: RankingService,
}

impl ContentEngine {
    pub fn new(kind: ContentKind, store: Arc<dyn CounterStore>) -> Self {
        Self::with_calculator(kind, store, QualityCalculator::default())
    }

    pub fn with_calculator(kind: ContentKind, store: Arc<dyn CounterStore>, calculator: QualityCalculator) -> Self {
        Self {
            kind,
            counters: AggregateCounterService::new(store.clone()),
            ranking: RankingService::new(store.clone()),
            store,
            calculator,
        }
    }

    pub fn posts(store: Arc<dyn CounterStore>) -> Self {
        Self::new(ContentKind::Post, store)
    }

    pub fn comments(store: Arc<dyn CounterStore>) -> Self {
        Self::new(ContentKind::Comment, store)
    }

    pub fn replies(store: Arc<dyn CounterStore>) -> Self {
        Self::new(ContentKind::Reply, store)
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    pub fn calculator(&self) -> &QualityCalculator {
        &self.calculator
    }

    pub fn counters(&self) -> &AggregateCounterService {
        &self.counters
    }

    pub fn ranking(&self) -> &RankingService {
        &self.ranking
    }

    fn check_kind(&self, item: &ContentItem) -> Result<()> {
        if item.kind != self.kind {
            return Err(EngineError::invalid(format!(
                "{} engine cannot handle {} item {}",
                self.kind, item.kind, item.id
            )));
        }
        Ok(())
    }

    // --- Records ---

    /// Fetch an item of this engine's kind. Vote counters that disagree are
    /// reported, not repaired.
    pub async fn get(&self, id: &str) -> Result<ContentItem> {
        let item = self.store.get(id).await?;
        self.check_kind(&item)?;
        report_vote_inconsistency(&item);
        Ok(item)
    }

    /// Store a new item with zero counters and zero quality.
    pub async fn create(&self, item: &ContentItem) -> Result<()> {
        self.check_kind(item)?;
        check_item_fields(item)?;
        self.store.create(item).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.get(id).await?;
        self.store.delete(id).await
    }

    // --- Per-signal scores ---

    pub fn calculate_signal_score(&self, item: &ContentItem, signal: Signal) -> Result<f64> {
        self.check_kind(item)?;
        self.calculator.signal_score(item, signal)
    }

    pub fn calculate_content_score(&self, item: &ContentItem) -> Result<f64> {
        self.calculate_signal_score(item, Signal::Content)
    }

    pub fn calculate_featured_score(&self, item: &ContentItem) -> Result<f64> {
        self.calculate_signal_score(item, Signal::Featured)
    }

    pub fn calculate_tags_score(&self, item: &ContentItem) -> Result<f64> {
        self.calculate_signal_score(item, Signal::Tags)
    }

    pub fn calculate_views_score(&self, item: &ContentItem) -> Result<f64> {
        self.calculate_signal_score(item, Signal::Views)
    }

    pub fn calculate_bookmarks_score(&self, item: &ContentItem) -> Result<f64> {
        self.calculate_signal_score(item, Signal::Bookmarks)
    }

    pub fn calculate_comments_score(&self, item: &ContentItem) -> Result<f64> {
        self.calculate_signal_score(item, Signal::Comments)
    }

    pub fn calculate_likes_score(&self, item: &ContentItem) -> Result<f64> {
        self.calculate_signal_score(item, Signal::Likes)
    }

    pub fn calculate_ratings_score(&self, item: &ContentItem) -> Result<f64> {
        self.calculate_signal_score(item, Signal::Ratings)
    }

    pub fn calculate_shares_score(&self, item: &ContentItem) -> Result<f64> {
        self.calculate_signal_score(item, Signal::Shares)
    }

    pub fn calculate_replies_score(&self, item: &ContentItem) -> Result<f64> {
        self.calculate_signal_score(item, Signal::Replies)
    }

    pub fn calculate_votes_score(&self, item: &ContentItem) -> Result<f64> {
        self.calculate_signal_score(item, Signal::Votes)
    }

    pub fn calculate_abuse_reports_score(&self, item: &ContentItem) -> Result<f64> {
        self.calculate_signal_score(item, Signal::AbuseReports)
    }

    // --- Quality ---

    /// Weighted, penalty-adjusted, decayed quality of `item` at `now`.
    pub fn calculate_content_quality(
        &self,
        item: &ContentItem,
        weights: &ScoreWeights,
        half_life_days: i64,
        now: DateTime<Utc>,
    ) -> Result<f64> {
        self.check_kind(item)?;
        self.calculator.calculate(item, weights, half_life_days, now)
    }

    pub fn explain_content_quality(
        &self,
        item: &ContentItem,
        weights: &ScoreWeights,
        half_life_days: i64,
        now: DateTime<Utc>,
    ) -> Result<QualityBreakdown> {
        self.check_kind(item)?;
        self.calculator.breakdown(item, weights, half_life_days, now)
    }

    /// Persist a previously computed quality value.
    ///
    /// Reads the record and writes it back with the new value under
    /// compare-and-replace. A concurrent replace in between surfaces as
    /// `Conflict`; the next recompute trigger will write a fresh value.
    pub async fn update_content_quality(&self, id: &str, value: f64) -> Result<ContentItem> {
        check_quality_value(value)?;
        let item = self.get(id).await?;
        self.replace_quality(item, value).await
    }

    /// Write `value` onto a snapshot already in hand, guarded by its version.
    pub(crate) async fn replace_quality(&self, mut item: ContentItem, value: f64) -> Result<ContentItem> {
        check_quality_value(value)?;
        self.check_kind(&item)?;
        check_item_fields(&item)?;
        item.content_quality = value;
        let applied = self.store.compare_and_replace(&item).await?;
        debug!(
            kind = self.kind.as_str(),
            item_id = %applied.id,
            quality = value,
            version = applied.version,
            "Quality persisted"
        );
        Ok(applied)
    }

    /// Read current counters, compute and persist in one call.
    pub async fn recompute_content_quality(
        &self,
        id: &str,
        weights: &ScoreWeights,
        half_life_days: i64,
        now: DateTime<Utc>,
    ) -> Result<f64> {
        // Validate before any store access.
        weights.validate()?;
        crate::scoring::decay::decay_factor(0.0, half_life_days)?;

        let item = self.get(id).await?;
        let quality = self.calculate_content_quality(&item, weights, half_life_days, now)?;
        self.replace_quality(item, quality).await?;
        Ok(quality)
    }

    // --- Counter increments ---

    pub async fn increment_views_count(&self, id: &str, count: i64) -> Result<i64> {
        self.counters.increment_counter(id, Counter::Views, count).await
    }

    pub async fn increment_bookmarks_count(&self, id: &str, count: i64) -> Result<i64> {
        self.counters.increment_counter(id, Counter::Bookmarks, count).await
    }

    pub async fn increment_comments_count(&self, id: &str, count: i64) -> Result<i64> {
        self.counters.increment_counter(id, Counter::Comments, count).await
    }

    pub async fn increment_likes_count(&self, id: &str, count: i64) -> Result<i64> {
        self.counters.increment_counter(id, Counter::Likes, count).await
    }

    pub async fn increment_ratings_count(&self, id: &str, count: i64) -> Result<i64> {
        self.counters.increment_counter(id, Counter::Ratings, count).await
    }

    pub async fn increment_shares_count(&self, id: &str, count: i64) -> Result<i64> {
        self.counters.increment_counter(id, Counter::Shares, count).await
    }

    pub async fn increment_abuse_reports_count(&self, id: &str, count: i64) -> Result<i64> {
        self.counters.increment_counter(id, Counter::AbuseReports, count).await
    }

    /// Votes always move together with one side; returns `(votes, side)`.
    pub async fn increment_votes_count(&self, id: &str, vote: VoteKind, count: i64) -> Result<(i64, i64)> {
        self.counters.increment_votes(id, vote, count).await
    }

    pub async fn increment_yes_votes_count(&self, id: &str, count: i64) -> Result<(i64, i64)> {
        self.counters.increment_votes_and_yes_votes(id, count).await
    }

    pub async fn increment_no_votes_count(&self, id: &str, count: i64) -> Result<(i64, i64)> {
        self.counters.increment_votes_and_no_votes(id, count).await
    }

    pub async fn add_rating(&self, id: &str, value: f64) -> Result<(i64, f64)> {
        self.counters.add_rating(id, value).await
    }

    // --- Batched counts of this kind ---

    fn count_filter(&self, status: Option<ContentStatus>) -> ContentFilter {
        ContentFilter {
            status,
            ..ContentFilter::for_kind(self.kind)
        }
    }

    /// Items of this kind under each parent; zero for parents with none.
    pub async fn get_counts_by_parents(
        &self,
        parent_ids: &[String],
        status: Option<ContentStatus>,
    ) -> Result<HashMap<String, i64>> {
        self.counters
            .count_by_parents(parent_ids, &self.count_filter(status))
            .await
    }

    pub async fn get_counts_by_users(
        &self,
        user_ids: &[String],
        status: Option<ContentStatus>,
    ) -> Result<HashMap<String, i64>> {
        self.counters
            .count_by_users(user_ids, &self.count_filter(status))
            .await
    }

    pub async fn get_counts_by_groups(
        &self,
        group_ids: &[String],
        status: Option<ContentStatus>,
    ) -> Result<HashMap<String, i64>> {
        self.counters
            .count_by_groups(group_ids, &self.count_filter(status))
            .await
    }

    pub async fn get_counts_by_all_users(&self, status: Option<ContentStatus>) -> Result<HashMap<String, i64>> {
        self.counters.count_by_all_users(&self.count_filter(status)).await
    }

    pub async fn get_counts_by_all_groups(&self, status: Option<ContentStatus>) -> Result<HashMap<String, i64>> {
        self.counters.count_by_all_groups(&self.count_filter(status)).await
    }

    // --- Ranking ---

    pub async fn find_by_score(&self, query: PageQuery) -> Result<Vec<ContentItem>> {
        if query.filter.kind != self.kind {
            return Err(EngineError::invalid(format!(
                "{} engine cannot rank {} items",
                self.kind, query.filter.kind
            )));
        }
        self.ranking.find_by_score(query).await
    }
}

fn check_quality_value(value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::invalid(format!(
            "quality must be a finite number >= 0, got {value}"
        )));
    }
    Ok(())
}

fn check_item_fields(item: &ContentItem) -> Result<()> {
    for (field, value) in [("content_length", item.content_length), ("tags_count", item.tags_count)] {
        if value < 0 {
            return Err(EngineError::invalid(format!(
                "{field} of {} must be non-negative, got {value}",
                item.id
            )));
        }
    }
    Ok(())
}

/// Emit the advisory inconsistency event for operational alerting.
fn report_vote_inconsistency(item: &ContentItem) {
    let c = &item.counters;
    if !c.votes_consistent() {
        warn!(
            item_id = %item.id,
            kind = item.kind.as_str(),
            votes = c.votes,
            yes_votes = c.yes_votes,
            no_votes = c.no_votes,
            "Inconsistent vote counters"
        );
    }
}
