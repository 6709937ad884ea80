// Aggregate counter service: race-free counter deltas and batched counts.
//
// Every mutation is delegated to one store primitive (a single conditional
// UPDATE), so concurrent callers on the same item never lose updates. The
// service adds argument checking, logging and the zero-fill contract for
// batched counts. It never retries: a store failure goes straight back to
// the caller.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::db::models::{ContentFilter, Counter, GroupKey, VoteKind};
use crate::db::CounterStore;
use crate::error::{EngineError, Result};
use crate::scoring::normalize::MAX_RATING;

#[derive(Clone)]
pub struct AggregateCounterService {
    store: Arc<dyn CounterStore>,
}

impl AggregateCounterService {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Apply `delta` to one counter, clamping at zero. Returns the new value.
    ///
    /// Vote counters are refused here: they must move through
    /// `increment_votes` so that `yes + no == votes` keeps holding.
    pub async fn increment_counter(&self, item_id: &str, counter: Counter, delta: i64) -> Result<i64> {
        if counter.is_vote_counter() {
            return Err(EngineError::invalid(format!(
                "{counter} can only change together with its vote pair"
            )));
        }
        let value = self.store.atomic_increment(item_id, counter, delta).await?;
        debug!(item_id, counter = counter.as_str(), delta, value, "Counter incremented");
        Ok(value)
    }

    /// Move `votes_count` and the yes/no side together, as one statement.
    /// Returns `(votes, side)` after the update.
    pub async fn increment_votes(&self, item_id: &str, vote: VoteKind, delta: i64) -> Result<(i64, i64)> {
        let (votes, side) = self.store.increment_vote(item_id, vote, delta).await?;
        debug!(item_id, vote = ?vote, delta, votes, side, "Vote pair incremented");
        Ok((votes, side))
    }

    pub async fn increment_votes_and_yes_votes(&self, item_id: &str, delta: i64) -> Result<(i64, i64)> {
        self.increment_votes(item_id, VoteKind::Yes, delta).await
    }

    pub async fn increment_votes_and_no_votes(&self, item_id: &str, delta: i64) -> Result<(i64, i64)> {
        self.increment_votes(item_id, VoteKind::No, delta).await
    }

    /// Record one rating (0-5). Count and running average change together.
    pub async fn add_rating(&self, item_id: &str, value: f64) -> Result<(i64, f64)> {
        if !value.is_finite() || !(0.0..=MAX_RATING).contains(&value) {
            return Err(EngineError::invalid(format!(
                "rating must be between 0 and {MAX_RATING}, got {value}"
            )));
        }
        let (count, average) = self.store.add_rating(item_id, value).await?;
        debug!(item_id, value, count, average, "Rating recorded");
        Ok((count, average))
    }

    /// Count matching rows for each candidate key. Every candidate appears in
    /// the result, with 0 when nothing matched.
    pub async fn count_by(
        &self,
        key: GroupKey,
        candidates: &[String],
        filter: &ContentFilter,
    ) -> Result<HashMap<String, i64>> {
        let unique: Vec<String> = candidates
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if unique.is_empty() {
            return Ok(HashMap::new());
        }

        let mut counts = self.store.count_grouped_by(key, Some(&unique), filter).await?;
        for candidate in unique {
            counts.entry(candidate).or_insert(0);
        }
        Ok(counts)
    }

    /// Count matching rows for every key value present in the filtered set.
    pub async fn count_by_all(&self, key: GroupKey, filter: &ContentFilter) -> Result<HashMap<String, i64>> {
        self.store.count_grouped_by(key, None, filter).await
    }

    pub async fn count_by_parents(
        &self,
        parent_ids: &[String],
        filter: &ContentFilter,
    ) -> Result<HashMap<String, i64>> {
        self.count_by(GroupKey::Parent, parent_ids, filter).await
    }

    pub async fn count_by_users(
        &self,
        user_ids: &[String],
        filter: &ContentFilter,
    ) -> Result<HashMap<String, i64>> {
        self.count_by(GroupKey::User, user_ids, filter).await
    }

    pub async fn count_by_groups(
        &self,
        group_ids: &[String],
        filter: &ContentFilter,
    ) -> Result<HashMap<String, i64>> {
        self.count_by(GroupKey::Group, group_ids, filter).await
    }

    pub async fn count_by_all_users(&self, filter: &ContentFilter) -> Result<HashMap<String, i64>> {
        self.count_by_all(GroupKey::User, filter).await
    }

    pub async fn count_by_all_groups(&self, filter: &ContentFilter) -> Result<HashMap<String, i64>> {
        self.count_by_all(GroupKey::Group, filter).await
    }
}
