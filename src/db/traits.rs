// Counter store trait: backend-agnostic async interface to the document store.
//
// Implementors: SqliteStore (wraps rusqlite), PgStore (wraps sqlx).
// All methods are async so both sync (rusqlite via Mutex) and native async
// (sqlx) backends fit behind a single interface.
//
// Every counter mutation is a single conditional UPDATE evaluated by the
// store, never a read followed by a write, so concurrent callers cannot lose
// updates.

use std::collections::HashMap;

use async_trait::async_trait;

use super::models::{ContentFilter, ContentItem, ContentKind, Counter, GroupKey, PageQuery, VoteKind};
use crate::error::Result;

#[async_trait]
pub trait CounterStore: Send + Sync {
    // --- Records ---

    /// Insert a new record. Counters and quality are written as zero
    /// regardless of what the caller passed in.
    async fn create(&self, item: &ContentItem) -> Result<()>;

    /// Fetch one record. Fails with `NotFound` when absent.
    async fn get(&self, id: &str) -> Result<ContentItem>;

    /// Remove a record together with its counters.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Replace the non-counter fields of `item` if the stored version still
    /// equals `item.version`, then return the applied record (version + 1).
    /// Counters are never written here. Fails with `Conflict` on a version
    /// mismatch and `NotFound` when the record is gone.
    async fn compare_and_replace(&self, item: &ContentItem) -> Result<ContentItem>;

    // --- Atomic counters ---

    /// `counter = max(0, counter + delta)` as one statement; returns the new value.
    /// An absent counter is treated as zero.
    async fn atomic_increment(&self, id: &str, counter: Counter, delta: i64) -> Result<i64>;

    /// Move `votes_count` and the matching side counter by the same amount
    /// in one statement. A negative delta is clamped to the side counter's
    /// current value so that neither column underflows and
    /// `yes + no == votes` survives. Returns `(votes, side)`.
    async fn increment_vote(&self, id: &str, vote: VoteKind, delta: i64) -> Result<(i64, i64)>;

    /// Add one rating on the 0-5 scale: bumps `ratings_count` and folds the
    /// value into the running average in one statement. Returns `(count, average)`.
    async fn add_rating(&self, id: &str, value: f64) -> Result<(i64, f64)>;

    // --- Queries ---

    /// Filtered, sorted, paginated listing. Ties on the sort field break by
    /// `created_at` descending, then `id` ascending.
    async fn filter_sort_paginate(&self, query: &PageQuery) -> Result<Vec<ContentItem>>;

    /// `COUNT(*)` of matching records grouped by `key`. With `keys` set only
    /// those key values are considered; without it every non-null key in the
    /// filtered set is returned. Keys with no rows are simply absent here.
    async fn count_grouped_by(
        &self,
        key: GroupKey,
        keys: Option<&[String]>,
        filter: &ContentFilter,
    ) -> Result<HashMap<String, i64>>;

    // --- Operational ---

    /// Number of records per content kind.
    async fn count_by_kind(&self) -> Result<Vec<(ContentKind, i64)>>;

    /// Number of records whose vote counters disagree (`yes + no != votes`).
    async fn count_inconsistent_votes(&self) -> Result<i64>;

    async fn get_engine_state(&self, key: &str) -> Result<Option<String>>;

    async fn set_engine_state(&self, key: &str, value: &str) -> Result<()>;
}
