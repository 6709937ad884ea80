// Ranking queries over the persisted quality score (or any counter column).
//
// A thin layer over the store: validates the page request, caps the page
// size for the content kind and passes store errors through untouched. A
// failed lookup must never turn into an empty ranking.

use std::sync::Arc;

use tracing::debug;

use crate::db::models::{ContentFilter, ContentItem, OrderBy, PageQuery};
use crate::db::CounterStore;
use crate::error::{EngineError, Result};

#[derive(Clone)]
pub struct RankingService {
    store: Arc<dyn CounterStore>,
}

impl RankingService {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Validate and cap a page request.
    ///
    /// `limit` must be positive; anything above the kind's maximum page size
    /// is silently reduced to it.
    pub fn prepare(&self, mut query: PageQuery) -> Result<PageQuery> {
        if query.limit == 0 {
            return Err(EngineError::invalid("limit must be greater than zero"));
        }
        let max = query.filter.kind.max_page_size();
        if query.limit > max {
            debug!(
                kind = query.filter.kind.as_str(),
                requested = query.limit,
                max,
                "Capping page size"
            );
            query.limit = max;
        }
        Ok(query)
    }

    /// Ordered, filtered page of content.
    ///
    /// Equal sort values fall back to `created_at` descending, then `id`
    /// ascending, so repeated calls page through a stable order.
    pub async fn find_by_score(&self, query: PageQuery) -> Result<Vec<ContentItem>> {
        let query = self.prepare(query)?;
        self.store.filter_sort_paginate(&query).await
    }

    /// Highest quality first.
    pub async fn top_by_quality(&self, filter: ContentFilter, skip: u32, limit: u32) -> Result<Vec<ContentItem>> {
        self.find_by_score(PageQuery {
            filter,
            order_by: OrderBy::Quality,
            descending: true,
            skip,
            limit,
        })
        .await
    }
}
