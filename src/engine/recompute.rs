// Batch recompute job: refreshes the persisted quality of every item of
// one kind.
//
// Pages through the kind in creation order and recomputes each page with
// bounded concurrency. The quality is computed from the page snapshot and
// written under that snapshot's version, so a record replaced in the
// meantime is counted as a conflict and left for the next run. An item whose
// stored fields cannot be scored is counted as invalid and skipped. Store
// outages abort the job.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::content::ContentEngine;
use crate::db::models::{format_timestamp, ContentFilter, ContentKind, OrderBy, PageQuery};
use crate::error::{EngineError, Result};
use crate::scoring::quality::ScoreWeights;

/// Outcome counts for one recompute run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecomputeSummary {
    pub scanned: u64,
    pub updated: u64,
    /// Lost a compare-and-replace race; skipped.
    pub conflicts: u64,
    /// Deleted between listing and writing.
    pub missing: u64,
    /// Stored fields could not be scored; skipped.
    pub invalid: u64,
}

/// Engine state key holding the last completed run for a kind.
pub fn last_recompute_key(kind: ContentKind) -> String {
    format!("last_recompute_at:{kind}")
}

pub struct RecomputeJob<'a> {
    pub engine: &'a ContentEngine,
    pub weights: &'a ScoreWeights,
    pub half_life_days: i64,
    pub page_size: u32,
    pub concurrency: usize,
}

impl RecomputeJob<'_> {
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RecomputeSummary> {
        let store = self.engine.store();
        self.weights.validate()?;
        crate::scoring::decay::decay_factor(0.0, self.half_life_days)?;
        if self.page_size == 0 {
            return Err(EngineError::invalid("page size must be greater than zero"));
        }
        let concurrency = self.concurrency.max(1);

        let mut summary = RecomputeSummary::default();
        let mut skip = 0u32;
        loop {
            let page = store
                .filter_sort_paginate(&PageQuery {
                    filter: ContentFilter::for_kind(self.engine.kind()),
                    order_by: OrderBy::CreatedAt,
                    descending: false,
                    skip,
                    limit: self.page_size,
                })
                .await?;
            let fetched = page.len() as u32;
            summary.scanned += u64::from(fetched);

            let outcomes: Vec<(String, Result<()>)> = stream::iter(page)
                .map(|item| async move {
                    let id = item.id.clone();
                    let outcome = match self.engine.calculate_content_quality(
                        &item,
                        self.weights,
                        self.half_life_days,
                        now,
                    ) {
                        Ok(quality) => self.engine.replace_quality(item, quality).await.map(|_| ()),
                        Err(err) => Err(err),
                    };
                    (id, outcome)
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

            for (id, outcome) in outcomes {
                match outcome {
                    Ok(()) => summary.updated += 1,
                    Err(EngineError::Conflict { .. }) => {
                        debug!(item_id = %id, "Skipping item replaced during recompute");
                        summary.conflicts += 1;
                    }
                    Err(EngineError::NotFound { .. }) => summary.missing += 1,
                    Err(EngineError::InvalidArgument(reason)) => {
                        warn!(item_id = %id, %reason, "Skipping item that cannot be scored");
                        summary.invalid += 1;
                    }
                    Err(other) => return Err(other),
                }
            }

            if fetched < self.page_size {
                break;
            }
            skip = skip.saturating_add(fetched);
        }

        store
            .set_engine_state(&last_recompute_key(self.engine.kind()), &format_timestamp(&now))
            .await?;

        info!(
            kind = self.engine.kind().as_str(),
            scanned = summary.scanned,
            updated = summary.updated,
            conflicts = summary.conflicts,
            missing = summary.missing,
            invalid = summary.invalid,
            "Quality recompute complete"
        );
        Ok(summary)
    }
}
