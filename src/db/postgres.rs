// PgStore: PostgreSQL backend implementing the CounterStore trait.
//
// Uses sqlx PgPool for native async queries. All queries use runtime
// parameter binding (not compile-time macros) to avoid requiring
// DATABASE_URL at compile time.
//
// Key differences from SQLite:
// - TIMESTAMPTZ instead of TEXT for timestamps
// - GREATEST instead of scalar MAX for the clamp
// - `= ANY($n)` with an array bind instead of expanded IN-lists
// - $1/$2 parameter syntax (handled by sqlx)

use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx_core::pool::Pool;
use sqlx_core::query::Query;
use sqlx_core::row::Row;
use sqlx_postgres::{PgArguments, PgRow, Postgres};

use super::models::{
    ContentFilter, ContentItem, ContentKind, Counter, EngagementCounters, GroupKey, PageQuery,
    VoteKind,
};
use super::traits::CounterStore;
use crate::error::{EngineError, Result};

/// Type alias for the PostgreSQL connection pool.
pub type PgPool = Pool<Postgres>;

const ITEM_COLUMNS: &str = "id, kind, parent_id, author_id, group_id, status, created_at, \
    modified_at, content_length, featured, tags_count, views_count, likes_count, \
    comments_count, bookmarks_count, shares_count, ratings_count, ratings_average_value, \
    abuse_reports_count, votes_count, yes_votes_count, no_votes_count, content_quality, version";

pub struct PgStore {
    pool: PgPool,
}

/// A runtime bind value for dynamically assembled WHERE clauses.
enum Bind {
    Text(String),
    Time(DateTime<Utc>),
    Int(i64),
    TextArray(Vec<String>),
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    binds: Vec<Bind>,
) -> Query<'q, Postgres, PgArguments> {
    for bind in binds {
        query = match bind {
            Bind::Text(v) => query.bind(v),
            Bind::Time(v) => query.bind(v),
            Bind::Int(v) => query.bind(v),
            Bind::TextArray(v) => query.bind(v),
        };
    }
    query
}

/// Append WHERE conditions for `filter`, numbering placeholders after `binds`.
fn push_filter(filter: &ContentFilter, clauses: &mut Vec<String>, binds: &mut Vec<Bind>) {
    let mut push = |clause: &str, bind: Bind, binds: &mut Vec<Bind>| {
        binds.push(bind);
        clauses.push(format!("{clause} ${}", binds.len()));
    };

    push("kind =", Bind::Text(filter.kind.as_str().to_string()), binds);
    if let Some(status) = filter.status {
        push("status =", Bind::Text(status.as_str().to_string()), binds);
    }
    if let Some(parent) = &filter.parent_id {
        push("parent_id =", Bind::Text(parent.clone()), binds);
    }
    if let Some(author) = &filter.author_id {
        push("author_id =", Bind::Text(author.clone()), binds);
    }
    if let Some(group) = &filter.group_id {
        push("group_id =", Bind::Text(group.clone()), binds);
    }
    if let Some(after) = filter.created_after {
        push("created_at >=", Bind::Time(after), binds);
    }
    if let Some(before) = filter.created_before {
        push("created_at <", Bind::Time(before), binds);
    }
}

fn corrupt(column: &str, err: String) -> EngineError {
    EngineError::Corrupt(format!("unreadable {column} column: {err}"))
}

fn row_to_item(row: &PgRow) -> Result<ContentItem> {
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    Ok(ContentItem {
        id: row.try_get("id")?,
        kind: kind.parse().map_err(|e| corrupt("kind", e))?,
        parent_id: row.try_get("parent_id")?,
        author_id: row.try_get("author_id")?,
        group_id: row.try_get("group_id")?,
        status: status.parse().map_err(|e| corrupt("status", e))?,
        created_at: row.try_get("created_at")?,
        modified_at: row.try_get("modified_at")?,
        content_length: row.try_get("content_length")?,
        featured: row.try_get("featured")?,
        tags_count: row.try_get("tags_count")?,
        counters: EngagementCounters {
            views: row.try_get("views_count")?,
            likes: row.try_get("likes_count")?,
            comments: row.try_get("comments_count")?,
            bookmarks: row.try_get("bookmarks_count")?,
            shares: row.try_get("shares_count")?,
            ratings: row.try_get("ratings_count")?,
            ratings_average: row.try_get("ratings_average_value")?,
            abuse_reports: row.try_get("abuse_reports_count")?,
            votes: row.try_get("votes_count")?,
            yes_votes: row.try_get("yes_votes_count")?,
            no_votes: row.try_get("no_votes_count")?,
        },
        content_quality: row.try_get("content_quality")?,
        version: row.try_get("version")?,
    })
}

fn not_found(id: &str) -> EngineError {
    EngineError::NotFound { id: id.to_string() }
}

impl PgStore {
    async fn exists(&self, id: &str) -> Result<bool> {
        let exists = sqlx_core::query::query("SELECT COUNT(*) > 0 FROM content_items WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?
            .try_get(0)?;
        Ok(exists)
    }

    /// Zero rows updated: the item is missing, or the overflow guard refused the delta.
    async fn refused(&self, id: &str, what: String) -> Result<EngineError> {
        if self.exists(id).await? {
            Ok(EngineError::InvalidArgument(what))
        } else {
            Ok(not_found(id))
        }
    }

    /// Connect to PostgreSQL and run migrations.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .with_context(|| format!("Failed to connect to PostgreSQL at {database_url}"))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run all pending migrations.
    ///
    /// Holds a session-level advisory lock on a dedicated connection so that
    /// two instances starting together don't race to apply the same
    /// migration. The unlock always runs, even when a migration fails.
    async fn run_migrations(&self) -> anyhow::Result<()> {
        // 0x43555241544F5221 = ASCII "CURATOR!" as a big-endian i64.
        const MIGRATION_LOCK_KEY: i64 = 0x43555241544F5221_u64 as i64;

        let mut lock_conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection for migration advisory lock")?;

        sqlx_core::query::query("SELECT pg_advisory_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *lock_conn)
            .await
            .context("Failed to acquire migration advisory lock")?;

        let migration_result: anyhow::Result<()> = async {
            sqlx_core::query::query(
                "CREATE TABLE IF NOT EXISTS schema_version (
                    version INTEGER PRIMARY KEY,
                    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )",
            )
            .execute(&self.pool)
            .await?;

            let migrations = [(
                1,
                include_str!("../../migrations/postgres/0001_initial.sql"),
            )];

            for (version, sql) in migrations {
                let applied: bool = sqlx_core::query::query(
                    "SELECT COUNT(*) > 0 FROM schema_version WHERE version = $1",
                )
                .bind(version)
                .fetch_one(&self.pool)
                .await
                .map(|row| row.get::<bool, _>(0))
                .unwrap_or(false);

                if !applied {
                    let mut tx = self.pool.begin().await?;
                    sqlx_core::raw_sql::raw_sql(sql).execute(&mut *tx).await?;
                    tx.commit().await?;
                }
            }

            Ok(())
        }
        .await;

        let unlock_result = sqlx_core::query::query("SELECT pg_advisory_unlock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *lock_conn)
            .await
            .context("Failed to release migration advisory lock");

        // Migration error takes priority over unlock error.
        migration_result?;
        unlock_result?;

        Ok(())
    }
}

#[async_trait]
impl CounterStore for PgStore {
    async fn create(&self, item: &ContentItem) -> Result<()> {
        sqlx_core::query::query(
            "INSERT INTO content_items (id, kind, parent_id, author_id, group_id, status,
                                        created_at, modified_at, content_length, featured, tags_count)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&item.id)
        .bind(item.kind.as_str())
        .bind(&item.parent_id)
        .bind(&item.author_id)
        .bind(&item.group_id)
        .bind(item.status.as_str())
        .bind(item.created_at)
        .bind(item.modified_at)
        .bind(item.content_length)
        .bind(item.featured)
        .bind(item.tags_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<ContentItem> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM content_items WHERE id = $1");
        let row = sqlx_core::query::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(id))?;
        row_to_item(&row)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx_core::query::query("DELETE FROM content_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn compare_and_replace(&self, item: &ContentItem) -> Result<ContentItem> {
        let sql = format!(
            "UPDATE content_items SET
                parent_id = $1,
                author_id = $2,
                group_id = $3,
                status = $4,
                modified_at = $5,
                content_length = $6,
                featured = $7,
                tags_count = $8,
                content_quality = $9,
                version = version + 1
             WHERE id = $10 AND version = $11
             RETURNING {ITEM_COLUMNS}"
        );
        let row = sqlx_core::query::query(&sql)
            .bind(&item.parent_id)
            .bind(&item.author_id)
            .bind(&item.group_id)
            .bind(item.status.as_str())
            .bind(item.modified_at)
            .bind(item.content_length)
            .bind(item.featured)
            .bind(item.tags_count)
            .bind(item.content_quality)
            .bind(&item.id)
            .bind(item.version)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row_to_item(&row),
            None => {
                if self.exists(&item.id).await? {
                    Err(EngineError::Conflict { id: item.id.clone() })
                } else {
                    Err(not_found(&item.id))
                }
            }
        }
    }

    async fn atomic_increment(&self, id: &str, counter: Counter, delta: i64) -> Result<i64> {
        let column = counter.column();
        let sql = format!(
            "UPDATE content_items SET {column} = GREATEST(0, COALESCE({column}, 0) + $1)
             WHERE id = $2 AND COALESCE({column}, 0) <= 9223372036854775807 - GREATEST($1, 0)
             RETURNING {column}"
        );
        let row = sqlx_core::query::query(&sql)
            .bind(delta)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(row.try_get(0)?),
            None => Err(self
                .refused(id, format!("adding {delta} to {counter} of {id} would overflow"))
                .await?),
        }
    }

    async fn increment_vote(&self, id: &str, vote: VoteKind, delta: i64) -> Result<(i64, i64)> {
        let side = vote.counter().column();
        let sql = format!(
            "UPDATE content_items SET
                votes_count = GREATEST(0, votes_count + GREATEST($1, -{side})),
                {side} = {side} + GREATEST($1, -{side})
             WHERE id = $2
               AND votes_count <= 9223372036854775807 - GREATEST($1, 0)
               AND {side} <= 9223372036854775807 - GREATEST($1, 0)
             RETURNING votes_count, {side}"
        );
        let row = sqlx_core::query::query(&sql)
            .bind(delta)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok((row.try_get(0)?, row.try_get(1)?)),
            None => Err(self
                .refused(id, format!("adding {delta} {vote:?} votes to {id} would overflow"))
                .await?),
        }
    }

    async fn add_rating(&self, id: &str, value: f64) -> Result<(i64, f64)> {
        let row = sqlx_core::query::query(
            "UPDATE content_items SET
                ratings_average_value = (ratings_average_value * ratings_count + $1) / (ratings_count + 1),
                ratings_count = ratings_count + 1
             WHERE id = $2 AND ratings_count < 9223372036854775807
             RETURNING ratings_count, ratings_average_value",
        )
        .bind(value)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok((row.try_get(0)?, row.try_get(1)?)),
            None => Err(self
                .refused(id, format!("rating count of {id} would overflow"))
                .await?),
        }
    }

    async fn filter_sort_paginate(&self, query: &PageQuery) -> Result<Vec<ContentItem>> {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();
        push_filter(&query.filter, &mut clauses, &mut binds);

        binds.push(Bind::Int(i64::from(query.limit)));
        let limit_idx = binds.len();
        binds.push(Bind::Int(i64::from(query.skip)));
        let offset_idx = binds.len();

        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM content_items WHERE {} ORDER BY {} LIMIT ${limit_idx} OFFSET ${offset_idx}",
            clauses.join(" AND "),
            super::order_clause(query),
        );
        let rows = bind_all(sqlx_core::query::query(&sql), binds)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_item).collect()
    }

    async fn count_grouped_by(
        &self,
        key: GroupKey,
        keys: Option<&[String]>,
        filter: &ContentFilter,
    ) -> Result<HashMap<String, i64>> {
        let column = key.column();
        let mut clauses = Vec::new();
        let mut binds = Vec::new();
        push_filter(filter, &mut clauses, &mut binds);
        clauses.push(format!("{column} IS NOT NULL"));

        if let Some(keys) = keys {
            if keys.is_empty() {
                return Ok(HashMap::new());
            }
            binds.push(Bind::TextArray(keys.to_vec()));
            clauses.push(format!("{column} = ANY(${})", binds.len()));
        }

        let sql = format!(
            "SELECT {column}, COUNT(*)::bigint FROM content_items WHERE {} GROUP BY {column}",
            clauses.join(" AND ")
        );
        let rows = bind_all(sqlx_core::query::query(&sql), binds)
            .fetch_all(&self.pool)
            .await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            counts.insert(row.try_get::<String, _>(0)?, row.try_get::<i64, _>(1)?);
        }
        Ok(counts)
    }

    async fn count_by_kind(&self) -> Result<Vec<(ContentKind, i64)>> {
        let rows = sqlx_core::query::query(
            "SELECT kind, COUNT(*)::bigint FROM content_items GROUP BY kind ORDER BY kind",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            let kind: String = row.try_get(0)?;
            counts.push((kind.parse().map_err(|e| corrupt("kind", e))?, row.try_get(1)?));
        }
        Ok(counts)
    }

    async fn count_inconsistent_votes(&self) -> Result<i64> {
        let row = sqlx_core::query::query(
            "SELECT COUNT(*)::bigint FROM content_items
             WHERE yes_votes_count + no_votes_count <> votes_count",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get(0)?)
    }

    async fn get_engine_state(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx_core::query::query("SELECT value FROM engine_state WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => Ok(Some(r.try_get(0)?)),
            None => Ok(None),
        }
    }

    async fn set_engine_state(&self, key: &str, value: &str) -> Result<()> {
        sqlx_core::query::query(
            "INSERT INTO engine_state (key, value, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT(key) DO UPDATE SET value = $2, updated_at = NOW()",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
