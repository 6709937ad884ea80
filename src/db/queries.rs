// Database queries: every SQL statement the SQLite backend runs.
//
// Keeping SQL contained in one place gives the rest of the engine clean Rust
// interfaces. Counter mutations are single UPDATE ... RETURNING statements:
// SQLite evaluates the whole SET list against the pre-update row, so the
// clamp and the write happen in one atomic step.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::models::{
    format_timestamp, parse_timestamp, ContentFilter, ContentItem, ContentKind, Counter,
    EngagementCounters, GroupKey, PageQuery, VoteKind,
};
use crate::error::{EngineError, Result};

/// Keep IN-lists well below SQLite's bound-parameter limit.
const KEY_CHUNK_SIZE: usize = 500;

const ITEM_COLUMNS: &str = "id, kind, parent_id, author_id, group_id, status, created_at, \
    modified_at, content_length, featured, tags_count, views_count, likes_count, \
    comments_count, bookmarks_count, shares_count, ratings_count, ratings_average_value, \
    abuse_reports_count, votes_count, yes_votes_count, no_votes_count, content_quality, version";

fn parsed_column<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn time_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_item(row: &Row) -> rusqlite::Result<ContentItem> {
    Ok(ContentItem {
        id: row.get(0)?,
        kind: parsed_column(row, 1)?,
        parent_id: row.get(2)?,
        author_id: row.get(3)?,
        group_id: row.get(4)?,
        status: parsed_column(row, 5)?,
        created_at: time_column(row, 6)?,
        modified_at: time_column(row, 7)?,
        content_length: row.get(8)?,
        featured: row.get(9)?,
        tags_count: row.get(10)?,
        counters: EngagementCounters {
            views: row.get(11)?,
            likes: row.get(12)?,
            comments: row.get(13)?,
            bookmarks: row.get(14)?,
            shares: row.get(15)?,
            ratings: row.get(16)?,
            ratings_average: row.get(17)?,
            abuse_reports: row.get(18)?,
            votes: row.get(19)?,
            yes_votes: row.get(20)?,
            no_votes: row.get(21)?,
        },
        content_quality: row.get(22)?,
        version: row.get(23)?,
    })
}

/// Append the WHERE conditions for `filter` using anonymous `?` placeholders.
fn push_filter(filter: &ContentFilter, clauses: &mut Vec<String>, values: &mut Vec<Value>) {
    clauses.push("kind = ?".to_string());
    values.push(Value::Text(filter.kind.as_str().to_string()));

    if let Some(status) = filter.status {
        clauses.push("status = ?".to_string());
        values.push(Value::Text(status.as_str().to_string()));
    }
    let equalities = [
        ("parent_id", &filter.parent_id),
        ("author_id", &filter.author_id),
        ("group_id", &filter.group_id),
    ];
    for (column, value) in equalities {
        if let Some(v) = value {
            clauses.push(format!("{column} = ?"));
            values.push(Value::Text(v.clone()));
        }
    }
    if let Some(after) = filter.created_after {
        clauses.push("created_at >= ?".to_string());
        values.push(Value::Text(format_timestamp(&after)));
    }
    if let Some(before) = filter.created_before {
        clauses.push("created_at < ?".to_string());
        values.push(Value::Text(format_timestamp(&before)));
    }
}

// --- Records ---

pub fn insert_item(conn: &Connection, item: &ContentItem) -> Result<()> {
    conn.execute(
        "INSERT INTO content_items (id, kind, parent_id, author_id, group_id, status,
                                    created_at, modified_at, content_length, featured, tags_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            item.id,
            item.kind.as_str(),
            item.parent_id,
            item.author_id,
            item.group_id,
            item.status.as_str(),
            format_timestamp(&item.created_at),
            format_timestamp(&item.modified_at),
            item.content_length,
            item.featured,
            item.tags_count,
        ],
    )?;
    Ok(())
}

pub fn get_item(conn: &Connection, id: &str) -> Result<ContentItem> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM content_items WHERE id = ?1");
    conn.query_row(&sql, params![id], row_to_item)
        .optional()?
        .ok_or_else(|| EngineError::NotFound { id: id.to_string() })
}

pub fn delete_item(conn: &Connection, id: &str) -> Result<()> {
    let removed = conn.execute("DELETE FROM content_items WHERE id = ?1", params![id])?;
    if removed == 0 {
        return Err(EngineError::NotFound { id: id.to_string() });
    }
    Ok(())
}

fn item_exists(conn: &Connection, id: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM content_items WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Version-guarded replace of the non-counter fields.
pub fn compare_and_replace(conn: &Connection, item: &ContentItem) -> Result<ContentItem> {
    let applied = conn.execute(
        "UPDATE content_items SET
            parent_id = ?1,
            author_id = ?2,
            group_id = ?3,
            status = ?4,
            modified_at = ?5,
            content_length = ?6,
            featured = ?7,
            tags_count = ?8,
            content_quality = ?9,
            version = version + 1
         WHERE id = ?10 AND version = ?11",
        params![
            item.parent_id,
            item.author_id,
            item.group_id,
            item.status.as_str(),
            format_timestamp(&item.modified_at),
            item.content_length,
            item.featured,
            item.tags_count,
            item.content_quality,
            item.id,
            item.version,
        ],
    )?;

    if applied == 0 {
        return if item_exists(conn, &item.id)? {
            Err(EngineError::Conflict { id: item.id.clone() })
        } else {
            Err(EngineError::NotFound { id: item.id.clone() })
        };
    }
    get_item(conn, &item.id)
}

// --- Atomic counters ---
//
// A positive delta that would push a counter past i64::MAX matches no row,
// so nothing is written. SQLite would otherwise turn the overflowing sum
// into a REAL and store it.

/// Zero rows updated: the item is missing, or the guard refused the delta.
fn refused(conn: &Connection, id: &str, what: impl FnOnce() -> String) -> Result<EngineError> {
    if item_exists(conn, id)? {
        Ok(EngineError::invalid(what()))
    } else {
        Ok(EngineError::NotFound { id: id.to_string() })
    }
}

pub fn increment_counter(conn: &Connection, id: &str, counter: Counter, delta: i64) -> Result<i64> {
    let column = counter.column();
    let sql = format!(
        "UPDATE content_items SET {column} = MAX(0, IFNULL({column}, 0) + ?1)
         WHERE id = ?2 AND IFNULL({column}, 0) <= 9223372036854775807 - MAX(?1, 0)
         RETURNING {column}"
    );
    match conn.query_row(&sql, params![delta, id], |row| row.get(0)).optional()? {
        Some(value) => Ok(value),
        None => Err(refused(conn, id, || {
            format!("adding {delta} to {counter} of {id} would overflow")
        })?),
    }
}

pub fn increment_vote(conn: &Connection, id: &str, vote: VoteKind, delta: i64) -> Result<(i64, i64)> {
    let side = vote.counter().column();
    // MAX(delta, -side) caps a decrement at what the side counter holds, and
    // both columns move by that same effective amount.
    let sql = format!(
        "UPDATE content_items SET
            votes_count = MAX(0, votes_count + MAX(?1, -{side})),
            {side} = {side} + MAX(?1, -{side})
         WHERE id = ?2
           AND votes_count <= 9223372036854775807 - MAX(?1, 0)
           AND {side} <= 9223372036854775807 - MAX(?1, 0)
         RETURNING votes_count, {side}"
    );
    match conn
        .query_row(&sql, params![delta, id], |row| Ok((row.get(0)?, row.get(1)?)))
        .optional()?
    {
        Some(pair) => Ok(pair),
        None => Err(refused(conn, id, || {
            format!("adding {delta} {vote:?} votes to {id} would overflow")
        })?),
    }
}

pub fn add_rating(conn: &Connection, id: &str, value: f64) -> Result<(i64, f64)> {
    let updated = conn
        .query_row(
            "UPDATE content_items SET
                ratings_average_value = (ratings_average_value * ratings_count + ?1) / (ratings_count + 1),
                ratings_count = ratings_count + 1
             WHERE id = ?2 AND ratings_count < 9223372036854775807
             RETURNING ratings_count, ratings_average_value",
            params![value, id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    match updated {
        Some(pair) => Ok(pair),
        None => Err(refused(conn, id, || format!("rating count of {id} would overflow"))?),
    }
}

// --- Queries ---

pub fn filter_sort_paginate(conn: &Connection, query: &PageQuery) -> Result<Vec<ContentItem>> {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    push_filter(&query.filter, &mut clauses, &mut values);

    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM content_items WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
        clauses.join(" AND "),
        super::order_clause(query),
    );
    values.push(Value::Integer(i64::from(query.limit)));
    values.push(Value::Integer(i64::from(query.skip)));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), row_to_item)?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

pub fn count_grouped_by(
    conn: &Connection,
    key: GroupKey,
    keys: Option<&[String]>,
    filter: &ContentFilter,
) -> Result<HashMap<String, i64>> {
    let mut counts = HashMap::new();
    match keys {
        Some(keys) => {
            for chunk in keys.chunks(KEY_CHUNK_SIZE) {
                count_grouped_chunk(conn, key, Some(chunk), filter, &mut counts)?;
            }
        }
        None => count_grouped_chunk(conn, key, None, filter, &mut counts)?,
    }
    Ok(counts)
}

fn count_grouped_chunk(
    conn: &Connection,
    key: GroupKey,
    keys: Option<&[String]>,
    filter: &ContentFilter,
    counts: &mut HashMap<String, i64>,
) -> Result<()> {
    let column = key.column();
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    push_filter(filter, &mut clauses, &mut values);
    clauses.push(format!("{column} IS NOT NULL"));

    if let Some(keys) = keys {
        if keys.is_empty() {
            return Ok(());
        }
        let placeholders = vec!["?"; keys.len()].join(", ");
        clauses.push(format!("{column} IN ({placeholders})"));
        values.extend(keys.iter().cloned().map(Value::Text));
    }

    let sql = format!(
        "SELECT {column}, COUNT(*) FROM content_items WHERE {} GROUP BY {column}",
        clauses.join(" AND ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (k, n) = row?;
        *counts.entry(k).or_insert(0) += n;
    }
    Ok(())
}

// --- Operational ---

pub fn count_by_kind(conn: &Connection) -> Result<Vec<(ContentKind, i64)>> {
    let mut stmt =
        conn.prepare("SELECT kind, COUNT(*) FROM content_items GROUP BY kind ORDER BY kind")?;
    let rows = stmt.query_map([], |row| Ok((parsed_column::<ContentKind>(row, 0)?, row.get(1)?)))?;

    let mut counts = Vec::new();
    for row in rows {
        counts.push(row?);
    }
    Ok(counts)
}

pub fn count_inconsistent_votes(conn: &Connection) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM content_items WHERE yes_votes_count + no_votes_count != votes_count",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn get_engine_state(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM engine_state WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn set_engine_state(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO engine_state (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}
