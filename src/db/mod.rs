// Database layer: the counter store behind the scoring engine.
//
// SQLite (rusqlite, "bundled") is the default backend; PostgreSQL is
// available behind the `postgres` feature. Both implement CounterStore.
// The database file lives wherever CURATOR_DB_PATH points
// (defaults to ./curator.db).

pub mod models;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod queries;
#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use traits::CounterStore;

use models::{OrderBy, PageQuery};

/// ORDER BY body shared by both SQL backends.
///
/// The secondary keys (`created_at` descending, then `id` ascending) keep
/// pagination stable when many items share a score, even if scores are
/// recomputed between page fetches.
pub(crate) fn order_clause(query: &PageQuery) -> String {
    let direction = if query.descending { "DESC" } else { "ASC" };
    match query.order_by {
        OrderBy::CreatedAt => format!("created_at {direction}, id ASC"),
        other => format!("{} {direction}, created_at DESC, id ASC", other.column()),
    }
}

#[cfg(feature = "sqlite")]
use anyhow::{Context, Result};
#[cfg(feature = "sqlite")]
use rusqlite::Connection;
#[cfg(feature = "sqlite")]
use std::path::Path;

/// Open (or create) the database and run migrations.
///
/// This is the main entry point: called by `curator init` and by any
/// command that needs database access.
#[cfg(feature = "sqlite")]
pub fn initialize(db_path: &str) -> Result<Connection> {
    // Create parent directories if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for database: {}", db_path))?;
        }
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    // Enable WAL mode for better concurrent read performance
    conn.pragma_update(None, "journal_mode", "WAL")?;

    schema::create_tables(&conn)?;

    Ok(conn)
}

/// Open an existing database (fails if it doesn't exist yet).
#[cfg(feature = "sqlite")]
pub fn open(db_path: &str) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        anyhow::bail!(
            "Database not found at {}. Run `curator init` first.",
            db_path
        );
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;

    // Pick up migrations added since the database was created.
    schema::create_tables(&conn)?;

    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::{ContentFilter, ContentKind, Counter};

    fn page(order_by: OrderBy, descending: bool) -> PageQuery {
        PageQuery {
            filter: ContentFilter::for_kind(ContentKind::Post),
            order_by,
            descending,
            skip: 0,
            limit: 10,
        }
    }

    #[test]
    fn test_order_clause_tie_breaks() {
        assert_eq!(
            order_clause(&page(OrderBy::Quality, true)),
            "content_quality DESC, created_at DESC, id ASC"
        );
        assert_eq!(
            order_clause(&page(OrderBy::Counter(Counter::Views), false)),
            "views_count ASC, created_at DESC, id ASC"
        );
        assert_eq!(
            order_clause(&page(OrderBy::CreatedAt, false)),
            "created_at ASC, id ASC"
        );
    }
}
