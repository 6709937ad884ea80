// Database schema: table creation.
//
// A `schema_version` table records the applied schema version so later
// migrations can be layered on top of version 1.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// This is idempotent: safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Tracks schema version for future migrations
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Posts, comments and replies with their engagement counters.
        -- Counters are only ever changed by single-statement increments.
        CREATE TABLE IF NOT EXISTS content_items (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,                     -- post / comment / reply
            parent_id TEXT,                         -- e.g. a comment's post
            author_id TEXT NOT NULL,
            group_id TEXT,                          -- nullable, most content has none
            status TEXT NOT NULL DEFAULT 'published',
            created_at TEXT NOT NULL,               -- RFC 3339, fixed width
            modified_at TEXT NOT NULL,
            content_length INTEGER NOT NULL DEFAULT 0 CHECK (content_length >= 0),
            featured INTEGER NOT NULL DEFAULT 0,
            tags_count INTEGER NOT NULL DEFAULT 0 CHECK (tags_count >= 0),
            views_count INTEGER NOT NULL DEFAULT 0 CHECK (views_count >= 0),
            likes_count INTEGER NOT NULL DEFAULT 0 CHECK (likes_count >= 0),
            comments_count INTEGER NOT NULL DEFAULT 0 CHECK (comments_count >= 0),
            bookmarks_count INTEGER NOT NULL DEFAULT 0 CHECK (bookmarks_count >= 0),
            shares_count INTEGER NOT NULL DEFAULT 0 CHECK (shares_count >= 0),
            ratings_count INTEGER NOT NULL DEFAULT 0 CHECK (ratings_count >= 0),
            ratings_average_value REAL NOT NULL DEFAULT 0,
            abuse_reports_count INTEGER NOT NULL DEFAULT 0 CHECK (abuse_reports_count >= 0),
            votes_count INTEGER NOT NULL DEFAULT 0 CHECK (votes_count >= 0),
            yes_votes_count INTEGER NOT NULL DEFAULT 0 CHECK (yes_votes_count >= 0),
            no_votes_count INTEGER NOT NULL DEFAULT 0 CHECK (no_votes_count >= 0),
            content_quality REAL NOT NULL DEFAULT 0,  -- cached, re-derivable
            version INTEGER NOT NULL DEFAULT 0        -- compare-and-replace guard
        );

        -- Engine state: last recompute timestamps per content kind
        CREATE TABLE IF NOT EXISTS engine_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Ranking: most queries filter by kind and sort by quality
        CREATE INDEX IF NOT EXISTS idx_items_kind_quality
            ON content_items(kind, content_quality DESC, created_at DESC, id);

        -- Batched counts by parent and by author
        CREATE INDEX IF NOT EXISTS idx_items_parent
            ON content_items(kind, parent_id);

        CREATE INDEX IF NOT EXISTS idx_items_author
            ON content_items(kind, author_id);

        CREATE INDEX IF NOT EXISTS idx_items_group
            ON content_items(kind, group_id);
        ",
    )
    .context("Failed to create database tables")?;

    // Record initial schema version if not already set
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
    }

    #[test]
    fn test_table_count() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        // schema_version, content_items, engine_state
        assert_eq!(table_count(&conn).unwrap(), 3i64);
    }

    #[test]
    fn test_group_column_present() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();

        conn.execute(
            "INSERT INTO content_items (id, kind, author_id, created_at, modified_at, group_id)
             VALUES ('p1', 'post', 'u1', '2024-01-01T00:00:00.000000Z',
                     '2024-01-01T00:00:00.000000Z', 'g1')",
            [],
        )
        .unwrap();

        let group: String = conn
            .query_row("SELECT group_id FROM content_items WHERE id = 'p1'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(group, "g1");
    }

    #[test]
    fn test_counter_columns_reject_negative_values() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO content_items (id, kind, author_id, created_at, modified_at, views_count)
             VALUES ('p1', 'post', 'u1', 'x', 'x', -1)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_item_fields_reject_negative_values() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        for column in ["content_length", "tags_count"] {
            let result = conn.execute(
                &format!(
                    "INSERT INTO content_items (id, kind, author_id, created_at, modified_at, {column})
                     VALUES ('p1', 'post', 'u1', 'x', 'x', -5)"
                ),
                [],
            );
            assert!(result.is_err(), "{column} accepted a negative value");
        }
    }

    #[test]
    fn test_schema_version_recorded_once() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();

        let versions: Vec<i64> = conn
            .prepare("SELECT version FROM schema_version ORDER BY version")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(versions, vec![1]);
    }
}
