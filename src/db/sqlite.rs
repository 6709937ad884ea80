// SqliteStore: rusqlite backend implementing the CounterStore trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// Each counter mutation is one UPDATE statement, so atomicity comes from
// SQLite itself, not from the mutex; the mutex only serializes access to the
// single connection handle.

use std::collections::HashMap;

use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{ContentFilter, ContentItem, ContentKind, Counter, GroupKey, PageQuery, VoteKind};
use super::queries;
use super::traits::CounterStore;
use crate::error::Result;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// In-memory store with the schema applied. Used by tests and dry runs.
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        super::schema::create_tables(&conn)?;
        Ok(Self::new(conn))
    }

    pub async fn table_count(&self) -> anyhow::Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }
}

#[async_trait]
impl CounterStore for SqliteStore {
    async fn create(&self, item: &ContentItem) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::insert_item(&conn, item)
    }

    async fn get(&self, id: &str) -> Result<ContentItem> {
        let conn = self.conn.lock().await;
        queries::get_item(&conn, id)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::delete_item(&conn, id)
    }

    async fn compare_and_replace(&self, item: &ContentItem) -> Result<ContentItem> {
        let conn = self.conn.lock().await;
        queries::compare_and_replace(&conn, item)
    }

    async fn atomic_increment(&self, id: &str, counter: Counter, delta: i64) -> Result<i64> {
        let conn = self.conn.lock().await;
        queries::increment_counter(&conn, id, counter, delta)
    }

    async fn increment_vote(&self, id: &str, vote: VoteKind, delta: i64) -> Result<(i64, i64)> {
        let conn = self.conn.lock().await;
        queries::increment_vote(&conn, id, vote, delta)
    }

    async fn add_rating(&self, id: &str, value: f64) -> Result<(i64, f64)> {
        let conn = self.conn.lock().await;
        queries::add_rating(&conn, id, value)
    }

    async fn filter_sort_paginate(&self, query: &PageQuery) -> Result<Vec<ContentItem>> {
        let conn = self.conn.lock().await;
        queries::filter_sort_paginate(&conn, query)
    }

    async fn count_grouped_by(
        &self,
        key: GroupKey,
        keys: Option<&[String]>,
        filter: &ContentFilter,
    ) -> Result<HashMap<String, i64>> {
        let conn = self.conn.lock().await;
        queries::count_grouped_by(&conn, key, keys, filter)
    }

    async fn count_by_kind(&self) -> Result<Vec<(ContentKind, i64)>> {
        let conn = self.conn.lock().await;
        queries::count_by_kind(&conn)
    }

    async fn count_inconsistent_votes(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        queries::count_inconsistent_votes(&conn)
    }

    async fn get_engine_state(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        queries::get_engine_state(&conn, key)
    }

    async fn set_engine_state(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::set_engine_state(&conn, key, value)
    }
}
