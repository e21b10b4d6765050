//! SQLite persistence for items and posts.
//!
//! The store is the only shared mutable resource in the system. Writes go
//! through a single connection behind a mutex, which serializes them per
//! process; items are independent aggregates, so no cross-item transactions
//! are needed.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::domain::{Item, ItemStatus, Platform, Post, PostStatus};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS items (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id      TEXT NOT NULL UNIQUE,
    title          TEXT NOT NULL,
    url            TEXT NOT NULL,
    description    TEXT,
    thumbnail_url  TEXT,
    published_at   TEXT NOT NULL,
    transcript     TEXT,
    status         TEXT NOT NULL,
    failure_reason TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_items_status ON items(status);
CREATE INDEX IF NOT EXISTS idx_items_source_id ON items(source_id);

CREATE TABLE IF NOT EXISTS posts (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id       INTEGER NOT NULL REFERENCES items(id),
    platform      TEXT NOT NULL,
    content       TEXT NOT NULL,
    status        TEXT NOT NULL,
    published_url TEXT,
    published_at  TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_posts_item_id ON posts(item_id);
"#;

/// Durable record of items and posts
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::with_connection(conn)
    }

    /// In-memory database, used by tests
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to create database schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ---- items ----

    /// Insert a new item, or return the existing row when the `source_id`
    /// is already known. Ingestion stays idempotent under re-polls.
    pub fn upsert_item(&self, item: &Item) -> Result<Item> {
        let conn = self.conn.lock().unwrap();

        if let Some(existing) = Self::query_item_by_source_id(&conn, &item.source_id)? {
            return Ok(existing);
        }

        conn.execute(
            "INSERT INTO items (source_id, title, url, description, thumbnail_url,
                                published_at, transcript, status, failure_reason,
                                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                item.source_id,
                item.title,
                item.url,
                item.description,
                item.thumbnail_url,
                item.published_at,
                item.transcript,
                item.status.as_str(),
                item.failure_reason,
                item.created_at,
                item.updated_at,
            ],
        )?;

        let id = conn.last_insert_rowid();
        let mut stored = item.clone();
        stored.id = id;
        Ok(stored)
    }

    pub fn get_item(&self, id: i64) -> Result<Option<Item>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM items WHERE id = ?1",
            params![id],
            Self::item_from_row,
        )
        .optional()
        .context("Failed to load item")
    }

    pub fn get_item_by_source_id(&self, source_id: &str) -> Result<Option<Item>> {
        let conn = self.conn.lock().unwrap();
        Self::query_item_by_source_id(&conn, source_id)
    }

    fn query_item_by_source_id(conn: &Connection, source_id: &str) -> Result<Option<Item>> {
        conn.query_row(
            "SELECT * FROM items WHERE source_id = ?1",
            params![source_id],
            Self::item_from_row,
        )
        .optional()
        .context("Failed to load item by source id")
    }

    pub fn list_items_by_status(&self, status: ItemStatus) -> Result<Vec<Item>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT * FROM items WHERE status = ?1 ORDER BY published_at ASC")?;
        let items = stmt
            .query_map(params![status.as_str()], Self::item_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Persist a status change, optionally with a failure/rejection reason
    pub fn update_item_status(
        &self,
        item_id: i64,
        status: ItemStatus,
        reason: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE items SET status = ?1, failure_reason = ?2, updated_at = ?3 WHERE id = ?4",
            params![status.as_str(), reason, Utc::now(), item_id],
        )?;
        anyhow::ensure!(changed == 1, "Item {} not found", item_id);
        Ok(())
    }

    pub fn set_transcript(&self, item_id: i64, transcript: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE items SET transcript = ?1, updated_at = ?2 WHERE id = ?3",
            params![transcript, Utc::now(), item_id],
        )?;
        anyhow::ensure!(changed == 1, "Item {} not found", item_id);
        Ok(())
    }

    // ---- posts ----

    pub fn insert_post(&self, post: &Post) -> Result<Post> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO posts (item_id, platform, content, status, published_url,
                                published_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                post.item_id,
                post.platform.as_str(),
                post.content,
                post.status.as_str(),
                post.published_url,
                post.published_at,
                post.created_at,
                post.updated_at,
            ],
        )?;

        let id = conn.last_insert_rowid();
        let mut stored = post.clone();
        stored.id = id;
        Ok(stored)
    }

    pub fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM posts WHERE id = ?1",
            params![id],
            Self::post_from_row,
        )
        .optional()
        .context("Failed to load post")
    }

    pub fn get_posts_for_item(&self, item_id: i64) -> Result<Vec<Post>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT * FROM posts WHERE item_id = ?1 ORDER BY id ASC")?;
        let posts = stmt
            .query_map(params![item_id], Self::post_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    pub fn update_post_status(&self, post_id: i64, status: PostStatus) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE posts SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), Utc::now(), post_id],
        )?;
        anyhow::ensure!(changed == 1, "Post {} not found", post_id);
        Ok(())
    }

    pub fn update_post_content(&self, post_id: i64, content: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE posts SET content = ?1, updated_at = ?2 WHERE id = ?3",
            params![content, Utc::now(), post_id],
        )?;
        anyhow::ensure!(changed == 1, "Post {} not found", post_id);
        Ok(())
    }

    /// Mark a post published with its public URL.
    ///
    /// Idempotent: a post that is already Published keeps its original URL
    /// and timestamp, so a retried publish cannot double-record.
    pub fn mark_post_published(&self, post_id: i64, published_url: &str) -> Result<Post> {
        let conn = self.conn.lock().unwrap();

        let existing = conn
            .query_row(
                "SELECT * FROM posts WHERE id = ?1",
                params![post_id],
                Self::post_from_row,
            )
            .optional()?
            .with_context(|| format!("Post {} not found", post_id))?;

        if existing.status == PostStatus::Published {
            return Ok(existing);
        }

        let now = Utc::now();
        conn.execute(
            "UPDATE posts SET status = ?1, published_url = ?2, published_at = ?3,
                              updated_at = ?3 WHERE id = ?4",
            params![
                PostStatus::Published.as_str(),
                published_url,
                now,
                post_id
            ],
        )?;

        let mut updated = existing;
        updated.status = PostStatus::Published;
        updated.published_url = Some(published_url.to_string());
        updated.published_at = Some(now);
        updated.updated_at = now;
        Ok(updated)
    }

    // ---- reporting and retention ----

    /// Item counts per status
    pub fn statistics(&self) -> Result<HashMap<String, i64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM items GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (status, count) = row?;
            counts.insert(status, count);
        }
        Ok(counts)
    }

    /// Retention cleanup: delete items (and their posts) published before
    /// the cutoff. Returns the number of items removed.
    pub fn delete_items_older_than(&self, days: i64) -> Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "DELETE FROM posts WHERE item_id IN
                 (SELECT id FROM items WHERE published_at < ?1)",
            params![cutoff],
        )?;
        let deleted = conn.execute(
            "DELETE FROM items WHERE published_at < ?1",
            params![cutoff],
        )?;
        Ok(deleted)
    }

    // ---- row mapping ----

    fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
        let status: String = row.get("status")?;
        Ok(Item {
            id: row.get("id")?,
            source_id: row.get("source_id")?,
            title: row.get("title")?,
            url: row.get("url")?,
            description: row.get("description")?,
            thumbnail_url: row.get("thumbnail_url")?,
            published_at: row.get("published_at")?,
            transcript: row.get("transcript")?,
            status: ItemStatus::parse(&status).unwrap_or(ItemStatus::Failed),
            failure_reason: row.get("failure_reason")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
        let platform: String = row.get("platform")?;
        let status: String = row.get("status")?;
        Ok(Post {
            id: row.get("id")?,
            item_id: row.get("item_id")?,
            platform: Platform::parse(&platform).unwrap_or(Platform::Threads),
            content: row.get("content")?,
            status: PostStatus::parse(&status).unwrap_or(PostStatus::Failed),
            published_url: row.get("published_url")?,
            published_at: row.get("published_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_item(source_id: &str) -> Item {
        Item::new(
            source_id.to_string(),
            format!("Video {}", source_id),
            format!("https://youtube.com/watch?v={}", source_id),
            Utc::now(),
        )
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let item = test_item("abc123");

        let first = store.upsert_item(&item).unwrap();
        let second = store.upsert_item(&item).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.list_items_by_status(ItemStatus::New).unwrap().len(), 1);
    }

    #[test]
    fn test_status_update_and_listing() {
        let store = Store::open_in_memory().unwrap();
        let item = store.upsert_item(&test_item("abc")).unwrap();

        store
            .update_item_status(item.id, ItemStatus::Transcribed, None)
            .unwrap();

        assert!(store.list_items_by_status(ItemStatus::New).unwrap().is_empty());
        let transcribed = store.list_items_by_status(ItemStatus::Transcribed).unwrap();
        assert_eq!(transcribed.len(), 1);
        assert_eq!(transcribed[0].source_id, "abc");
    }

    #[test]
    fn test_transcript_round_trip() {
        let store = Store::open_in_memory().unwrap();
        let item = store.upsert_item(&test_item("abc")).unwrap();

        store.set_transcript(item.id, "the transcript text").unwrap();
        let loaded = store.get_item(item.id).unwrap().unwrap();
        assert_eq!(loaded.transcript.as_deref(), Some("the transcript text"));
    }

    #[test]
    fn test_mark_post_published_once() {
        let store = Store::open_in_memory().unwrap();
        let item = store.upsert_item(&test_item("abc")).unwrap();
        let post = store
            .insert_post(&Post::draft(item.id, Platform::Threads, "body".to_string()))
            .unwrap();

        let published = store
            .mark_post_published(post.id, "https://threads.net/p/1")
            .unwrap();
        assert_eq!(published.status, PostStatus::Published);
        assert!(published.invariant_holds());

        // Second call keeps the original URL
        let again = store
            .mark_post_published(post.id, "https://threads.net/p/OTHER")
            .unwrap();
        assert_eq!(
            again.published_url.as_deref(),
            Some("https://threads.net/p/1")
        );
        assert_eq!(again.published_at, published.published_at);
    }

    #[test]
    fn test_statistics() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_item(&test_item("a")).unwrap();
        store.upsert_item(&test_item("b")).unwrap();
        let c = store.upsert_item(&test_item("c")).unwrap();
        store
            .update_item_status(c.id, ItemStatus::Failed, Some("boom"))
            .unwrap();

        let stats = store.statistics().unwrap();
        assert_eq!(stats.get("new"), Some(&2));
        assert_eq!(stats.get("failed"), Some(&1));
    }

    #[test]
    fn test_retention_cleanup() {
        let store = Store::open_in_memory().unwrap();

        let mut old = test_item("old");
        old.published_at = Utc::now() - chrono::Duration::days(90);
        let old = store.upsert_item(&old).unwrap();
        store
            .insert_post(&Post::draft(old.id, Platform::Threads, "x".to_string()))
            .unwrap();

        store.upsert_item(&test_item("fresh")).unwrap();

        let removed = store.delete_items_older_than(30).unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_item_by_source_id("old").unwrap().is_none());
        assert!(store.get_item_by_source_id("fresh").unwrap().is_some());
    }
}
