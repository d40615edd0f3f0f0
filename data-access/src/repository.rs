//! Repository implementations for data access

use bookmark_manager_core::*;
use tokio_rusqlite::Connection;
use std::collections::HashSet;
use std::sync::Arc;
use async_trait::async_trait;
use rusqlite::{OptionalExtension, Row};
use tracing::debug;

/// Repository trait for bookmarks
///
/// Uniqueness of `url` is enforced here: creating a second bookmark for the
/// same URL fails with [`StorageError::DuplicateUrl`].
#[async_trait]
pub trait BookmarkRepository: Send + Sync {
    async fn create(&self, bookmark: &NewBookmark) -> Result<Bookmark>;
    async fn get_by_id(&self, id: BookmarkId) -> Result<Option<Bookmark>>;
    async fn get_by_url(&self, url: &str) -> Result<Option<Bookmark>>;
    async fn get_all(&self) -> Result<Vec<Bookmark>>;
    /// Case-insensitive substring match across title, description and url
    async fn search(&self, query: &str) -> Result<Vec<Bookmark>>;
    async fn update(&self, id: BookmarkId, update: &BookmarkUpdate) -> Result<Bookmark>;
    async fn record_click(&self, id: BookmarkId) -> Result<Bookmark>;
    /// Removes the row and returns it as it was before deletion
    async fn delete(&self, id: BookmarkId) -> Result<Bookmark>;
    async fn count(&self) -> Result<usize>;
}

const COLUMNS: &str = "id, url, title, description, webicon, icon_candidates, extra_metadata, \
                       tags, is_favorite, click_count, created_at, updated_at, last_used, \
                       full_text_content, content_fetched_at";

fn to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
}

/// Trim, drop blanks and duplicates; first occurrence wins
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}

/// Helper function to map a row to Bookmark
fn row_to_bookmark(row: &Row) -> rusqlite::Result<Bookmark> {
    let id: i64 = row.get(0)?;
    let url: String = row.get(1)?;
    let title: Option<String> = row.get(2)?;
    let description: Option<String> = row.get(3)?;
    let webicon: String = row.get(4)?;
    let icon_candidates_json: String = row.get(5)?;
    let extra_metadata_json: Option<String> = row.get(6)?;
    let tags_json: String = row.get(7)?;
    let is_favorite: bool = row.get(8)?;
    let click_count: u32 = row.get(9)?;
    let created_at: i64 = row.get(10)?;
    let updated_at: i64 = row.get(11)?;
    let last_used: Option<i64> = row.get(12)?;
    let full_text_content: Option<String> = row.get(13)?;
    let content_fetched_at: Option<i64> = row.get(14)?;

    Ok(Bookmark {
        id: BookmarkId(id),
        url,
        title,
        description,
        webicon: if webicon.is_empty() { DEFAULT_FAVICON.to_string() } else { webicon },
        icon_candidates: serde_json::from_str(&icon_candidates_json).unwrap_or_default(),
        extra_metadata: extra_metadata_json.and_then(|s| serde_json::from_str(&s).ok()),
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        is_favorite,
        click_count,
        created_at: from_millis(created_at),
        updated_at: from_millis(updated_at),
        last_used: last_used.map(from_millis),
        full_text_content,
        content_fetched_at: content_fetched_at.map(from_millis),
    })
}

fn select_by_id(conn: &rusqlite::Connection, id: i64) -> rusqlite::Result<Option<Bookmark>> {
    conn.query_row(
        &format!("SELECT {} FROM bookmarks WHERE id = ?1", COLUMNS),
        [id],
        row_to_bookmark,
    )
    .optional()
}

fn is_unique_violation(e: &tokio_rusqlite::Error) -> bool {
    matches!(
        e,
        tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn database_error(action: &str, e: tokio_rusqlite::Error) -> BookmarkManagerError {
    BookmarkManagerError::Storage {
        source: StorageError::Database {
            details: format!("Failed to {}: {}", action, e),
        },
    }
}

/// Escape LIKE wildcards so user queries match literally
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// SQLite implementation of BookmarkRepository
pub struct SqliteBookmarkRepository {
    connection: Arc<Connection>,
}

impl SqliteBookmarkRepository {
    pub fn new(connection: Arc<Connection>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl BookmarkRepository for SqliteBookmarkRepository {
    async fn create(&self, bookmark: &NewBookmark) -> Result<Bookmark> {
        let new = bookmark.clone();
        let url = new.url.clone();

        self.connection
            .call(move |conn| {
                let now = to_millis(&Utc::now());
                let webicon = new
                    .webicon
                    .filter(|w| !w.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_FAVICON.to_string());
                let icon_candidates_json = serde_json::to_string(&new.icon_candidates).unwrap_or_else(|_| "[]".to_string());
                let extra_metadata_json = new
                    .extra_metadata
                    .as_ref()
                    .and_then(|m| serde_json::to_string(m).ok());
                let tags_json = serde_json::to_string(&normalize_tags(&new.tags)).unwrap_or_else(|_| "[]".to_string());

                conn.execute(
                    r#"
                    INSERT INTO bookmarks
                    (url, title, description, webicon, icon_candidates, extra_metadata, tags,
                     is_favorite, click_count, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?9)
                    "#,
                    rusqlite::params![
                        new.url,
                        new.title,
                        new.description,
                        webicon,
                        icon_candidates_json,
                        extra_metadata_json,
                        tags_json,
                        new.is_favorite,
                        now,
                    ],
                )?;

                let id = conn.last_insert_rowid();
                select_by_id(conn, id)?.ok_or(tokio_rusqlite::Error::Rusqlite(
                    rusqlite::Error::QueryReturnedNoRows,
                ))
            })
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StorageError::DuplicateUrl { url }.into()
                } else {
                    database_error("create bookmark", e)
                }
            })
    }

    async fn get_by_id(&self, id: BookmarkId) -> Result<Option<Bookmark>> {
        self.connection
            .call(move |conn| Ok(select_by_id(conn, id.0)?))
            .await
            .map_err(|e| database_error("get bookmark", e))
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<Bookmark>> {
        let url_str = url.to_string();

        self.connection
            .call(move |conn| {
                let bookmark = conn
                    .query_row(
                        &format!("SELECT {} FROM bookmarks WHERE url = ?1 LIMIT 1", COLUMNS),
                        [&url_str],
                        row_to_bookmark,
                    )
                    .optional()?;
                Ok(bookmark)
            })
            .await
            .map_err(|e| database_error("get bookmark by url", e))
    }

    async fn get_all(&self) -> Result<Vec<Bookmark>> {
        self.connection
            .call(|conn| {
                let mut stmt = conn.prepare(&format!("SELECT {} FROM bookmarks ORDER BY id", COLUMNS))?;
                let bookmarks = stmt
                    .query_map([], row_to_bookmark)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(bookmarks)
            })
            .await
            .map_err(|e| database_error("list bookmarks", e))
    }

    async fn search(&self, query: &str) -> Result<Vec<Bookmark>> {
        let pattern = like_pattern(query.trim());

        self.connection
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM bookmarks \
                     WHERE title LIKE ?1 ESCAPE '\\' \
                        OR description LIKE ?1 ESCAPE '\\' \
                        OR url LIKE ?1 ESCAPE '\\' \
                     ORDER BY id",
                    COLUMNS
                ))?;
                let bookmarks = stmt
                    .query_map([&pattern], row_to_bookmark)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(bookmarks)
            })
            .await
            .map_err(|e| database_error("search bookmarks", e))
    }

    async fn update(&self, id: BookmarkId, update: &BookmarkUpdate) -> Result<Bookmark> {
        let patch = update.clone();

        let updated = self
            .connection
            .call(move |conn| {
                let Some(mut bookmark) = select_by_id(conn, id.0)? else {
                    return Ok(None);
                };

                if let Some(title) = patch.title {
                    bookmark.title = Some(title);
                }
                if let Some(description) = patch.description {
                    bookmark.description = Some(description);
                }
                if let Some(tags) = patch.tags {
                    bookmark.tags = normalize_tags(&tags);
                }
                if let Some(is_favorite) = patch.is_favorite {
                    bookmark.is_favorite = is_favorite;
                }
                if let Some(webicon) = patch.webicon.filter(|w| !w.trim().is_empty()) {
                    bookmark.webicon = webicon;
                }
                if let Some(candidates) = patch.icon_candidates {
                    bookmark.icon_candidates = candidates;
                }
                if let Some(extra) = patch.extra_metadata {
                    bookmark.extra_metadata = Some(extra);
                }
                bookmark.updated_at = Utc::now();

                conn.execute(
                    r#"
                    UPDATE bookmarks
                    SET title = ?2, description = ?3, webicon = ?4, icon_candidates = ?5,
                        extra_metadata = ?6, tags = ?7, is_favorite = ?8, updated_at = ?9
                    WHERE id = ?1
                    "#,
                    rusqlite::params![
                        bookmark.id.0,
                        bookmark.title,
                        bookmark.description,
                        bookmark.webicon,
                        serde_json::to_string(&bookmark.icon_candidates).unwrap_or_else(|_| "[]".to_string()),
                        bookmark.extra_metadata.as_ref().and_then(|m| serde_json::to_string(m).ok()),
                        serde_json::to_string(&bookmark.tags).unwrap_or_else(|_| "[]".to_string()),
                        bookmark.is_favorite,
                        to_millis(&bookmark.updated_at),
                    ],
                )?;

                Ok(select_by_id(conn, id.0)?)
            })
            .await
            .map_err(|e| database_error("update bookmark", e))?;

        debug!("Updated bookmark {}", id);
        updated.ok_or_else(|| StorageError::NotFound { id }.into())
    }

    async fn record_click(&self, id: BookmarkId) -> Result<Bookmark> {
        let updated = self
            .connection
            .call(move |conn| {
                let now = to_millis(&Utc::now());
                conn.execute(
                    "UPDATE bookmarks SET click_count = click_count + 1, last_used = ?2, updated_at = ?2 WHERE id = ?1",
                    rusqlite::params![id.0, now],
                )?;
                Ok(select_by_id(conn, id.0)?)
            })
            .await
            .map_err(|e| database_error("record click", e))?;

        updated.ok_or_else(|| StorageError::NotFound { id }.into())
    }

    async fn delete(&self, id: BookmarkId) -> Result<Bookmark> {
        let deleted = self
            .connection
            .call(move |conn| {
                let tx = conn.transaction()?;
                let existing = select_by_id(&tx, id.0)?;
                if existing.is_some() {
                    tx.execute("DELETE FROM bookmarks WHERE id = ?1", [id.0])?;
                }
                tx.commit()?;
                Ok(existing)
            })
            .await
            .map_err(|e| database_error("delete bookmark", e))?;

        deleted.ok_or_else(|| StorageError::NotFound { id }.into())
    }

    async fn count(&self) -> Result<usize> {
        self.connection
            .call(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM bookmarks", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(|e| database_error("count bookmarks", e))
    }
}
