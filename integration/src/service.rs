/// Bookmark lifecycle operations
///
/// Ties the repository, the static area, the metadata pipeline and the
/// organizer together the way a route layer would call them: create with
/// one metadata fetch, update with vocabulary growth, re-fetch on demand and
/// delete with icon recycling and a JSON snapshot.

use bookmark_manager_core::*;
use data_access::{BookmarkRepository, StaticArea};
use organizer::{Categorizer, TagSuggester};
use page_scraper::MetadataFetcher;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Bookmark service
pub struct BookmarkService {
    repository: Arc<dyn BookmarkRepository>,
    static_area: StaticArea,
    fetcher: Arc<MetadataFetcher>,
    suggester: Arc<TagSuggester>,
    categorizer: Arc<Categorizer>,
}

impl BookmarkService {
    pub fn new(
        repository: Arc<dyn BookmarkRepository>,
        static_area: StaticArea,
        fetcher: Arc<MetadataFetcher>,
        suggester: Arc<TagSuggester>,
        categorizer: Arc<Categorizer>,
    ) -> Self {
        Self {
            repository,
            static_area,
            fetcher,
            suggester,
            categorizer,
        }
    }

    pub fn repository(&self) -> &Arc<dyn BookmarkRepository> {
        &self.repository
    }

    pub fn static_area(&self) -> &StaticArea {
        &self.static_area
    }

    /// Create a bookmark
    ///
    /// Metadata is fetched once when the title or icon is missing, or when
    /// the supplied icon is a remote URL. Icons recycled from an earlier
    /// bookmark of the same domain are restored. Supplied icon candidates
    /// are kept only as local files.
    pub async fn add_bookmark(&self, new: NewBookmark) -> Result<Bookmark> {
        let mut new = new;
        new.url = new.url.trim().to_string();

        if self.repository.get_by_url(&new.url).await?.is_some() {
            return Err(StorageError::DuplicateUrl { url: new.url }.into());
        }

        let supplied = std::mem::take(&mut new.icon_candidates);
        new.icon_candidates = self.local_candidates(supplied, &new.url).await;

        let remote_icon = new.webicon.as_deref().filter(|w| is_remote(w)).map(str::to_string);
        let needs_fetch = is_blank(new.title.as_deref())
            || is_blank(new.webicon.as_deref())
            || remote_icon.is_some();

        if needs_fetch {
            let metadata = self.fetcher.fetch_metadata(&new.url).await;
            self.apply_fetched(&mut new, metadata, remote_icon.as_deref()).await;
        }

        self.restore_recycled_icons(&mut new).await;
        if is_blank(new.webicon.as_deref()) {
            new.webicon = Some(DEFAULT_FAVICON.to_string());
        }

        let bookmark = self.repository.create(&new).await?;
        info!("Created bookmark {} for {}", bookmark.id, bookmark.url);

        self.learn_tags(&bookmark.tags).await;
        Ok(bookmark)
    }

    async fn apply_fetched(&self, new: &mut NewBookmark, metadata: PageMetadata, remote_icon: Option<&str>) {
        if metadata.is_error() {
            warn!("Metadata unavailable for {}: {}", new.url, metadata.error.as_deref().unwrap_or_default());
        } else {
            if is_blank(new.title.as_deref()) && !metadata.title.trim().is_empty() {
                new.title = Some(metadata.title.clone());
            }
            if is_blank(new.description.as_deref()) && !metadata.description.trim().is_empty() {
                new.description = Some(metadata.description.clone());
            }
            if new.extra_metadata.is_none() && !metadata.extra_metadata.is_empty() {
                new.extra_metadata = Some(metadata.extra_metadata.clone());
            }
        }

        if new.icon_candidates.is_empty() {
            new.icon_candidates = metadata.icon_candidates.clone();
        }

        if let Some(remote) = remote_icon {
            // Keep the caller's choice of icon, stored locally
            new.webicon = match self.fetcher.icons().acquire_icon(remote, &new.url).await {
                Some(local) => Some(local),
                None => Some(metadata.webicon),
            };
        } else if is_blank(new.webicon.as_deref()) {
            new.webicon = Some(metadata.webicon);
        }
    }

    async fn restore_recycled_icons(&self, new: &mut NewBookmark) {
        let domain_key = normalize_domain(&new.url);
        if domain_key.is_empty() {
            return;
        }

        let reclaimed = match self.static_area.reclaim_icons(&domain_key).await {
            Ok(reclaimed) => reclaimed,
            Err(e) => {
                warn!("Could not reclaim recycled icons for {}: {}", domain_key, e);
                return;
            }
        };
        if reclaimed.is_empty() {
            return;
        }

        if new.icon_candidates.is_empty() {
            new.icon_candidates = reclaimed.clone();
        }
        let has_own_icon = new.webicon.as_deref().is_some_and(|w| !w.is_empty() && w != DEFAULT_FAVICON);
        if !has_own_icon {
            new.webicon = reclaimed.first().cloned();
        }
    }

    pub async fn list_bookmarks(&self) -> Result<Vec<Bookmark>> {
        self.repository.get_all().await
    }

    pub async fn get_bookmark(&self, id: BookmarkId) -> Result<Bookmark> {
        self.repository
            .get_by_id(id)
            .await?
            .ok_or_else(|| StorageError::NotFound { id }.into())
    }

    pub async fn search_bookmarks(&self, query: &str) -> Result<Vec<Bookmark>> {
        self.repository.search(query).await
    }

    /// Apply a partial update; new tags grow the vocabulary
    ///
    /// Remote icons are downloaded first and candidates that are not local
    /// files are dropped.
    pub async fn update_bookmark(&self, id: BookmarkId, update: BookmarkUpdate) -> Result<Bookmark> {
        let mut update = update;
        let remote_icon = update.webicon.clone().filter(|w| is_remote(w));
        if remote_icon.is_some() || update.icon_candidates.is_some() {
            let current = self.get_bookmark(id).await?;
            if let Some(remote) = remote_icon {
                update.webicon = self.fetcher.icons().acquire_icon(&remote, &current.url).await;
            }
            if let Some(candidates) = update.icon_candidates.take() {
                update.icon_candidates = Some(self.local_candidates(candidates, &current.url).await);
            }
        }

        let bookmark = self.repository.update(id, &update).await?;
        if update.tags.is_some() {
            self.learn_tags(&bookmark.tags).await;
        }
        debug!("Updated bookmark {}", id);
        Ok(bookmark)
    }

    /// Drop the memoized metadata for the bookmark's URL and fetch again
    ///
    /// A failed fetch leaves the stored record untouched. Fetched text
    /// replaces the stored text; the icon and candidates are replaced only
    /// when the page produced some.
    pub async fn refetch_metadata(&self, id: BookmarkId) -> Result<Bookmark> {
        let bookmark = self.get_bookmark(id).await?;
        self.fetcher.invalidate(&bookmark.url).await;

        let metadata = self.fetcher.fetch_metadata(&bookmark.url).await;
        if metadata.is_error() {
            warn!(
                "Re-fetch for bookmark {} failed: {}",
                id,
                metadata.error.as_deref().unwrap_or_default()
            );
            return Ok(bookmark);
        }

        // An icon-less page keeps whatever icon the bookmark already has
        let webicon = metadata.has_custom_icon().then(|| metadata.webicon.clone());
        let update = BookmarkUpdate {
            title: Some(metadata.title).filter(|t| !t.trim().is_empty()),
            description: Some(metadata.description).filter(|d| !d.trim().is_empty()),
            webicon,
            icon_candidates: Some(metadata.icon_candidates).filter(|c| !c.is_empty()),
            extra_metadata: Some(metadata.extra_metadata).filter(|m| !m.is_empty()),
            ..Default::default()
        };
        let updated = self.repository.update(id, &update).await?;
        info!("Re-fetched metadata for bookmark {}", id);
        Ok(updated)
    }

    pub async fn record_click(&self, id: BookmarkId) -> Result<Bookmark> {
        self.repository.record_click(id).await
    }

    /// Delete a bookmark, then recycle its icons and write a snapshot
    ///
    /// Icon and snapshot failures are logged; the record is gone either way.
    pub async fn delete_bookmark(&self, id: BookmarkId) -> Result<Bookmark> {
        let others = self.repository.get_all().await?;
        let deleted = self.repository.delete(id).await?;
        info!("Deleted bookmark {} ({})", id, deleted.url);

        let in_use: HashSet<&str> = others
            .iter()
            .filter(|b| b.id != id)
            .flat_map(|b| std::iter::once(b.webicon.as_str()).chain(b.icon_candidates.iter().map(String::as_str)))
            .collect();

        let mut icons: Vec<&str> = vec![deleted.webicon.as_str()];
        icons.extend(deleted.icon_candidates.iter().map(String::as_str));
        let mut seen = HashSet::new();
        for icon in icons.into_iter().filter(|i| seen.insert(*i)) {
            if in_use.contains(icon) {
                debug!("Icon {} still used by another bookmark", icon);
                continue;
            }
            if let Err(e) = self.static_area.recycle_icon(icon).await {
                warn!("Failed to recycle icon {} of bookmark {}: {}", icon, id, e);
            }
        }

        if let Err(e) = self.static_area.backup_bookmark(&deleted).await {
            warn!("Failed to back up bookmark {}: {}", id, e);
        }

        Ok(deleted)
    }

    /// Metadata for a URL, reusing a stored bookmark's local icon
    ///
    /// Falls back to the fetch pipeline; a failed fetch yields the
    /// "No title" payload with the default icon.
    pub async fn metadata_for_url(&self, url: &str) -> PageMetadata {
        match self.repository.get_by_url(url.trim()).await {
            Ok(Some(existing)) if self.static_area.has_local_file(&existing.webicon).await => {
                debug!("Reusing stored metadata for {}", url);
                return PageMetadata {
                    title: existing.title.unwrap_or_default(),
                    description: existing.description.unwrap_or_default(),
                    webicon: existing.webicon,
                    icon_candidates: existing.icon_candidates,
                    extra_metadata: existing.extra_metadata.unwrap_or_default(),
                    error: None,
                };
            }
            Ok(_) => {}
            Err(e) => warn!("Lookup of {} failed, fetching instead: {}", url, e),
        }

        let metadata = self.fetcher.fetch_metadata(url).await;
        if metadata.is_error() {
            return PageMetadata::exhausted(metadata.error.unwrap_or_default());
        }
        metadata
    }

    /// Store an uploaded icon and make it the bookmark's icon
    pub async fn upload_icon(&self, id: BookmarkId, file_name: &str, bytes: &[u8]) -> Result<Bookmark> {
        self.get_bookmark(id).await?;
        let web_path = self.static_area.save_manual_icon(id, file_name, bytes).await?;
        let update = BookmarkUpdate {
            webicon: Some(web_path),
            ..Default::default()
        };
        self.repository.update(id, &update).await
    }

    pub async fn suggest_tags(&self, title: &str, description: &str, url: &str) -> Vec<String> {
        self.suggester.suggest_tags(title, description, url).await
    }

    /// Every stored bookmark, grouped for display
    pub async fn categorize(&self) -> Result<Vec<BookmarkGroup>> {
        let bookmarks = self.repository.get_all().await?;
        Ok(self.categorizer.categorize(&bookmarks).await)
    }

    pub async fn classify_network(&self, url: &str) -> NetworkClassification {
        self.suggester.classifier().classify_network(url).await
    }

    /// Candidates reduced to existing files in the static area
    ///
    /// Remote URLs are downloaded through the icon acquirer; anything that
    /// neither downloads nor resolves to a local file is dropped.
    async fn local_candidates(&self, candidates: Vec<String>, page_url: &str) -> Vec<String> {
        let mut kept: Vec<String> = Vec::new();
        for candidate in candidates {
            let local = if is_remote(&candidate) {
                self.fetcher.icons().acquire_icon(candidate.trim(), page_url).await
            } else if self.static_area.has_local_file(&candidate).await {
                Some(candidate)
            } else {
                debug!("Dropping icon candidate {} for {}: no such local file", candidate, page_url);
                None
            };
            if let Some(path) = local.filter(|p| !kept.contains(p)) {
                kept.push(path);
            }
        }
        kept
    }

    async fn learn_tags(&self, tags: &[String]) {
        if tags.is_empty() {
            return;
        }
        match self.suggester.record_user_tags(tags).await {
            Ok(0) => {}
            Ok(added) => debug!("Vocabulary grew by {} tag(s)", added),
            Err(e) => warn!("Could not record user tags: {}", e),
        }
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

fn is_remote(webicon: &str) -> bool {
    let lower = webicon.trim().to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
