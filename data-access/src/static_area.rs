//! On-disk static area
//!
//! Owns the directory tree that the route layer serves under `/static`:
//!
//! ```text
//! <root>/favicon.ico
//! <root>/icons/<domain>/<kind><ext>
//! <root>/icons/manual/manual_<id><ext>
//! <root>/recycled_icons/<domain>/...
//! <root>/recycled_bookmarks/<id>_<domain>_<timestamp>.json
//! ```
//!
//! Every path handed out is web-relative (`/static/...`) and every path taken
//! back in is checked to resolve inside the root.

use bookmark_manager_core::*;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// URL prefix under which the static root is served
pub const STATIC_WEB_PREFIX: &str = "/static";

const ICONS_DIR: &str = "icons";
const RECYCLED_ICONS_DIR: &str = "recycled_icons";
const RECYCLED_BOOKMARKS_DIR: &str = "recycled_bookmarks";
const MANUAL_DIR: &str = "manual";
const FAVICON_FILE: &str = "favicon.ico";
const DEFAULT_FAVICON_SIZE: u32 = 64;

const MANUAL_ICON_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "ico", "svg", "webp", "bmp"];

/// Handle on the static directory tree
#[derive(Debug, Clone)]
pub struct StaticArea {
    root: PathBuf,
}

impl StaticArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the live icons of one normalized domain
    pub fn icons_dir(&self, domain_key: &str) -> PathBuf {
        self.root.join(ICONS_DIR).join(domain_key)
    }

    pub fn recycled_icons_dir(&self, domain_key: &str) -> PathBuf {
        self.root.join(RECYCLED_ICONS_DIR).join(domain_key)
    }

    pub fn recycled_bookmarks_dir(&self) -> PathBuf {
        self.root.join(RECYCLED_BOOKMARKS_DIR)
    }

    pub fn default_favicon_path(&self) -> PathBuf {
        self.root.join(FAVICON_FILE)
    }

    /// Web path for a file inside the root
    pub fn web_path(&self, path: &Path) -> Result<String> {
        let relative = path.strip_prefix(&self.root).map_err(|_| invalid_path(path.display()))?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
                _ => return Err(invalid_path(path.display())),
            }
        }
        if segments.is_empty() {
            return Err(invalid_path(path.display()));
        }

        Ok(format!("{}/{}", STATIC_WEB_PREFIX, segments.join("/")))
    }

    /// Filesystem path for a `/static/...` web path
    ///
    /// Rejects anything outside the prefix and any `..`, root or drive
    /// component, so the result always lies inside the root.
    pub fn resolve(&self, web_path: &str) -> Result<PathBuf> {
        let relative = web_path
            .strip_prefix(STATIC_WEB_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| invalid_path(web_path))?;

        let mut resolved = self.root.clone();
        let mut depth = 0;
        for segment in relative.split('/').filter(|s| !s.is_empty()) {
            match Path::new(segment).components().next() {
                Some(Component::Normal(_)) if Path::new(segment).components().count() == 1 => {
                    resolved.push(segment);
                    depth += 1;
                }
                _ => return Err(invalid_path(web_path)),
            }
        }
        if depth == 0 {
            return Err(invalid_path(web_path));
        }

        Ok(resolved)
    }

    /// True when the web path names an existing, non-empty file in the area
    pub async fn has_local_file(&self, web_path: &str) -> bool {
        let Ok(path) = self.resolve(web_path) else {
            return false;
        };
        match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.is_file() && meta.len() > 0,
            Err(_) => false,
        }
    }

    /// Move an icon from `icons/<domain>/` to `recycled_icons/<domain>/`
    ///
    /// Returns the new web path, or `None` when the path is not a live
    /// domain icon (the default favicon, a remote URL) or the file is gone.
    pub async fn recycle_icon(&self, web_path: &str) -> Result<Option<String>> {
        let Some((domain_key, file_name)) = split_icon_path(web_path) else {
            debug!("Not a domain icon, skipping recycle: {}", web_path);
            return Ok(None);
        };

        let source = self.resolve(web_path)?;
        if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
            return Ok(None);
        }

        let target_dir = self.recycled_icons_dir(&domain_key);
        tokio::fs::create_dir_all(&target_dir).await?;
        let target = target_dir.join(&file_name);
        move_file(&source, &target).await?;

        remove_dir_if_empty(&self.icons_dir(&domain_key)).await;

        let recycled = self.web_path(&target)?;
        info!("Recycled icon {} -> {}", web_path, recycled);
        Ok(Some(recycled))
    }

    /// Move every recycled icon of a domain back into `icons/<domain>/`
    ///
    /// Returns the web paths of the restored icons in file-name order. A live
    /// icon with the same name wins over the recycled one.
    pub async fn reclaim_icons(&self, domain_key: &str) -> Result<Vec<String>> {
        let recycled_dir = self.recycled_icons_dir(domain_key);
        let mut entries = match tokio::fs::read_dir(&recycled_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();

        if files.is_empty() {
            remove_dir_if_empty(&recycled_dir).await;
            return Ok(Vec::new());
        }

        let live_dir = self.icons_dir(domain_key);
        tokio::fs::create_dir_all(&live_dir).await?;

        let mut reclaimed = Vec::new();
        for source in files {
            let Some(file_name) = source.file_name() else {
                continue;
            };
            let target = live_dir.join(file_name);
            if tokio::fs::try_exists(&target).await.unwrap_or(false) {
                if let Err(e) = tokio::fs::remove_file(&source).await {
                    warn!("Failed to drop superseded recycled icon {}: {}", source.display(), e);
                }
            } else {
                move_file(&source, &target).await?;
            }
            reclaimed.push(self.web_path(&target)?);
        }

        remove_dir_if_empty(&recycled_dir).await;
        info!("Reclaimed {} recycled icon(s) for {}", reclaimed.len(), domain_key);
        Ok(reclaimed)
    }

    /// Write a JSON snapshot of a bookmark about to be deleted
    pub async fn backup_bookmark(&self, bookmark: &Bookmark) -> Result<PathBuf> {
        let dir = self.recycled_bookmarks_dir();
        tokio::fs::create_dir_all(&dir).await?;

        let domain_key = normalize_domain(&bookmark.url);
        let file_name = format!(
            "{}_{}_{}.json",
            bookmark.id,
            if domain_key.is_empty() { "unknown" } else { domain_key.as_str() },
            Utc::now().format("%Y%m%d_%H%M%S")
        );
        let path = dir.join(file_name);

        let json = serde_json::to_vec_pretty(bookmark)?;
        tokio::fs::write(&path, json).await?;

        debug!("Bookmark {} snapshot written to {}", bookmark.id, path.display());
        Ok(path)
    }

    /// Store an uploaded icon as `icons/manual/manual_<id><ext>`
    pub async fn save_manual_icon(&self, id: BookmarkId, file_name: &str, bytes: &[u8]) -> Result<String> {
        if bytes.is_empty() {
            return Err(IconError::Empty { url: file_name.to_string() }.into());
        }

        let extension = Path::new(file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .filter(|e| MANUAL_ICON_EXTENSIONS.contains(&e.as_str()))
            .unwrap_or_else(|| "png".to_string());

        let dir = self.icons_dir(MANUAL_DIR);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("manual_{}.{}", id, extension));
        tokio::fs::write(&path, bytes).await?;

        self.web_path(&path)
    }

    /// Generate the shared fallback icon if it does not exist yet
    pub async fn ensure_default_favicon(&self) -> Result<PathBuf> {
        let path = self.default_favicon_path();
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(path);
        }

        tokio::fs::create_dir_all(&self.root).await?;
        let bytes = render_default_favicon()?;
        tokio::fs::write(&path, bytes).await?;

        info!("Generated default favicon at {}", path.display());
        Ok(path)
    }
}

fn invalid_path(path: impl ToString) -> BookmarkManagerError {
    StorageError::InvalidStaticPath { path: path.to_string() }.into()
}

/// `/static/icons/<domain>/<file>` -> (`<domain>`, `<file>`)
fn split_icon_path(web_path: &str) -> Option<(String, String)> {
    let rest = web_path.strip_prefix(STATIC_WEB_PREFIX)?.strip_prefix('/')?;
    let mut parts = rest.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(ICONS_DIR), Some(domain), Some(file), None) if !domain.is_empty() && !file.is_empty() => {
            Some((domain.to_string(), file.to_string()))
        }
        _ => None,
    }
}

async fn move_file(source: &Path, target: &Path) -> std::io::Result<()> {
    if tokio::fs::rename(source, target).await.is_ok() {
        return Ok(());
    }
    // rename fails across filesystems
    tokio::fs::copy(source, target).await?;
    tokio::fs::remove_file(source).await
}

async fn remove_dir_if_empty(dir: &Path) {
    // remove_dir refuses non-empty directories, which is the check we want
    let _ = tokio::fs::remove_dir(dir).await;
}

/// Blue disc on white, ICO-encoded
fn render_default_favicon() -> Result<Vec<u8>> {
    let size = DEFAULT_FAVICON_SIZE;
    let center = (size as f32 - 1.0) / 2.0;
    let radius = size as f32 / 2.0 - 4.0;

    let image = RgbaImage::from_fn(size, size, |x, y| {
        let dx = x as f32 - center;
        let dy = y as f32 - center;
        if dx * dx + dy * dy <= radius * radius {
            Rgba([0, 123, 255, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    });

    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Ico)
        .map_err(|e| IconError::Undecodable {
            details: format!("default favicon encoding failed: {}", e),
        })?;
    Ok(bytes)
}
