//! End-to-end cover pipeline: resolve, persist, cache, and serve covers.

use std::sync::Arc;

use log::{debug, warn};

use crate::cover_preloader::CoverPreloader;
use crate::cover_resolver::{cover_is_missing, CoverResolver};
use crate::db_manager::DbManager;
use crate::image_cache::{normalize_key, CoverCache};
use crate::image_pipeline::{CoverSource, FetchError};

/// Covers are immutable once resolved; clients may hold them for a week
/// before revalidating.
pub const COVER_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;

const COVER_CONTENT_TYPE: &str = "image/jpeg";

/// Transport-neutral proxy answer. The serving layer maps these onto
/// 200/304/404 plus ETag and Cache-Control headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyResponse {
    Ok {
        bytes: Vec<u8>,
        etag: String,
        content_type: &'static str,
        max_age_secs: u64,
    },
    NotModified {
        etag: String,
    },
    NotFound,
}

pub struct CoverPipeline {
    resolver: CoverResolver,
    source: Arc<dyn CoverSource>,
    cache: Arc<CoverCache>,
    preloader: CoverPreloader,
}

impl CoverPipeline {
    pub fn new(
        resolver: CoverResolver,
        source: Arc<dyn CoverSource>,
        cache: Arc<CoverCache>,
        preloader: CoverPreloader,
    ) -> Self {
        Self {
            resolver,
            source,
            cache,
            preloader,
        }
    }

    /// Resolves the cover for one album and persists the outcome. Returns the
    /// stored URL, which is the default placeholder when resolution missed,
    /// or None for an unknown album id.
    pub fn resolve_and_persist(
        &self,
        db: &DbManager,
        album_id: i64,
    ) -> Result<Option<String>, rusqlite::Error> {
        let album = match db.find_album(album_id)? {
            Some(album) => album,
            None => return Ok(None),
        };
        let resolved = self.resolver.resolve(&album.artist_name, &album.album_name);
        db.update_album_cover(album.id, &resolved.url)?;
        Ok(Some(resolved.url))
    }

    /// Sweeps every album with a missing or placeholder cover. Returns the
    /// number of albums updated.
    pub fn resolve_missing_covers(&self, db: &DbManager) -> usize {
        self.resolver.resolve_missing(db)
    }

    /// Serves processed cover bytes for a source URL. `validator` carries the
    /// client's revalidation tag when it sent one.
    pub fn serve_proxy(&self, url: &str, validator: Option<&str>) -> ProxyResponse {
        let bytes = match self.fetch_and_cache(url) {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!("Cover proxy failed for {url}: {error}");
                return ProxyResponse::NotFound;
            }
        };

        let etag = format!("\"{:x}\"", md5::compute(&bytes));
        if validator == Some(etag.as_str()) {
            return ProxyResponse::NotModified { etag };
        }
        ProxyResponse::Ok {
            bytes,
            etag,
            content_type: COVER_CONTENT_TYPE,
            max_age_secs: COVER_MAX_AGE_SECS,
        }
    }

    /// Queues a fire-and-forget cache warm for one URL.
    pub fn preload(&self, url: &str) {
        self.preloader.preload(url);
    }

    /// Queues cache warming for every album already holding a real cover.
    /// Returns the number of URLs queued.
    pub fn warm_from_catalog(&self, db: &DbManager) -> usize {
        let albums = match db.get_all_albums() {
            Ok(albums) => albums,
            Err(error) => {
                warn!("Failed to list albums for cache warming: {error}");
                return 0;
            }
        };

        let mut queued = 0;
        for album in albums {
            if cover_is_missing(album.cover_url.as_deref(), self.resolver.default_cover_path()) {
                continue;
            }
            if let Some(cover_url) = album.cover_url.as_deref() {
                self.preloader.preload(cover_url);
                queued += 1;
            }
        }
        queued
    }

    fn fetch_and_cache(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let key = normalize_key(url);
        if let Some(bytes) = self.cache.get(&key) {
            debug!("Cover cache hit for {key}");
            return Ok(bytes);
        }

        // The fetch runs outside any cache lock; a slow image host must not
        // stall other lookups.
        let bytes = self.source.fetch_processed(url)?;
        self.cache.put(key, bytes.clone());
        Ok(bytes)
    }
}
