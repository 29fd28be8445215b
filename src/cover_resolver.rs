//! Cover resolution: provider fallback chain, candidate scoring, batch sweep.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::db_manager::DbManager;
use crate::providers::{Candidate, CoverProvider, SearchQuery};
use crate::text_normalize;

/// Stock placeholder path, the default value for the configurable
/// `resolver.default_cover_path` sentinel.
pub const DEFAULT_COVER_PATH: &str = "/images/default-cover.png";

const TITLE_EXACT_SCORE: i32 = 60;
const TITLE_PARTIAL_SCORE: i32 = 30;
const ARTIST_EXACT_SCORE: i32 = 40;
const ARTIST_PARTIAL_SCORE: i32 = 20;
const OFFICIAL_STATUS_SCORE: i32 = 10;
const NATIVE_SCORE_DIVISOR: i64 = 5;

/// Resolution outcome persisted onto the owning record. The URL is never
/// empty; a miss carries the default placeholder path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCover {
    pub url: String,
}

/// Returns true when a persisted cover value still needs resolution. The
/// sentinel to compare against is the configured default cover path, since
/// that is the value failed resolutions were stamped with.
pub fn cover_is_missing(cover_url: Option<&str>, default_cover_path: &str) -> bool {
    match cover_url {
        None => true,
        Some(value) => {
            let trimmed = value.trim();
            trimmed.is_empty() || trimmed == default_cover_path || trimmed.contains("spacer.gif")
        }
    }
}

/// Walks providers in priority order, scores their candidates against the
/// normalized query, and accepts the first candidate clearing the threshold.
/// Sub-threshold candidates across all providers form a best-effort fallback.
pub struct CoverResolver {
    providers: Vec<Arc<dyn CoverProvider>>,
    accept_threshold: i32,
    resolve_cooldown: Duration,
    default_cover_path: String,
}

impl CoverResolver {
    /// Creates a resolver over providers already ordered by priority.
    pub fn new(providers: Vec<Arc<dyn CoverProvider>>, config: &ResolverConfig) -> Self {
        Self {
            providers,
            accept_threshold: config.accept_threshold,
            resolve_cooldown: Duration::from_millis(u64::from(config.resolve_cooldown_ms)),
            default_cover_path: config.default_cover_path.clone(),
        }
    }

    /// Sentinel path persisted when resolution misses.
    pub fn default_cover_path(&self) -> &str {
        &self.default_cover_path
    }

    /// Resolves one artist/album pair to a cover URL or the default
    /// placeholder. Provider failures are absorbed and logged. Every attempt
    /// pauses for the configured cooldown before returning, independent of
    /// per-provider pacing, to keep aggregate call volume low across a sweep.
    pub fn resolve(&self, artist_name: &str, album_title: &str) -> ResolvedCover {
        let resolved = self.resolve_uncooled(artist_name, album_title);
        if !self.resolve_cooldown.is_zero() {
            std::thread::sleep(self.resolve_cooldown);
        }
        resolved
    }

    fn resolve_uncooled(&self, artist_name: &str, album_title: &str) -> ResolvedCover {
        let primary = SearchQuery {
            artist: text_normalize::strip_for_query(artist_name),
            title: text_normalize::strip_for_query(album_title),
        };
        let ascii = SearchQuery {
            artist: text_normalize::strip_for_query(&text_normalize::fold_ascii(artist_name)),
            title: text_normalize::strip_for_query(&text_normalize::fold_ascii(album_title)),
        };
        let normalized_artist = text_normalize::normalize(artist_name);
        let normalized_title = text_normalize::normalize(album_title);

        // Sub-threshold candidates kept for the cross-provider fallback.
        let mut fallback_pool: Vec<(i32, usize, Candidate)> = Vec::new();

        for (provider_index, provider) in self.providers.iter().enumerate() {
            let candidates =
                match self.search_with_ascii_retry(provider.as_ref(), &primary, &ascii) {
                    Some(candidates) => candidates,
                    None => continue,
                };
            if candidates.is_empty() {
                debug!("No candidates from {}", provider.id());
                continue;
            }

            let mut scored: Vec<(i32, Candidate)> = candidates
                .into_iter()
                .map(|candidate| {
                    let score =
                        Self::score_candidate(&normalized_artist, &normalized_title, &candidate);
                    (score, candidate)
                })
                .collect();
            // Stable sort keeps the provider's own result order for ties.
            scored.sort_by(|left, right| right.0.cmp(&left.0));

            for (score, candidate) in scored {
                if score >= self.accept_threshold {
                    if let Some(url) = provider.resolve_image_url(&candidate) {
                        info!(
                            "Accepted cover from {} for '{}' - '{}' (score {})",
                            provider.id(),
                            artist_name,
                            album_title,
                            score
                        );
                        return ResolvedCover { url };
                    }
                    debug!(
                        "Candidate '{}' from {} cleared threshold but had no fetchable image",
                        candidate.title,
                        provider.id()
                    );
                } else {
                    fallback_pool.push((score, provider_index, candidate));
                }
            }
        }

        // No provider cleared the threshold; best-effort across everything
        // seen. Stable sort keeps provider priority order for equal scores.
        fallback_pool.sort_by(|left, right| right.0.cmp(&left.0));
        for (score, provider_index, candidate) in fallback_pool {
            if let Some(url) = self.providers[provider_index].resolve_image_url(&candidate) {
                info!(
                    "Falling back to sub-threshold cover from {} for '{}' - '{}' (score {})",
                    self.providers[provider_index].id(),
                    artist_name,
                    album_title,
                    score
                );
                return ResolvedCover { url };
            }
        }

        info!(
            "No usable cover for '{}' - '{}', using default",
            artist_name, album_title
        );
        ResolvedCover {
            url: self.default_cover_path.clone(),
        }
    }

    /// Searches with the primary query, retrying once with the ASCII variant
    /// when the primary yields nothing and the variant actually differs.
    /// Returns None when the provider failed outright.
    fn search_with_ascii_retry(
        &self,
        provider: &dyn CoverProvider,
        primary: &SearchQuery,
        ascii: &SearchQuery,
    ) -> Option<Vec<Candidate>> {
        let candidates = match provider.search(primary) {
            Ok(candidates) => candidates,
            Err(error) => {
                warn!("Provider {} failed: {error}", provider.id());
                return None;
            }
        };
        if !candidates.is_empty() || ascii == primary {
            return Some(candidates);
        }

        debug!("Retrying {} with ASCII query", provider.id());
        match provider.search(ascii) {
            Ok(candidates) => Some(candidates),
            Err(error) => {
                warn!("Provider {} failed on ASCII retry: {error}", provider.id());
                None
            }
        }
    }

    fn score_candidate(
        normalized_artist: &str,
        normalized_title: &str,
        candidate: &Candidate,
    ) -> i32 {
        let mut score = 0;

        let candidate_title = text_normalize::normalize(&candidate.title);
        if !normalized_title.is_empty() && !candidate_title.is_empty() {
            if candidate_title == normalized_title {
                score += TITLE_EXACT_SCORE;
            } else if candidate_title.contains(normalized_title)
                || normalized_title.contains(&candidate_title)
            {
                score += TITLE_PARTIAL_SCORE;
            }
        }

        let mut artist_exact = false;
        let mut artist_partial = false;
        if !normalized_artist.is_empty() {
            for name in &candidate.artist_names {
                let candidate_artist = text_normalize::normalize(name);
                if candidate_artist.is_empty() {
                    continue;
                }
                if candidate_artist == normalized_artist {
                    artist_exact = true;
                    break;
                }
                if candidate_artist.contains(normalized_artist)
                    || normalized_artist.contains(&candidate_artist)
                {
                    artist_partial = true;
                }
            }
        }
        if artist_exact {
            score += ARTIST_EXACT_SCORE;
        } else if artist_partial {
            score += ARTIST_PARTIAL_SCORE;
        }

        if candidate.official {
            score += OFFICIAL_STATUS_SCORE;
        }
        if let Some(native) = candidate.native_score {
            score += (native.clamp(0, 100) / NATIVE_SCORE_DIVISOR) as i32;
        }
        score
    }

    /// Sweeps albums whose persisted cover is missing or a placeholder,
    /// resolving each sequentially and persisting every result as it
    /// completes. Returns the number of albums updated.
    pub fn resolve_missing(&self, db: &DbManager) -> usize {
        let albums = match db.albums_missing_cover(&self.default_cover_path) {
            Ok(albums) => albums,
            Err(error) => {
                warn!("Failed to list albums missing covers: {error}");
                return 0;
            }
        };
        info!("Resolving covers for {} albums", albums.len());

        let mut updated = 0;
        for album in albums {
            // The select predicate is coarse; re-check before spending
            // network calls on a row fixed since the select.
            if !cover_is_missing(album.cover_url.as_deref(), &self.default_cover_path) {
                continue;
            }
            let resolved = self.resolve(&album.artist_name, &album.album_name);
            match db.update_album_cover(album.id, &resolved.url) {
                Ok(()) => {
                    info!(
                        "Cover for '{}' - '{}': {}",
                        album.artist_name, album.album_name, resolved.url
                    );
                    updated += 1;
                }
                Err(error) => {
                    warn!("Failed to persist cover for album {}: {error}", album.id);
                }
            }
        }
        updated
    }
}
