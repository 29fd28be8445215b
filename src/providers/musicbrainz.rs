//! MusicBrainz release search backed by the Cover Art Archive.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use serde_json::Value;

use crate::config::HttpConfig;
use crate::providers::{
    classify_ureq_failure, http_get_json, Candidate, CoverProvider, ProviderError, SearchQuery,
};
use crate::rate_limit::RateGate;

const SEARCH_URL: &str = "https://musicbrainz.org/ws/2/release/";
const COVER_ART_ARCHIVE_URL: &str = "https://coverartarchive.org";

enum ArchiveProbe {
    Present,
    Absent,
    Unavailable,
}

/// MusicBrainz release search provider. Candidates carry archive ids instead
/// of direct image URLs; resolution probes the Cover Art Archive.
pub struct MusicBrainzProvider {
    http_client: ureq::Agent,
    user_agent: String,
    rate_gate: Arc<RateGate>,
    max_candidates: usize,
}

impl MusicBrainzProvider {
    /// Creates a new MusicBrainz provider.
    pub fn new(http: &HttpConfig, rate_gate: Arc<RateGate>, max_candidates: usize) -> Self {
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_millis(u64::from(http.connect_timeout_ms)))
            .timeout_read(Duration::from_millis(u64::from(http.read_timeout_ms)))
            .timeout_write(Duration::from_millis(u64::from(http.read_timeout_ms)))
            .build();
        Self {
            http_client,
            user_agent: http.user_agent.clone(),
            rate_gate,
            max_candidates,
        }
    }

    fn search_url(query: &SearchQuery) -> String {
        format!(
            "{SEARCH_URL}?query=artist:{}%20AND%20release:{}&fmt=json",
            urlencoding::encode(&query.artist),
            urlencoding::encode(&query.title)
        )
    }

    fn parse_release(release: &Value) -> Option<Candidate> {
        let title = release.get("title").and_then(Value::as_str)?.to_string();

        let mut artist_names: Vec<String> = Vec::new();
        let mut seen_names = HashSet::new();
        if let Some(credits) = release.get("artist-credit").and_then(Value::as_array) {
            for credit in credits {
                let credited = credit.get("name").and_then(Value::as_str);
                let canonical = credit
                    .get("artist")
                    .and_then(|artist| artist.get("name"))
                    .and_then(Value::as_str);
                for name in [credited, canonical].into_iter().flatten() {
                    let trimmed = name.trim();
                    if !trimmed.is_empty() && seen_names.insert(trimmed.to_string()) {
                        artist_names.push(trimmed.to_string());
                    }
                }
            }
        }

        let official = release.get("status").and_then(Value::as_str) == Some("Official");
        let native_score = Self::parse_score(release.get("score"));
        let release_group_id = release
            .get("release-group")
            .and_then(|group| group.get("id"))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);
        let release_id = release
            .get("id")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);

        Some(Candidate {
            image_url: None,
            title,
            artist_names,
            official,
            native_score,
            release_group_id,
            release_id,
        })
    }

    // The search endpoint reports score as a number; older payloads use a
    // numeric string.
    fn parse_score(value: Option<&Value>) -> Option<i64> {
        let value = value?;
        value
            .as_i64()
            .or_else(|| value.as_str().and_then(|text| text.parse().ok()))
    }

    fn probe_archive(&self, url: &str) -> ArchiveProbe {
        let request = self.http_client.head(url).set("User-Agent", &self.user_agent);
        match request.call() {
            Ok(_) => ArchiveProbe::Present,
            Err(ureq::Error::Status(404, _)) => ArchiveProbe::Absent,
            Err(error) => {
                debug!(
                    "Cover Art Archive probe failed for {url}: {}",
                    classify_ureq_failure(error)
                );
                ArchiveProbe::Unavailable
            }
        }
    }
}

impl CoverProvider for MusicBrainzProvider {
    fn id(&self) -> &'static str {
        "musicbrainz"
    }

    fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, ProviderError> {
        self.rate_gate.wait_turn(self.id());
        let url = Self::search_url(query);
        debug!("MusicBrainz search: {url}");
        let payload = http_get_json(&self.http_client, &url, &self.user_agent)?;

        let mut candidates = Vec::new();
        if let Some(releases) = payload.get("releases").and_then(Value::as_array) {
            for release in releases {
                if let Some(candidate) = Self::parse_release(release) {
                    candidates.push(candidate);
                    if candidates.len() >= self.max_candidates {
                        break;
                    }
                }
            }
        }
        Ok(candidates)
    }

    /// Probes the archive at release-group level first, then release level.
    /// A 404 falls through to the next level; a network failure rejects the
    /// candidate outright.
    fn resolve_image_url(&self, candidate: &Candidate) -> Option<String> {
        let mut probe_urls = Vec::new();
        if let Some(release_group_id) = &candidate.release_group_id {
            probe_urls.push(format!(
                "{COVER_ART_ARCHIVE_URL}/release-group/{release_group_id}/front-500"
            ));
        }
        if let Some(release_id) = &candidate.release_id {
            probe_urls.push(format!(
                "{COVER_ART_ARCHIVE_URL}/release/{release_id}/front-500"
            ));
        }

        for url in probe_urls {
            match self.probe_archive(&url) {
                ArchiveProbe::Present => return Some(url),
                ArchiveProbe::Absent => continue,
                ArchiveProbe::Unavailable => return None,
            }
        }
        None
    }
}
