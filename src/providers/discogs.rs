//! Discogs database search provider.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use serde_json::Value;

use crate::config::HttpConfig;
use crate::providers::{http_get_json, Candidate, CoverProvider, ProviderError, SearchQuery};
use crate::rate_limit::RateGate;

const SEARCH_URL: &str = "https://api.discogs.com/database/search";

/// Discogs release search provider. Results carry inline cover image URLs;
/// entries with placeholder or non-image covers are dropped at parse time.
pub struct DiscogsProvider {
    http_client: ureq::Agent,
    user_agent: String,
    token: String,
    rate_gate: Arc<RateGate>,
    max_candidates: usize,
}

impl DiscogsProvider {
    /// Creates a new Discogs provider. The token must be non-empty; wiring
    /// disables the provider otherwise.
    pub fn new(
        http: &HttpConfig,
        token: String,
        rate_gate: Arc<RateGate>,
        max_candidates: usize,
    ) -> Self {
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_millis(u64::from(http.connect_timeout_ms)))
            .timeout_read(Duration::from_millis(u64::from(http.read_timeout_ms)))
            .timeout_write(Duration::from_millis(u64::from(http.read_timeout_ms)))
            .build();
        Self {
            http_client,
            user_agent: http.user_agent.clone(),
            token,
            rate_gate,
            max_candidates,
        }
    }

    fn search_url(&self, query: &SearchQuery) -> String {
        format!(
            "{SEARCH_URL}?artist={}&release_title={}&type=release&per_page={}&token={}",
            urlencoding::encode(&query.artist),
            urlencoding::encode(&query.title),
            self.max_candidates,
            urlencoding::encode(&self.token)
        )
    }

    // Discogs serves a transparent spacer for releases without artwork.
    fn usable_cover_image(url: &str) -> bool {
        if url.contains("spacer.gif") {
            return false;
        }
        url.ends_with(".jpg") || url.ends_with(".png")
    }

    fn parse_result(result: &Value) -> Option<Candidate> {
        let raw_title = result.get("title").and_then(Value::as_str)?;
        let cover_image = result
            .get("cover_image")
            .and_then(Value::as_str)
            .filter(|url| Self::usable_cover_image(url))?;

        // Search result titles are formatted as "Artist - Title".
        let (artist_names, title) = match raw_title.split_once(" - ") {
            Some((artist, title)) => (vec![artist.trim().to_string()], title.trim().to_string()),
            None => (Vec::new(), raw_title.trim().to_string()),
        };

        Some(Candidate {
            image_url: Some(cover_image.to_string()),
            title,
            artist_names,
            official: false,
            native_score: None,
            release_group_id: None,
            release_id: None,
        })
    }
}

impl CoverProvider for DiscogsProvider {
    fn id(&self) -> &'static str {
        "discogs"
    }

    fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, ProviderError> {
        self.rate_gate.wait_turn(self.id());
        let url = self.search_url(query);
        debug!("Discogs search: {} - {}", query.artist, query.title);
        let payload = http_get_json(&self.http_client, &url, &self.user_agent)?;

        let mut candidates = Vec::new();
        if let Some(results) = payload.get("results").and_then(Value::as_array) {
            for result in results {
                if let Some(candidate) = Self::parse_result(result) {
                    candidates.push(candidate);
                    if candidates.len() >= self.max_candidates {
                        break;
                    }
                }
            }
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::{DiscogsProvider, SearchQuery};
    use crate::config::HttpConfig;
    use crate::rate_limit::RateGate;

    fn sample_provider(token: &str) -> DiscogsProvider {
        DiscogsProvider::new(
            &HttpConfig::default(),
            token.to_string(),
            Arc::new(RateGate::new([])),
            3,
        )
    }

    #[test]
    fn test_parse_result_splits_artist_and_title() {
        let result = json!({
            "title": "Iron Maiden - Powerslave",
            "cover_image": "https://img.discogs.com/cover.jpg"
        });

        let candidate = DiscogsProvider::parse_result(&result).expect("result should parse");
        assert_eq!(candidate.title, "Powerslave");
        assert_eq!(candidate.artist_names, vec!["Iron Maiden"]);
        assert_eq!(
            candidate.image_url.as_deref(),
            Some("https://img.discogs.com/cover.jpg")
        );
        assert!(!candidate.official);
        assert_eq!(candidate.native_score, None);
    }

    #[test]
    fn test_parse_result_without_separator_keeps_full_title() {
        let result = json!({
            "title": "Untitled",
            "cover_image": "https://img.discogs.com/cover.png"
        });

        let candidate = DiscogsProvider::parse_result(&result).expect("result should parse");
        assert_eq!(candidate.title, "Untitled");
        assert!(candidate.artist_names.is_empty());
    }

    #[test]
    fn test_parse_result_rejects_spacer_placeholder() {
        let result = json!({
            "title": "Artist - Album",
            "cover_image": "https://img.discogs.com/spacer.gif"
        });
        assert!(DiscogsProvider::parse_result(&result).is_none());
    }

    #[test]
    fn test_parse_result_rejects_non_image_cover() {
        let result = json!({
            "title": "Artist - Album",
            "cover_image": "https://img.discogs.com/cover.webp"
        });
        assert!(DiscogsProvider::parse_result(&result).is_none());

        let missing = json!({"title": "Artist - Album"});
        assert!(DiscogsProvider::parse_result(&missing).is_none());
    }

    #[test]
    fn test_search_url_includes_token_and_encoded_terms() {
        let provider = sample_provider("secret token");
        let query = SearchQuery {
            artist: "Nick Cave & The Bad Seeds".to_string(),
            title: "Murder Ballads".to_string(),
        };
        let url = provider.search_url(&query);

        assert!(url.starts_with("https://api.discogs.com/database/search?artist="));
        assert!(url.contains("Nick%20Cave%20%26%20The%20Bad%20Seeds"));
        assert!(url.contains("release_title=Murder%20Ballads"));
        assert!(url.contains("type=release"));
        assert!(url.contains("per_page=3"));
        assert!(url.contains("token=secret%20token"));
    }
}
