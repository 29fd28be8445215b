//! Spotify album search provider with client-credentials authentication.

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::debug;
use serde_json::Value;

use crate::config::HttpConfig;
use crate::providers::{
    classify_io_failure, classify_ureq_failure, Candidate, CoverProvider, ProviderError,
    SearchQuery,
};
use crate::rate_limit::RateGate;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SEARCH_URL: &str = "https://api.spotify.com/v1/search";
// Refresh ahead of the reported expiry so an in-flight search never races the
// token deadline.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Spotify album search provider. Results carry inline image URLs; the first
/// entry of `images` is the largest rendition.
pub struct SpotifyProvider {
    http_client: ureq::Agent,
    user_agent: String,
    client_id: String,
    client_secret: String,
    token_cache: Mutex<Option<CachedToken>>,
    rate_gate: Arc<RateGate>,
    max_candidates: usize,
}

impl SpotifyProvider {
    /// Creates a new Spotify provider. Both credentials must be non-empty;
    /// wiring disables the provider otherwise.
    pub fn new(
        http: &HttpConfig,
        client_id: String,
        client_secret: String,
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
            client_id,
            client_secret,
            token_cache: Mutex::new(None),
            rate_gate,
            max_candidates,
        }
    }

    fn search_url(&self, query: &SearchQuery) -> String {
        let terms = format!("album:{} artist:{}", query.title, query.artist);
        format!(
            "{SEARCH_URL}?q={}&type=album&limit={}",
            urlencoding::encode(&terms),
            self.max_candidates
        )
    }

    fn parse_token_payload(payload: &Value) -> Option<(String, Duration)> {
        let access_token = payload
            .get("access_token")
            .and_then(Value::as_str)?
            .to_string();
        let expires_in = payload
            .get("expires_in")
            .and_then(Value::as_u64)
            .unwrap_or(3_600);
        Some((access_token, Duration::from_secs(expires_in)))
    }

    fn parse_album(album: &Value) -> Option<Candidate> {
        let title = album.get("name").and_then(Value::as_str)?.to_string();
        let image_url = album
            .get("images")
            .and_then(Value::as_array)
            .and_then(|images| images.first())
            .and_then(|image| image.get("url"))
            .and_then(Value::as_str)?
            .to_string();

        let mut artist_names = Vec::new();
        if let Some(artists) = album.get("artists").and_then(Value::as_array) {
            for artist in artists {
                if let Some(name) = artist.get("name").and_then(Value::as_str) {
                    let trimmed = name.trim();
                    if !trimmed.is_empty() {
                        artist_names.push(trimmed.to_string());
                    }
                }
            }
        }

        Some(Candidate {
            image_url: Some(image_url),
            title,
            artist_names,
            official: false,
            native_score: None,
            release_group_id: None,
            release_id: None,
        })
    }

    fn bearer_token(&self) -> Result<String, ProviderError> {
        let mut cached = self.token_cache.lock().expect("token cache lock poisoned");
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Spotify access token refresh");
        let response = self
            .http_client
            .post(TOKEN_URL)
            .set("User-Agent", &self.user_agent)
            .send_form(&[
                ("grant_type", "client_credentials"),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
            ])
            .map_err(classify_ureq_failure)?;

        let mut body = String::new();
        response
            .into_reader()
            .read_to_string(&mut body)
            .map_err(classify_io_failure)?;
        let payload: Value = serde_json::from_str(&body)
            .map_err(|error| ProviderError::Malformed(error.to_string()))?;
        let (access_token, expires_in) = Self::parse_token_payload(&payload).ok_or_else(|| {
            ProviderError::Malformed("token response missing access_token".to_string())
        })?;

        let expires_at = Instant::now() + expires_in.saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            access_token: access_token.clone(),
            expires_at,
        });
        Ok(access_token)
    }

    fn invalidate_token(&self) {
        *self.token_cache.lock().expect("token cache lock poisoned") = None;
    }
}

impl CoverProvider for SpotifyProvider {
    fn id(&self) -> &'static str {
        "spotify"
    }

    fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, ProviderError> {
        self.rate_gate.wait_turn(self.id());
        let token = self.bearer_token()?;
        let url = self.search_url(query);
        debug!("Spotify search: {} - {}", query.artist, query.title);

        let response = match self
            .http_client
            .get(&url)
            .set("User-Agent", &self.user_agent)
            .set("Authorization", &format!("Bearer {token}"))
            .set("Accept", "application/json")
            .call()
        {
            Ok(response) => response,
            Err(ureq::Error::Status(401, response)) => {
                // Expired or revoked token; the next attempt fetches a fresh
                // one.
                self.invalidate_token();
                return Err(classify_ureq_failure(ureq::Error::Status(401, response)));
            }
            Err(error) => return Err(classify_ureq_failure(error)),
        };

        let mut body = String::new();
        response
            .into_reader()
            .read_to_string(&mut body)
            .map_err(classify_io_failure)?;
        let payload: Value = serde_json::from_str(&body)
            .map_err(|error| ProviderError::Malformed(error.to_string()))?;

        let mut candidates = Vec::new();
        if let Some(items) = payload
            .get("albums")
            .and_then(|albums| albums.get("items"))
            .and_then(Value::as_array)
        {
            for album in items {
                if let Some(candidate) = Self::parse_album(album) {
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
    use std::time::Duration;

    use serde_json::json;

    use super::{SearchQuery, SpotifyProvider};
    use crate::config::HttpConfig;
    use crate::rate_limit::RateGate;

    fn sample_provider() -> SpotifyProvider {
        SpotifyProvider::new(
            &HttpConfig::default(),
            "client-id".to_string(),
            "client-secret".to_string(),
            Arc::new(RateGate::new([])),
            4,
        )
    }

    #[test]
    fn test_parse_album_extracts_name_artists_and_largest_image() {
        let album = json!({
            "name": "Hunky Dory",
            "artists": [{"name": "David Bowie"}],
            "images": [
                {"url": "https://i.scdn.co/image/large", "width": 640},
                {"url": "https://i.scdn.co/image/small", "width": 64}
            ]
        });

        let candidate = SpotifyProvider::parse_album(&album).expect("album should parse");
        assert_eq!(candidate.title, "Hunky Dory");
        assert_eq!(candidate.artist_names, vec!["David Bowie"]);
        assert_eq!(
            candidate.image_url.as_deref(),
            Some("https://i.scdn.co/image/large")
        );
    }

    #[test]
    fn test_parse_album_without_images_is_skipped() {
        let album = json!({
            "name": "Hunky Dory",
            "artists": [{"name": "David Bowie"}],
            "images": []
        });
        assert!(SpotifyProvider::parse_album(&album).is_none());
    }

    #[test]
    fn test_parse_token_payload_reads_token_and_expiry() {
        let payload = json!({
            "access_token": "token-value",
            "token_type": "Bearer",
            "expires_in": 1200
        });
        let (token, expires_in) =
            SpotifyProvider::parse_token_payload(&payload).expect("token payload should parse");
        assert_eq!(token, "token-value");
        assert_eq!(expires_in, Duration::from_secs(1200));

        let without_expiry = json!({"access_token": "token-value"});
        let (_, default_expiry) = SpotifyProvider::parse_token_payload(&without_expiry)
            .expect("token payload should parse");
        assert_eq!(default_expiry, Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_token_payload_without_token_is_rejected() {
        let payload = json!({"expires_in": 1200});
        assert!(SpotifyProvider::parse_token_payload(&payload).is_none());
    }

    #[test]
    fn test_search_url_uses_field_filters() {
        let provider = sample_provider();
        let query = SearchQuery {
            artist: "David Bowie".to_string(),
            title: "Hunky Dory".to_string(),
        };
        let url = provider.search_url(&query);

        assert!(url.starts_with("https://api.spotify.com/v1/search?q="));
        assert!(url.contains("album%3AHunky%20Dory"));
        assert!(url.contains("artist%3ADavid%20Bowie"));
        assert!(url.contains("type=album"));
        assert!(url.contains("limit=4"));
    }
}
