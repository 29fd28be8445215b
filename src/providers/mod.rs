//! Cover-art provider abstractions and concrete implementations.

pub mod discogs;
pub mod musicbrainz;
pub mod spotify;

use std::io::Read;

/// Search terms sent to a provider: query-safe artist and album strings with
/// meaningful punctuation kept and no transliteration applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub artist: String,
    pub title: String,
}

/// One possible cover match returned by a provider, before scoring.
#[derive(Debug, Clone, Default)]
pub struct Candidate {
    /// Direct image URL when the provider returns one inline. Archive-backed
    /// providers leave this empty and carry release ids instead.
    pub image_url: Option<String>,
    pub title: String,
    pub artist_names: Vec<String>,
    /// Provider-flagged official release status.
    pub official: bool,
    /// Provider-native confidence score, 0..=100 where present.
    pub native_score: Option<i64>,
    pub release_group_id: Option<String>,
    pub release_id: Option<String>,
}

/// Provider call failure. Every variant is absorbed by the resolver and
/// treated as zero candidates; the classification drives log wording only.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("rate limited by provider: {0}")]
    RateLimited(String),
    #[error("malformed provider response: {0}")]
    Malformed(String),
    #[error("request failed: {0}")]
    Failed(String),
}

/// Interface implemented by concrete cover-art providers.
pub trait CoverProvider: Send + Sync {
    /// Stable id used for configuration lookup, pacing, and logs.
    fn id(&self) -> &'static str;

    /// Performs one live search. An empty result list is a normal outcome,
    /// never an error.
    fn search(&self, query: &SearchQuery) -> Result<Vec<Candidate>, ProviderError>;

    /// Resolves a scored candidate to a fetchable image URL. Providers whose
    /// images live in a separate archive override this with existence probes.
    fn resolve_image_url(&self, candidate: &Candidate) -> Option<String> {
        candidate.image_url.clone()
    }
}

pub(crate) fn classify_ureq_failure(error: ureq::Error) -> ProviderError {
    match error {
        ureq::Error::Status(code, _) => match code {
            429 => ProviderError::RateLimited(format!("status {code}")),
            408 | 500 | 502 | 503 | 504 => ProviderError::Timeout(format!("status {code}")),
            _ => ProviderError::Failed(format!("status {code}")),
        },
        ureq::Error::Transport(transport) => {
            let text = transport.to_string();
            let lowered = text.to_ascii_lowercase();
            if lowered.contains("timed out") || lowered.contains("timeout") {
                ProviderError::Timeout(text)
            } else {
                ProviderError::Failed(text)
            }
        }
    }
}

pub(crate) fn classify_io_failure(error: std::io::Error) -> ProviderError {
    let is_timeout = matches!(
        error.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    ) || error.to_string().to_ascii_lowercase().contains("timed out");
    if is_timeout {
        ProviderError::Timeout(error.to_string())
    } else {
        ProviderError::Failed(error.to_string())
    }
}

/// Issues a GET expecting a JSON body, with the identifying user agent.
pub(crate) fn http_get_json(
    agent: &ureq::Agent,
    url: &str,
    user_agent: &str,
) -> Result<serde_json::Value, ProviderError> {
    let response = agent
        .get(url)
        .set("User-Agent", user_agent)
        .set("Accept", "application/json")
        .call()
        .map_err(classify_ureq_failure)?;

    let mut body = String::new();
    response
        .into_reader()
        .read_to_string(&mut body)
        .map_err(classify_io_failure)?;
    serde_json::from_str(&body).map_err(|error| ProviderError::Malformed(error.to_string()))
}
