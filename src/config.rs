//! Persistent application configuration model and defaults.

/// Root configuration persisted to `covervault.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    /// Catalog database location.
    #[serde(default)]
    pub store: StoreConfig,
    /// Outbound HTTP behavior shared by all providers.
    #[serde(default)]
    pub http: HttpConfig,
    /// Resolution policy: provider order, scoring threshold, pacing.
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// Per-provider toggles, pacing intervals, and credentials.
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Processed-image cache bounds.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Image normalization output.
    #[serde(default)]
    pub images: ImagesConfig,
    /// Background warm-up pool.
    #[serde(default)]
    pub preload: PreloadConfig,
}

/// Catalog database location. Empty path selects the platform data directory.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub db_path: String,
}

/// Outbound HTTP client behavior.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct HttpConfig {
    /// Identifying user agent sent to metadata providers. MusicBrainz policy
    /// requires contact information here.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_http_timeout_ms")]
    pub connect_timeout_ms: u32,
    #[serde(default = "default_http_timeout_ms")]
    pub read_timeout_ms: u32,
}

/// Resolution policy knobs.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ResolverConfig {
    /// Provider ids tried in order; earlier entries win score ties.
    #[serde(default = "default_provider_order")]
    pub provider_order: Vec<String>,
    /// Candidates scoring at or above this are accepted without consulting
    /// later providers.
    #[serde(default = "default_accept_threshold")]
    pub accept_threshold: i32,
    /// Pause after every resolution attempt, on top of per-provider pacing.
    #[serde(default = "default_resolve_cooldown_ms")]
    pub resolve_cooldown_ms: u32,
    #[serde(default = "default_max_candidates_per_provider")]
    pub max_candidates_per_provider: usize,
    /// Placeholder persisted when no provider yields a usable cover.
    #[serde(default = "default_cover_path")]
    pub default_cover_path: String,
}

/// Per-provider configuration container.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub musicbrainz: MusicBrainzConfig,
    #[serde(default)]
    pub discogs: DiscogsConfig,
    #[serde(default)]
    pub spotify: SpotifyConfig,
}

/// MusicBrainz search settings. No credentials; pacing policy is strict.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct MusicBrainzConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_musicbrainz_interval_ms")]
    pub min_interval_ms: u32,
}

/// Discogs search settings. Disabled at wiring time when the token is empty.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct DiscogsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_discogs_interval_ms")]
    pub min_interval_ms: u32,
    #[serde(default)]
    pub token: String,
}

/// Spotify search settings. Disabled at wiring time when either credential is
/// empty.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SpotifyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_spotify_interval_ms")]
    pub min_interval_ms: u32,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

/// Processed-image cache bounds.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

/// Image normalization output settings.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ImagesConfig {
    #[serde(default = "default_canonical_size_px")]
    pub canonical_size_px: u32,
}

/// Background warm-up pool settings.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PreloadConfig {
    #[serde(default = "default_preload_workers")]
    pub workers: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout_ms: default_http_timeout_ms(),
            read_timeout_ms: default_http_timeout_ms(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            provider_order: default_provider_order(),
            accept_threshold: default_accept_threshold(),
            resolve_cooldown_ms: default_resolve_cooldown_ms(),
            max_candidates_per_provider: default_max_candidates_per_provider(),
            default_cover_path: default_cover_path(),
        }
    }
}

impl Default for MusicBrainzConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval_ms: default_musicbrainz_interval_ms(),
        }
    }
}

impl Default for DiscogsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval_ms: default_discogs_interval_ms(),
            token: String::new(),
        }
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval_ms: default_spotify_interval_ms(),
            client_id: String::new(),
            client_secret: String::new(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_max_entries(),
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            canonical_size_px: default_canonical_size_px(),
        }
    }
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            workers: default_preload_workers(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    "covervault/0.1 ( covervault@example.com )".to_string()
}

fn default_http_timeout_ms() -> u32 {
    5_000
}

fn default_provider_order() -> Vec<String> {
    vec![
        "musicbrainz".to_string(),
        "discogs".to_string(),
        "spotify".to_string(),
    ]
}

fn default_accept_threshold() -> i32 {
    50
}

fn default_resolve_cooldown_ms() -> u32 {
    1_100
}

fn default_max_candidates_per_provider() -> usize {
    5
}

fn default_cover_path() -> String {
    crate::cover_resolver::DEFAULT_COVER_PATH.to_string()
}

fn default_musicbrainz_interval_ms() -> u32 {
    1_200
}

fn default_discogs_interval_ms() -> u32 {
    1_000
}

fn default_spotify_interval_ms() -> u32 {
    500
}

fn default_cache_max_entries() -> usize {
    200
}

fn default_canonical_size_px() -> u32 {
    600
}

fn default_preload_workers() -> usize {
    5
}

/// Clamps out-of-range values loaded from disk into usable ranges.
pub fn sanitize_config(config: Config) -> Config {
    let mut config = config;
    config.http.connect_timeout_ms = config.http.connect_timeout_ms.max(100);
    config.http.read_timeout_ms = config.http.read_timeout_ms.max(100);
    if config.resolver.provider_order.is_empty() {
        config.resolver.provider_order = default_provider_order();
    }
    config.resolver.max_candidates_per_provider =
        config.resolver.max_candidates_per_provider.max(1);
    config.providers.musicbrainz.min_interval_ms =
        config.providers.musicbrainz.min_interval_ms.max(1);
    config.providers.discogs.min_interval_ms = config.providers.discogs.min_interval_ms.max(1);
    config.providers.spotify.min_interval_ms = config.providers.spotify.min_interval_ms.max(1);
    config.cache.max_entries = config.cache.max_entries.max(1);
    config.images.canonical_size_px = config.images.canonical_size_px.max(1);
    config.preload.workers = config.preload.workers.max(1);
    config
}

/// Overrides provider credentials from the environment. The lookup is injected
/// so tests can supply a fake environment.
pub fn apply_credential_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = lookup("DISCOGS_TOKEN") {
        if !token.is_empty() {
            config.providers.discogs.token = token;
        }
    }
    if let Some(client_id) = lookup("SPOTIFY_CLIENT_ID") {
        if !client_id.is_empty() {
            config.providers.spotify.client_id = client_id;
        }
    }
    if let Some(client_secret) = lookup("SPOTIFY_CLIENT_SECRET") {
        if !client_secret.is_empty() {
            config.providers.spotify.client_secret = client_secret;
        }
    }
}
