use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use covervault::config::{apply_credential_overrides, sanitize_config, Config};
use covervault::cover_pipeline::CoverPipeline;
use covervault::cover_preloader::CoverPreloader;
use covervault::cover_resolver::CoverResolver;
use covervault::db_manager::DbManager;
use covervault::image_cache::CoverCache;
use covervault::image_pipeline::{CoverSource, ImageFetcher};
use covervault::providers::discogs::DiscogsProvider;
use covervault::providers::musicbrainz::MusicBrainzProvider;
use covervault::providers::spotify::SpotifyProvider;
use covervault::providers::CoverProvider;
use covervault::rate_limit::RateGate;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Debug);
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let config_dir = dirs::config_dir().unwrap();
    let config_file = config_dir.join("covervault.toml");

    if !config_file.exists() {
        let default_config = Config::default();

        info!(
            "Config file not found. Creating default config. path={}",
            config_file.display()
        );
        std::fs::write(
            config_file.clone(),
            toml::to_string(&default_config).unwrap(),
        )
        .unwrap();
    }

    let config_content = std::fs::read_to_string(config_file.clone()).unwrap();
    let mut config = sanitize_config(toml::from_str::<Config>(&config_content).unwrap_or_default());
    apply_credential_overrides(&mut config, |name| std::env::var(name).ok());

    let db = if config.store.db_path.trim().is_empty() {
        DbManager::new()?
    } else {
        DbManager::open(config.store.db_path.trim())?
    };

    let rate_gate = Arc::new(RateGate::new([
        (
            "musicbrainz".to_string(),
            Duration::from_millis(u64::from(config.providers.musicbrainz.min_interval_ms)),
        ),
        (
            "discogs".to_string(),
            Duration::from_millis(u64::from(config.providers.discogs.min_interval_ms)),
        ),
        (
            "spotify".to_string(),
            Duration::from_millis(u64::from(config.providers.spotify.min_interval_ms)),
        ),
    ]));

    let providers = build_providers(&config, &rate_gate);
    if providers.is_empty() {
        warn!("No cover providers are enabled; resolution will only produce the default cover");
    } else {
        info!("Enabled cover providers: {}", providers.len());
    }

    let resolver = CoverResolver::new(providers, &config.resolver);
    let fetcher: Arc<dyn CoverSource> = Arc::new(ImageFetcher::new(&config.http, &config.images));
    let cache = Arc::new(CoverCache::new(config.cache.max_entries));
    let preloader = CoverPreloader::new(
        config.preload.workers,
        Arc::clone(&cache),
        Arc::clone(&fetcher),
    );
    let pipeline = CoverPipeline::new(resolver, fetcher, Arc::clone(&cache), preloader);

    let resolved = pipeline.resolve_missing_covers(&db);
    let warmed = pipeline.warm_from_catalog(&db);
    info!("Cover sweep complete. resolved={resolved} preload_queued={warmed}");

    // Dropping the pipeline joins the preload workers, so queued downloads
    // finish before the process exits.
    drop(pipeline);
    info!("Cover cache warmed. entries={}", cache.len());
    Ok(())
}

fn build_providers(config: &Config, rate_gate: &Arc<RateGate>) -> Vec<Arc<dyn CoverProvider>> {
    let mut providers: Vec<Arc<dyn CoverProvider>> = Vec::new();
    for provider_id in &config.resolver.provider_order {
        match provider_id.as_str() {
            "musicbrainz" => {
                if !config.providers.musicbrainz.enabled {
                    continue;
                }
                providers.push(Arc::new(MusicBrainzProvider::new(
                    &config.http,
                    Arc::clone(rate_gate),
                    config.resolver.max_candidates_per_provider,
                )));
            }
            "discogs" => {
                if !config.providers.discogs.enabled {
                    continue;
                }
                let token = config.providers.discogs.token.trim();
                if token.is_empty() {
                    warn!("Discogs provider enabled but no token is configured; skipping");
                    continue;
                }
                providers.push(Arc::new(DiscogsProvider::new(
                    &config.http,
                    token.to_string(),
                    Arc::clone(rate_gate),
                    config.resolver.max_candidates_per_provider,
                )));
            }
            "spotify" => {
                if !config.providers.spotify.enabled {
                    continue;
                }
                let client_id = config.providers.spotify.client_id.trim();
                let client_secret = config.providers.spotify.client_secret.trim();
                if client_id.is_empty() || client_secret.is_empty() {
                    warn!("Spotify provider enabled but credentials are incomplete; skipping");
                    continue;
                }
                providers.push(Arc::new(SpotifyProvider::new(
                    &config.http,
                    client_id.to_string(),
                    client_secret.to_string(),
                    Arc::clone(rate_gate),
                    config.resolver.max_candidates_per_provider,
                )));
            }
            other => {
                warn!("Unknown provider '{other}' in provider_order; skipping");
            }
        }
    }
    providers
}
