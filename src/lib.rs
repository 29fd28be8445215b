//! Covervault - cover art resolution and serving for album catalogs
//!
//! Resolves cover images for catalog albums by querying public providers
//! (MusicBrainz/Cover Art Archive, Discogs, Spotify), normalizes the winning
//! image into a canonical square JPEG, and serves it through an in-memory
//! LRU cache with revalidation support.

pub mod config;
pub mod cover_pipeline;
pub mod cover_preloader;
pub mod cover_resolver;
pub mod db_manager;
pub mod image_cache;
pub mod image_pipeline;
pub mod providers;
pub mod rate_limit;
pub mod text_normalize;

pub use cover_pipeline::{CoverPipeline, ProxyResponse};
pub use cover_resolver::CoverResolver;
pub use db_manager::DbManager;
