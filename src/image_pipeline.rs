//! Remote cover fetching and normalization to the canonical JPEG form.

use std::io::Read;
use std::time::Duration;

use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, GenericImageView};
use log::debug;
use zune_core::{colorspace::ColorSpace, options::DecoderOptions};
use zune_jpeg::JpegDecoder;

use crate::config::{HttpConfig, ImagesConfig};

/// Browser-style agent for image hosts; several CDNs refuse obviously
/// programmatic agents while serving the same bytes to browsers.
const IMAGE_FETCH_USER_AGENT: &str = "Mozilla/5.0";

/// Failure fetching or normalizing a remote image.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("image request failed: {0}")]
    Request(String),
    #[error("image response body was empty")]
    EmptyBody,
    #[error("image bytes could not be decoded")]
    Undecodable,
}

/// Source of canonical cover bytes, keyed by source URL. The cache and
/// preloader work against this seam so they can be tested without network
/// access.
pub trait CoverSource: Send + Sync {
    fn fetch_processed(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Downloads remote images and normalizes them: center-crop to a square,
/// smooth-resize to the canonical edge, re-encode as opaque JPEG.
pub struct ImageFetcher {
    http_client: ureq::Agent,
    canonical_size_px: u32,
}

impl ImageFetcher {
    pub fn new(http: &HttpConfig, images: &ImagesConfig) -> Self {
        Self {
            http_client: ureq::AgentBuilder::new()
                .timeout_connect(Duration::from_millis(u64::from(http.connect_timeout_ms)))
                .timeout_read(Duration::from_millis(u64::from(http.read_timeout_ms)))
                .timeout_write(Duration::from_millis(u64::from(http.read_timeout_ms)))
                .build(),
            canonical_size_px: images.canonical_size_px.max(1),
        }
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!("Fetching cover image: {url}");
        let response = self
            .http_client
            .get(url)
            .set("User-Agent", IMAGE_FETCH_USER_AGENT)
            .call()
            .map_err(|error| FetchError::Request(error.to_string()))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|error| FetchError::Request(error.to_string()))?;
        if bytes.is_empty() {
            return Err(FetchError::EmptyBody);
        }
        Ok(bytes)
    }

    /// Normalizes already-downloaded bytes to the canonical square JPEG.
    pub fn process_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>, FetchError> {
        let decoded = decode_image_with_fallback(bytes).ok_or(FetchError::Undecodable)?;
        let squared = center_crop_square(&decoded);
        let resized = squared.resize_exact(
            self.canonical_size_px,
            self.canonical_size_px,
            FilterType::Lanczos3,
        );
        encode_jpeg(&resized)
    }
}

impl CoverSource for ImageFetcher {
    fn fetch_processed(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let bytes = self.fetch_bytes(url)?;
        self.process_bytes(&bytes)
    }
}

/// Crops the largest centered square out of the image. Square inputs pass
/// through untouched.
fn center_crop_square(image: &DynamicImage) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width == height {
        return image.clone();
    }
    let side = width.min(height);
    let x = (width - side) / 2;
    let y = (height - side) / 2;
    image.crop_imm(x, y, side, side)
}

fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>, FetchError> {
    // Covers are always opaque; flattening to RGB drops any alpha channel
    // before the JPEG encoder sees it.
    let rgb = image.to_rgb8();
    let mut encoded = Vec::new();
    let mut encoder = JpegEncoder::new(&mut encoded);
    encoder
        .encode_image(&rgb)
        .map_err(|_| FetchError::Undecodable)?;
    Ok(encoded)
}

fn looks_like_jpeg(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0xff && bytes[1] == 0xd8
}

fn decode_jpeg_non_strict(bytes: &[u8]) -> Option<DynamicImage> {
    if !looks_like_jpeg(bytes) {
        return None;
    }

    let options = DecoderOptions::new_cmd()
        .set_strict_mode(false)
        .jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(bytes, options);
    let pixels = decoder.decode().ok()?;
    let (width, height) = decoder.dimensions()?;
    let image = image::RgbaImage::from_raw(width as u32, height as u32, pixels)?;
    Some(DynamicImage::ImageRgba8(image))
}

/// Primary decoder keeps broad PNG/WebP/GIF/BMP support; the non-strict JPEG
/// fallback salvages truncated or garbage-trailing files that strict decoders
/// reject. Remote cover hosts serve plenty of both.
fn decode_image_with_fallback(bytes: &[u8]) -> Option<DynamicImage> {
    image::load_from_memory(bytes)
        .ok()
        .or_else(|| decode_jpeg_non_strict(bytes))
}
