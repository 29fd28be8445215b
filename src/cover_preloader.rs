//! Background warming of the cover cache.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::debug;

use crate::image_cache::{normalize_key, CoverCache};
use crate::image_pipeline::CoverSource;

/// Fixed pool of worker threads that fetch and cache covers ahead of demand.
/// Requests are fire-and-forget; failures are logged and dropped. Dropping
/// the preloader disconnects the queue and joins the workers, so accepted
/// requests still finish before shutdown.
pub struct CoverPreloader {
    cache: Arc<CoverCache>,
    sender: Option<Sender<String>>,
    workers: Vec<JoinHandle<()>>,
}

impl CoverPreloader {
    pub fn new(workers: usize, cache: Arc<CoverCache>, source: Arc<dyn CoverSource>) -> Self {
        let (sender, receiver) = mpsc::channel::<String>();
        let receiver = Arc::new(Mutex::new(receiver));

        let worker_count = workers.max(1);
        let mut handles = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let receiver_worker = Arc::clone(&receiver);
            let cache_worker = Arc::clone(&cache);
            let source_worker = Arc::clone(&source);
            handles.push(thread::spawn(move || {
                preload_worker(index, receiver_worker, cache_worker, source_worker);
            }));
        }

        Self {
            cache,
            sender: Some(sender),
            workers: handles,
        }
    }

    /// Queues one URL for warming. Blank URLs and cache hits never reach the
    /// queue.
    pub fn preload(&self, url: &str) {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return;
        }
        if self.cache.touch(&normalize_key(trimmed)) {
            return;
        }
        if let Some(sender) = &self.sender {
            let _ = sender.send(trimmed.to_string());
        }
    }
}

impl Drop for CoverPreloader {
    fn drop(&mut self) {
        // Disconnecting the queue lets each worker drain what it holds and
        // exit its recv loop.
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn preload_worker(
    index: usize,
    receiver: Arc<Mutex<Receiver<String>>>,
    cache: Arc<CoverCache>,
    source: Arc<dyn CoverSource>,
) {
    loop {
        // The lock only guards queue handoff; it is released before the
        // fetch so workers download in parallel.
        let request = {
            let receiver = receiver.lock().expect("preload queue lock poisoned");
            receiver.recv()
        };
        let url = match request {
            Ok(url) => url,
            Err(_) => break,
        };

        let key = normalize_key(&url);
        // Another worker may have warmed the same cover while this request
        // sat in the queue.
        if cache.touch(&key) {
            continue;
        }
        match source.fetch_processed(&url) {
            Ok(bytes) => {
                debug!("Preloaded cover {key} ({} bytes)", bytes.len());
                cache.put(key, bytes);
            }
            Err(error) => {
                debug!("Preload worker {index} failed for {url}: {error}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::CoverPreloader;
    use crate::image_cache::CoverCache;
    use crate::image_pipeline::{CoverSource, FetchError};

    struct CountingSource {
        fetches: AtomicUsize,
        fail: bool,
    }

    impl CountingSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                fetches: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fetches: AtomicUsize::new(0),
                fail: true,
            })
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl CoverSource for CountingSource {
        fn fetch_processed(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(FetchError::EmptyBody);
            }
            Ok(url.as_bytes().to_vec())
        }
    }

    #[test]
    fn test_preload_fetches_original_url_and_caches_under_normalized_key() {
        let cache = Arc::new(CoverCache::new(8));
        let source = CountingSource::new();
        let preloader = CoverPreloader::new(2, Arc::clone(&cache), source.clone());

        preloader.preload("https://img.example/release/abc/front-500?ts=1");
        drop(preloader);

        assert_eq!(source.fetch_count(), 1);
        assert_eq!(
            cache.get("https://img.example/release/abc/front"),
            Some(b"https://img.example/release/abc/front-500?ts=1".to_vec())
        );
    }

    #[test]
    fn test_preload_skips_blank_and_already_cached_urls() {
        let cache = Arc::new(CoverCache::new(8));
        cache.put("https://img.example/cover.jpg".to_string(), vec![1]);
        let source = CountingSource::new();
        let preloader = CoverPreloader::new(2, Arc::clone(&cache), source.clone());

        preloader.preload("");
        preloader.preload("   ");
        preloader.preload("https://img.example/cover.jpg?sig=abc");
        drop(preloader);

        assert_eq!(source.fetch_count(), 0);
    }

    #[test]
    fn test_duplicate_preloads_fetch_once() {
        let cache = Arc::new(CoverCache::new(8));
        let source = CountingSource::new();
        let preloader = CoverPreloader::new(1, Arc::clone(&cache), source.clone());

        preloader.preload("https://img.example/cover.jpg");
        preloader.preload("https://img.example/cover.jpg");
        drop(preloader);

        assert_eq!(source.fetch_count(), 1);
    }

    #[test]
    fn test_preload_failures_leave_cache_empty() {
        let cache = Arc::new(CoverCache::new(8));
        let source = CountingSource::failing();
        let preloader = CoverPreloader::new(2, Arc::clone(&cache), source.clone());

        preloader.preload("https://img.example/broken.jpg");
        drop(preloader);

        assert_eq!(source.fetch_count(), 1);
        assert!(cache.is_empty());
    }
}
