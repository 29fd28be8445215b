//! In-memory LRU cache of processed cover bytes.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

/// Bounded cache of canonical cover JPEGs keyed by normalized source URL.
/// Lookups promote entries; inserting past capacity evicts the least
/// recently used one.
pub struct CoverCache {
    entries: Mutex<LruCache<String, Vec<u8>>>,
}

impl CoverCache {
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).expect("non-zero cache capacity");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns a copy of the cached bytes and promotes the entry.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries
            .lock()
            .expect("cover cache lock poisoned")
            .get(key)
            .cloned()
    }

    /// Promotes the entry without copying it. True when the key is cached.
    pub fn touch(&self, key: &str) -> bool {
        self.entries
            .lock()
            .expect("cover cache lock poisoned")
            .get(key)
            .is_some()
    }

    pub fn put(&self, key: String, bytes: Vec<u8>) {
        self.entries
            .lock()
            .expect("cover cache lock poisoned")
            .put(key, bytes);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .expect("cover cache lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Canonicalizes a source URL into its cache key: any query string is
/// dropped, and an archive-style sized path ("/front-500") collapses to the
/// bare "/front" so differently-sized requests for one release share an
/// entry.
pub fn normalize_key(url: &str) -> String {
    let base = match url.split_once('?') {
        Some((base, _)) => base,
        None => url,
    };
    match sized_front_prefix(base) {
        Some(prefix) => format!("{prefix}/front"),
        None => base.to_string(),
    }
}

fn sized_front_prefix(base: &str) -> Option<&str> {
    let (prefix, segment) = base.rsplit_once('/')?;
    let size = segment.strip_prefix("front-")?;
    if !size.is_empty() && size.bytes().all(|byte| byte.is_ascii_digit()) {
        Some(prefix)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_key, CoverCache};

    #[test]
    fn test_normalize_key_strips_query_and_size_suffix() {
        assert_eq!(
            normalize_key("https://coverartarchive.org/release/abc/front-500?ts=1"),
            "https://coverartarchive.org/release/abc/front"
        );
        assert_eq!(
            normalize_key("https://coverartarchive.org/release-group/abc/front-250"),
            "https://coverartarchive.org/release-group/abc/front"
        );
        assert_eq!(
            normalize_key("https://img.example/cover.jpg?token=abc&size=big"),
            "https://img.example/cover.jpg"
        );
    }

    #[test]
    fn test_normalize_key_leaves_plain_urls_untouched() {
        assert_eq!(
            normalize_key("https://img.example/cover.jpg"),
            "https://img.example/cover.jpg"
        );
        assert_eq!(
            normalize_key("https://img.example/front-door.jpg"),
            "https://img.example/front-door.jpg"
        );
        assert_eq!(
            normalize_key("https://img.example/front"),
            "https://img.example/front"
        );
    }

    #[test]
    fn test_get_returns_cached_bytes() {
        let cache = CoverCache::new(4);
        assert!(cache.get("missing").is_none());
        cache.put("hit".to_string(), vec![9, 8, 7]);
        assert_eq!(cache.get("hit"), Some(vec![9, 8, 7]));
    }

    #[test]
    fn test_cache_evicts_least_recently_used_entry() {
        let cache = CoverCache::new(2);
        cache.put("a".to_string(), vec![1]);
        cache.put("b".to_string(), vec![2]);
        assert!(cache.touch("a"));
        cache.put("c".to_string(), vec![3]);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_cache_capacity_bounds_entry_count() {
        let cache = CoverCache::new(200);
        for index in 0..=200 {
            cache.put(format!("key-{index}"), vec![0]);
        }
        assert_eq!(cache.len(), 200);
        assert!(cache.get("key-0").is_none());
        assert!(cache.get("key-200").is_some());
    }

    #[test]
    fn test_zero_capacity_is_clamped_to_one() {
        let cache = CoverCache::new(0);
        cache.put("only".to_string(), vec![1]);
        assert_eq!(cache.len(), 1);
    }
}
