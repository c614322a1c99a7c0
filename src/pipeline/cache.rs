//! Output cache keyed by a content hash of the request
//!
//! Entries expire after a TTL; when full, the oldest inserted entry is evicted.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use sha2::{Digest, Sha256};

use crate::config::CacheSettings;
use crate::model::ReportRequest;
use crate::render::backends::BackendKind;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub bytes: Vec<u8>,
    pub created_at: Instant,
    pub expires_at: Instant,
}

fn hex(digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Length-prefix each field so adjacent fields cannot run together
fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// SHA-256 over every input that affects the output, including the backend
pub fn cache_key(request: &ReportRequest, backend: BackendKind) -> String {
    let mut hasher = Sha256::new();
    update_field(&mut hasher, request.markup.as_bytes());
    update_field(&mut hasher, request.stylesheet.as_bytes());

    hasher.update((request.images.len() as u64).to_le_bytes());
    for image in &request.images {
        update_field(&mut hasher, &image.bytes);
    }

    hasher.update((request.rows.len() as u64).to_le_bytes());
    for row in &request.rows {
        // Records serialize in insertion order
        let json = serde_json::to_vec(row).unwrap_or_default();
        update_field(&mut hasher, &json);
    }

    update_field(&mut hasher, request.title.as_bytes());
    update_field(&mut hasher, request.page_format.as_str().as_bytes());
    update_field(&mut hasher, request.orientation.as_str().as_bytes());
    hasher.update([request.compress as u8]);
    update_field(&mut hasher, backend.as_str().as_bytes());

    hex(&hasher.finalize())
}

pub struct OutputCache {
    entries: Mutex<IndexMap<String, CacheEntry>>,
    capacity: usize,
    ttl: Duration,
}

impl OutputCache {
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            capacity: settings.capacity,
            ttl: settings.ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.get_at(key, Instant::now())
    }

    /// Lookup as of `now`. Expired entries are removed on access.
    pub fn get_at(&self, key: &str, now: Instant) -> Option<Vec<u8>> {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(_) => {
                log::warn!("Cache lock poisoned; treating as miss");
                return None;
            }
        };
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                log::debug!("Cache hit {}", &key[..key.len().min(12)]);
                Some(entry.bytes.clone())
            }
            Some(_) => {
                entries.shift_remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: String, bytes: Vec<u8>) {
        self.put_at(key, bytes, Instant::now());
    }

    pub fn put_at(&self, key: String, bytes: Vec<u8>, now: Instant) {
        if self.capacity == 0 {
            return;
        }
        let Ok(mut entries) = self.entries.lock() else {
            log::warn!("Cache lock poisoned; dropping write");
            return;
        };

        entries.retain(|_, entry| entry.expires_at > now);
        // Re-inserting moves the key to the newest position
        entries.shift_remove(&key);
        while entries.len() >= self.capacity {
            entries.shift_remove_index(0);
        }
        entries.insert(
            key.clone(),
            CacheEntry {
                key,
                bytes,
                created_at: now,
                expires_at: now + self.ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EncodedImage, Record, Scalar};

    fn cache(capacity: usize, ttl_secs: u64) -> OutputCache {
        OutputCache::new(&CacheSettings {
            capacity,
            ttl: Duration::from_secs(ttl_secs),
        })
    }

    #[test]
    fn test_key_is_stable_and_sensitive() {
        let request = ReportRequest {
            markup: "<p>a</p>".into(),
            ..ReportRequest::default()
        };
        let key = cache_key(&request, BackendKind::Vector);
        assert_eq!(key.len(), 64);
        assert_eq!(key, cache_key(&request.clone(), BackendKind::Vector));

        assert_ne!(key, cache_key(&request, BackendKind::Streaming));

        let mut changed = request.clone();
        changed.compress = false;
        assert_ne!(key, cache_key(&changed, BackendKind::Vector));

        let mut with_image = request.clone();
        with_image.images.push(EncodedImage::new(vec![1, 2, 3]));
        assert_ne!(key, cache_key(&with_image, BackendKind::Vector));
    }

    #[test]
    fn test_key_fields_do_not_run_together() {
        let a = ReportRequest {
            markup: "ab".into(),
            stylesheet: "c".into(),
            ..ReportRequest::default()
        };
        let b = ReportRequest {
            markup: "a".into(),
            stylesheet: "bc".into(),
            ..ReportRequest::default()
        };
        assert_ne!(cache_key(&a, BackendKind::Vector), cache_key(&b, BackendKind::Vector));
    }

    #[test]
    fn test_row_order_matters() {
        let row = |k: &str| {
            let mut r = Record::new();
            r.insert(k.to_string(), Scalar::Bool(true));
            r
        };
        let a = ReportRequest {
            rows: vec![row("x"), row("y")],
            ..ReportRequest::default()
        };
        let b = ReportRequest {
            rows: vec![row("y"), row("x")],
            ..ReportRequest::default()
        };
        assert_ne!(cache_key(&a, BackendKind::Vector), cache_key(&b, BackendKind::Vector));
    }

    #[test]
    fn test_put_get() {
        let cache = cache(4, 60);
        assert!(cache.get("k").is_none());
        cache.put("k".into(), vec![1, 2]);
        assert_eq!(cache.get("k"), Some(vec![1, 2]));
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = cache(4, 600);
        let start = Instant::now();
        cache.put_at("k".into(), vec![1], start);
        assert!(cache.get_at("k", start + Duration::from_secs(599)).is_some());
        assert!(cache.get_at("k", start + Duration::from_secs(600)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest_inserted() {
        let cache = cache(2, 60);
        let now = Instant::now();
        cache.put_at("a".into(), vec![1], now);
        cache.put_at("b".into(), vec![2], now);
        // Reading does not refresh position
        assert!(cache.get_at("a", now).is_some());
        cache.put_at("c".into(), vec![3], now);

        assert!(cache.get_at("a", now).is_none());
        assert!(cache.get_at("b", now).is_some());
        assert!(cache.get_at("c", now).is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_last_write_wins() {
        let cache = cache(2, 60);
        cache.put("k".into(), vec![1]);
        cache.put("k".into(), vec![2]);
        assert_eq!(cache.get("k"), Some(vec![2]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_capacity_never_stores() {
        let cache = cache(0, 60);
        cache.put("k".into(), vec![1]);
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_concurrent_writers_stay_within_capacity() {
        let cache = cache(16, 600);
        std::thread::scope(|scope| {
            for t in 0..8 {
                let cache = &cache;
                scope.spawn(move || {
                    for k in 0..50 {
                        let key = format!("t{}-{}", t, k);
                        cache.put(key.clone(), vec![t as u8; 8]);
                        assert!(cache.len() <= 16);
                        if let Some(bytes) = cache.get(&key) {
                            assert_eq!(bytes, vec![t as u8; 8]);
                        }
                    }
                });
            }
        });
        assert_eq!(cache.len(), 16);
    }

    #[test]
    fn test_concurrent_last_write_wins() {
        let cache = cache(64, 600);
        let last_writer = std::sync::Mutex::new(None);
        std::thread::scope(|scope| {
            for t in 0..8u8 {
                let (cache, last_writer) = (&cache, &last_writer);
                scope.spawn(move || {
                    for k in 0..20 {
                        cache.put(format!("t{}-{}", t, k % 4), vec![t; 4]);
                        let mut last = last_writer.lock().unwrap();
                        cache.put("shared".into(), vec![t; 1024]);
                        *last = Some(t);
                    }
                });
            }
        });

        let winner = last_writer.into_inner().unwrap().unwrap();
        assert_eq!(cache.get("shared"), Some(vec![winner; 1024]));
    }
}
