//! In-memory response cache keyed by content hash.
//!
//! Generated values are stored with their concrete type so callers never
//! unwrap an untyped payload. Entries expire after a TTL, and the least
//! recently used entry is evicted once the cache is full.
//!
//! ```ignore
//! use diffscribe::llm::{ContentHash, ResponseCache};
//!
//! let cache: ResponseCache<String> = ResponseCache::new(100);
//! let key = ContentHash::from_content("diff text");
//! cache.insert(key.clone(), "feat: add parser".to_string());
//! assert_eq!(cache.get(&key).as_deref(), Some("feat: add parser"));
//! ```

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// SHA-256 of cached content, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash a single string.
    pub fn from_content(content: &str) -> Self {
        Self::from_parts([content])
    }

    /// Hash several strings as one key. Parts are length-prefixed so
    /// `["ab", "c"]` and `["a", "bc"]` hash differently.
    pub fn from_parts<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for [`ResponseCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_entries: usize,
    /// Entries older than this are treated as missing.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 256,
            ttl: Duration::from_secs(3600), // 1 hour
        }
    }
}

impl CacheConfig {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Default::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Hit/miss counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    last_accessed: Instant,
}

/// Thread-safe, bounded cache of generated values.
#[derive(Debug)]
pub struct ResponseCache<V> {
    entries: RwLock<HashMap<ContentHash, CacheEntry<V>>>,
    stats: RwLock<CacheStats>,
    config: CacheConfig,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(max_entries: usize) -> Self {
        Self::with_config(CacheConfig::new(max_entries))
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            stats: RwLock::new(CacheStats::default()),
            config,
        }
    }

    /// Returns a copy of the live value stored under `key`.
    pub fn get(&self, key: &ContentHash) -> Option<V> {
        let mut entries = self.entries.write().expect("cache write lock poisoned");
        let mut stats = self.stats.write().expect("stats write lock poisoned");

        match entries.get_mut(key) {
            Some(entry) if entry.created_at.elapsed() < self.config.ttl => {
                entry.last_accessed = Instant::now();
                stats.hits += 1;
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                stats.misses += 1;
                stats.evictions += 1;
                None
            }
            None => {
                stats.misses += 1;
                None
            }
        }
    }

    /// Stores `value`, evicting expired entries and then the least recently
    /// used one if the cache is still full.
    pub fn insert(&self, key: ContentHash, value: V) {
        if self.config.max_entries == 0 {
            return;
        }

        let mut entries = self.entries.write().expect("cache write lock poisoned");
        let mut evicted = 0u64;

        let ttl = self.config.ttl;
        let before = entries.len();
        entries.retain(|_, entry| entry.created_at.elapsed() < ttl);
        evicted += (before - entries.len()) as u64;

        if !entries.contains_key(&key) && entries.len() >= self.config.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                evicted += 1;
            }
        }

        let now = Instant::now();
        entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                last_accessed: now,
            },
        );

        if evicted > 0 {
            self.stats.write().expect("stats write lock poisoned").evictions += evicted;
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.read().expect("stats read lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("cache read lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().expect("cache write lock poisoned").clear();
    }
}
