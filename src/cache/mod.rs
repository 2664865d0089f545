//! Synthesis result cache
//!
//! Bounded LRU with a time-to-live measured from insertion. Each `get`/`put`
//! holds the lock for its whole duration; two requests racing on the same
//! cold key may both synthesize and the later `put` wins.

use crate::audio::{AudioMime, OutputFormat};
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Every parameter that influences the produced bytes, fully resolved
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub voice: String,
    pub text: String,
    pub format: OutputFormat,
    /// `f32::to_bits` of the numeric parameters
    pub length_scale: u32,
    pub noise_scale: u32,
    pub noise_w: u32,
    pub sentence_silence: u32,
    pub speaker: u32,
    pub normalize: bool,
    pub bitrate: String,
    pub preset: String,
}

/// Immutable cached audio
#[derive(Debug, Clone)]
pub struct CachedAudio {
    pub bytes: Arc<[u8]>,
    pub mime: AudioMime,
}

#[derive(Debug)]
struct Slot {
    audio: CachedAudio,
    inserted: Instant,
}

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// Point-in-time view for health and metrics output
#[derive(Debug, Clone, Serialize)]
pub struct CacheSnapshot {
    pub items: usize,
    pub capacity: usize,
    pub ttl_sec: u64,
    pub hits: u64,
    pub misses: u64,
}

pub struct SynthesisCache {
    entries: Mutex<LruCache<CacheKey, Slot>>,
    capacity: usize,
    ttl: Duration,
    stats: CacheStats,
}

impl SynthesisCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
            capacity: cap.get(),
            ttl,
            stats: CacheStats::default(),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CachedAudio> {
        let mut entries = self.entries.lock();

        let expired = match entries.peek(key) {
            Some(slot) => slot.inserted.elapsed() >= self.ttl,
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if expired {
            entries.pop(key);
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        self.stats.hits.fetch_add(1, Ordering::Relaxed);
        entries.get(key).map(|slot| slot.audio.clone())
    }

    /// Insert or overwrite; evicts the least recently used entry when full
    pub fn put(&self, key: CacheKey, audio: CachedAudio) {
        self.entries.lock().put(
            key,
            Slot {
                audio,
                inserted: Instant::now(),
            },
        );
    }

    /// Live (unexpired) entries
    pub fn len(&self) -> usize {
        let mut entries = self.entries.lock();
        Self::purge_expired(&mut entries, self.ttl);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            items: self.len(),
            capacity: self.capacity,
            ttl_sec: self.ttl.as_secs(),
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
        }
    }

    fn purge_expired(entries: &mut LruCache<CacheKey, Slot>, ttl: Duration) {
        // Expiry is independent of use order
        let stale: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, slot)| slot.inserted.elapsed() >= ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            entries.pop(&key);
        }
    }
}
