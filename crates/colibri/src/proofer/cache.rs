//! Two-tier proofer cache.
//!
//! Each context owns a local map; entries move to the process-wide cache
//! when the context is dropped. Global entries carry an expiry timestamp and
//! a `use_counter` pin: readers holding an entry keep it alive through
//! cleanup, invalidation zeroes the timestamp so readers skip it.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use once_cell::sync::Lazy;

const GLOBAL_CAP_BYTES: usize = 64 * 1024 * 1024;

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

#[derive(Debug, Clone)]
struct Entry {
    value: Bytes,
    /// Expiry time in unix seconds; 0 means invalidated.
    timestamp: u64,
}

#[derive(Debug)]
struct GlobalEntry {
    key: String,
    value: Bytes,
    timestamp: u64,
    use_counter: u32,
}

#[derive(Default)]
struct GlobalCache {
    entries: Vec<GlobalEntry>,
}

impl GlobalCache {
    fn total_bytes(&self) -> usize {
        self.entries.iter().map(|e| e.value.len()).sum()
    }

    fn acquire(&mut self, key: &str) -> Option<Bytes> {
        let now = now_secs();
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.key == key && e.timestamp != 0 && e.timestamp >= now)?;
        entry.use_counter += 1;
        Some(entry.value.clone())
    }

    fn release(&mut self, key: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
            entry.use_counter = entry.use_counter.saturating_sub(1);
        }
    }

    fn insert(&mut self, key: String, value: Bytes, timestamp: u64) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.key == key) {
            existing.value = value;
            existing.timestamp = timestamp;
            return;
        }
        self.entries.push(GlobalEntry { key, value, timestamp, use_counter: 0 });
        self.cleanup();
    }

    fn invalidate(&mut self, key: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
            entry.timestamp = 0;
        }
    }

    /// Evict expired or invalidated entries, then trim oldest-expiring
    /// entries down to the cap. Pinned entries are never evicted.
    fn cleanup(&mut self) {
        let now = now_secs();
        self.entries.retain(|e| e.use_counter > 0 || (e.timestamp != 0 && e.timestamp >= now));
        while self.total_bytes() > GLOBAL_CAP_BYTES {
            let victim = self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, e)| e.use_counter == 0)
                .min_by_key(|(_, e)| e.timestamp)
                .map(|(i, _)| i);
            match victim {
                Some(i) => {
                    self.entries.remove(i);
                }
                None => break,
            }
        }
    }
}

static GLOBAL: Lazy<Mutex<GlobalCache>> = Lazy::new(|| Mutex::new(GlobalCache::default()));

/// Per-context cache front end.
#[derive(Default, Debug)]
pub struct ProoferCache {
    local: HashMap<String, Entry>,
    acquired: Vec<String>,
    /// Worker-flagged contexts must not touch the global tier.
    pub global_writes_allowed: bool,
}

impl ProoferCache {
    pub fn new(global_writes_allowed: bool) -> Self {
        Self { local: HashMap::new(), acquired: Vec::new(), global_writes_allowed }
    }

    pub fn get(&mut self, key: &str) -> Option<Bytes> {
        let now = now_secs();
        if let Some(entry) = self.local.get(key) {
            if entry.timestamp != 0 && entry.timestamp >= now {
                return Some(entry.value.clone());
            }
        }
        if !self.global_writes_allowed {
            return None;
        }
        let value = GLOBAL.lock().unwrap().acquire(key)?;
        self.acquired.push(key.to_string());
        Some(value)
    }

    pub fn put(&mut self, key: &str, value: Bytes, ttl_secs: u64) {
        self.local
            .insert(key.to_string(), Entry { value, timestamp: now_secs() + ttl_secs });
    }

    pub fn invalidate(key: &str) {
        GLOBAL.lock().unwrap().invalidate(key);
    }
}

impl Drop for ProoferCache {
    fn drop(&mut self) {
        let mut global = GLOBAL.lock().unwrap();
        for key in self.acquired.drain(..) {
            global.release(&key);
        }
        if self.global_writes_allowed {
            for (key, entry) in self.local.drain() {
                if entry.timestamp != 0 {
                    global.insert(key, entry.value, entry.timestamp);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_roundtrip() {
        let mut cache = ProoferCache::new(false);
        cache.put("k", Bytes::from_static(b"v"), 60);
        assert_eq!(cache.get("k").unwrap(), Bytes::from_static(b"v"));
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn test_promotion_to_global_on_drop() {
        let key = "promote-test-key";
        {
            let mut cache = ProoferCache::new(true);
            cache.put(key, Bytes::from_static(b"shared"), 60);
        }
        let mut fresh = ProoferCache::new(true);
        assert_eq!(fresh.get(key).unwrap(), Bytes::from_static(b"shared"));
        ProoferCache::invalidate(key);
        let mut after = ProoferCache::new(true);
        assert!(after.get(key).is_none());
    }

    #[test]
    fn test_worker_context_stays_local() {
        let key = "worker-local-key";
        {
            let mut cache = ProoferCache::new(false);
            cache.put(key, Bytes::from_static(b"w"), 60);
        }
        let mut fresh = ProoferCache::new(true);
        assert!(fresh.get(key).is_none());
    }

    #[test]
    fn test_invalidated_entries_are_skipped() {
        let mut global = GlobalCache::default();
        global.insert("x".into(), Bytes::from_static(b"1"), now_secs() + 100);
        assert!(global.acquire("x").is_some());
        global.invalidate("x");
        assert!(global.acquire("x").is_none());
    }

    #[test]
    fn test_pinned_entries_survive_cleanup() {
        let mut global = GlobalCache::default();
        global.insert("pinned".into(), Bytes::from_static(b"1"), now_secs() + 100);
        assert!(global.acquire("pinned").is_some());
        // Expire it while pinned.
        global.entries.iter_mut().for_each(|e| e.timestamp = 1);
        global.cleanup();
        assert_eq!(global.entries.len(), 1);
        global.release("pinned");
        global.cleanup();
        assert!(global.entries.is_empty());
    }
}
