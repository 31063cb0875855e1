use super::byte_view::ByteView;
use super::lru::LruCache;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

/// Thread-safe byte-budget facade over [`LruCache`].
///
/// The inner engine is created lazily on the first add, so a zero-configured
/// cache occupies no memory. `nbytes` tracks `len(key) + value.len()` summed
/// over all live entries; the eviction callback wired into the engine keeps
/// the ledger exact through cap eviction, removal, and expiry-on-access.
///
/// All mutators take the write lock. `bytes()` reads the atomic ledger,
/// which is only updated while the write lock is held, so readers observe
/// quiescent values.
#[derive(Default)]
pub struct ByteCache {
    inner: RwLock<Option<LruCache>>,
    nbytes: Arc<AtomicI64>,
}

impl ByteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or updates `key`, charging the ledger for the new entry and
    /// refunding any displaced previous value.
    pub fn add(&self, key: &str, value: ByteView, expire: Option<SystemTime>) {
        let mut guard = self.inner.write().expect("cache lock poisoned");
        let lru = guard.get_or_insert_with(|| {
            let ledger = Arc::clone(&self.nbytes);
            LruCache::new(
                0,
                Some(Box::new(move |key: &str, value: &ByteView| {
                    ledger.fetch_sub(entry_bytes(key, value), Ordering::Relaxed);
                })),
            )
        });

        let charge = entry_bytes(key, &value);
        if let Some(old) = lru.add(key, value, expire) {
            self.nbytes
                .fetch_sub(entry_bytes(key, &old), Ordering::Relaxed);
        }
        self.nbytes.fetch_add(charge, Ordering::Relaxed);
    }

    /// Looks up `key`. Promotion and expiry-on-access mutate the engine, so
    /// this takes the write lock.
    pub fn get(&self, key: &str) -> Option<ByteView> {
        let mut guard = self.inner.write().expect("cache lock poisoned");
        guard.as_mut()?.get(key)
    }

    pub fn remove(&self, key: &str) {
        let mut guard = self.inner.write().expect("cache lock poisoned");
        if let Some(lru) = guard.as_mut() {
            lru.remove(key);
        }
    }

    pub fn remove_oldest(&self) {
        let mut guard = self.inner.write().expect("cache lock poisoned");
        if let Some(lru) = guard.as_mut() {
            lru.remove_oldest();
        }
    }

    /// Combined size of all live keys and values.
    pub fn bytes(&self) -> i64 {
        self.nbytes.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.read().expect("cache lock poisoned");
        guard.as_ref().map(LruCache::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn entry_bytes(key: &str, value: &ByteView) -> i64 {
    (key.len() + value.len()) as i64
}
