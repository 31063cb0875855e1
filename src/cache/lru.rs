use super::byte_view::ByteView;
use std::collections::HashMap;
use std::time::SystemTime;

/// Clock used to decide entry expiry. Injectable for deterministic tests.
pub type NowFn = fn() -> SystemTime;

/// Callback invoked exactly once for every entry leaving the cache, whether
/// through cap eviction, explicit removal, or expiry-on-access.
pub type EvictFn = Box<dyn Fn(&str, &ByteView) + Send + Sync>;

/// A single entry plus its position in the recency list.
///
/// Adjacency is tracked by key: `prev` points toward the head (more recently
/// used), `next` toward the tail (the eviction candidate).
struct Slot {
    value: ByteView,
    expire: Option<SystemTime>,
    prev: Option<String>,
    next: Option<String>,
}

/// LRU engine: ordered key/value store with an optional entry cap and
/// per-entry expiry.
///
/// The recency order is a doubly-linked list threaded through the map by key,
/// giving O(1) lookup, promotion, and tail eviction without unsafe code.
///
/// Not internally synchronized; always accessed through [`super::ByteCache`].
pub struct LruCache {
    /// Maximum number of entries; zero means unbounded.
    max_entries: usize,
    map: HashMap<String, Slot>,
    /// Most recently used key.
    head: Option<String>,
    /// Least recently used key, evicted first.
    tail: Option<String>,
    on_evicted: Option<EvictFn>,
    now: NowFn,
}

impl LruCache {
    pub fn new(max_entries: usize, on_evicted: Option<EvictFn>) -> Self {
        Self::new_with_clock(max_entries, on_evicted, SystemTime::now)
    }

    /// Like [`LruCache::new`] but with an explicit clock.
    pub fn new_with_clock(max_entries: usize, on_evicted: Option<EvictFn>, now: NowFn) -> Self {
        Self {
            max_entries,
            map: HashMap::new(),
            head: None,
            tail: None,
            on_evicted,
            now,
        }
    }

    /// Looks up `key`, promoting it to most recently used on a hit.
    ///
    /// An entry whose expiry lies strictly before the current clock reading
    /// is evicted on the spot and reported as a miss.
    pub fn get(&mut self, key: &str) -> Option<ByteView> {
        let expired = {
            let slot = self.map.get(key)?;
            slot.expire.is_some_and(|at| at < (self.now)())
        };
        if expired {
            self.remove(key);
            return None;
        }
        self.promote(key);
        self.map.get(key).map(|slot| slot.value.clone())
    }

    /// Inserts `key`, or updates it in place when already present, promoting
    /// it to most recently used either way. `expire` of `None` means never.
    ///
    /// Returns the displaced previous value on an in-place update so the
    /// caller can keep its byte accounting exact. After an insert the entry
    /// cap is enforced by evicting from the tail.
    pub fn add(
        &mut self,
        key: &str,
        value: ByteView,
        expire: Option<SystemTime>,
    ) -> Option<ByteView> {
        if self.map.contains_key(key) {
            self.promote(key);
            let slot = self
                .map
                .get_mut(key)
                .expect("promoted key must be present");
            slot.expire = expire;
            return Some(std::mem::replace(&mut slot.value, value));
        }

        let old_head = self.attach_front(key);
        self.map.insert(
            key.to_string(),
            Slot {
                value,
                expire,
                prev: None,
                next: old_head,
            },
        );

        while self.max_entries != 0 && self.map.len() > self.max_entries {
            self.remove_oldest();
        }
        None
    }

    /// Evicts `key` if present; no-op otherwise.
    pub fn remove(&mut self, key: &str) {
        if !self.map.contains_key(key) {
            return;
        }
        self.detach(key);
        let slot = self.map.remove(key).expect("detached key must be present");
        if let Some(on_evicted) = &self.on_evicted {
            on_evicted(key, &slot.value);
        }
    }

    /// Evicts the least recently used entry, if any.
    pub fn remove_oldest(&mut self) {
        if let Some(oldest) = self.tail.clone() {
            self.remove(&oldest);
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Makes `key` the new head and returns the displaced head, which
    /// becomes the new entry's `next`. The caller inserts the map entry.
    fn attach_front(&mut self, key: &str) -> Option<String> {
        let old_head = self.head.replace(key.to_string());
        if let Some(h) = &old_head {
            self.map
                .get_mut(h)
                .expect("head key must be present")
                .prev = Some(key.to_string());
        }
        if self.tail.is_none() {
            self.tail = Some(key.to_string());
        }
        old_head
    }

    /// Moves an existing entry to the head of the recency list.
    fn promote(&mut self, key: &str) {
        if self.head.as_deref() == Some(key) {
            return;
        }
        self.detach(key);
        let old_head = self.head.replace(key.to_string());
        if let Some(h) = &old_head {
            self.map
                .get_mut(h)
                .expect("head key must be present")
                .prev = Some(key.to_string());
        }
        let slot = self.map.get_mut(key).expect("promoted key must be present");
        slot.prev = None;
        slot.next = old_head;
    }

    /// Unlinks `key` from the recency list, repairing its neighbors and the
    /// head/tail markers. The map entry itself is left untouched.
    fn detach(&mut self, key: &str) {
        let (prev, next) = match self.map.get(key) {
            Some(slot) => (slot.prev.clone(), slot.next.clone()),
            None => return,
        };
        match &prev {
            Some(p) => {
                self.map
                    .get_mut(p)
                    .expect("linked key must be present")
                    .next = next.clone();
            }
            None => self.head = next.clone(),
        }
        match &next {
            Some(n) => {
                self.map
                    .get_mut(n)
                    .expect("linked key must be present")
                    .prev = prev.clone();
            }
            None => self.tail = prev,
        }
    }
}
