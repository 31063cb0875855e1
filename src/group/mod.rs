//! Group controller.
//!
//! A group is one named cache universe: an origin loader, a byte budget, and
//! two tiers. `main` holds keys this node owns per the hash ring; `hot`
//! mirrors remote-owned keys that were fetched recently, so a popular key
//! does not turn its owner's network link into a hotspot.
//!
//! ## Read path
//! `query` checks both tiers, then collapses concurrent misses behind a
//! single flight: re-check the tiers, try the owning peer, fall back to the
//! origin loader. Peer-side failures never fail the read; only an origin
//! failure does.

use crate::cache::{ByteCache, ByteView};
use crate::error::{CacheError, Result};
use crate::flight::FlightGroup;
use crate::peer::protocol::{expire_to_nanos, KeyRequest, SetRequest};
use crate::peer::{PeerClient, PeerPicker};
use async_trait::async_trait;
use std::future::Future;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::SystemTime;
use tokio::task::JoinSet;

pub mod registry;

pub use registry::Registry;

#[cfg(test)]
mod tests;

/// Supplies the canonical value for a key when no cached copy exists.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, key: &str) -> anyhow::Result<Vec<u8>>;
}

struct FnLoader<F>(F);

#[async_trait]
impl<F, Fut> Loader for FnLoader<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Vec<u8>>> + Send,
{
    async fn load(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        (self.0)(key.to_string()).await
    }
}

/// Wraps an async closure as a [`Loader`].
pub fn loader_fn<F, Fut>(f: F) -> Arc<dyn Loader>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Vec<u8>>> + Send + 'static,
{
    Arc::new(FnLoader(f))
}

/// Which tier a local write lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Authoritative tier: keys this node owns per the ring.
    Main,
    /// Mirror tier: remote-owned keys cached here after a peer fetch.
    Hot,
}

pub struct Group {
    name: String,
    loader: Arc<dyn Loader>,
    /// Combined budget over both tiers; zero or negative disables caching.
    cache_bytes: i64,
    main_cache: ByteCache,
    hot_cache: ByteCache,
    picker_slot: Arc<registry::PickerSlot>,
    /// Resolved picker, installed on first use and read lock-free after.
    picker: OnceLock<Arc<dyn PeerPicker>>,
    load_flights: FlightGroup<ByteView>,
    set_flights: FlightGroup<()>,
    remove_flights: FlightGroup<()>,
    /// Serializes local cache mutation: a completing load, a local set, and
    /// a local remove for the same group never interleave. Held only across
    /// the synchronous tier operations.
    write_gate: Mutex<()>,
}

impl Group {
    pub(crate) fn new(
        name: &str,
        cache_bytes: i64,
        loader: Arc<dyn Loader>,
        picker_slot: Arc<registry::PickerSlot>,
    ) -> Self {
        Self {
            name: name.to_string(),
            loader,
            cache_bytes,
            main_cache: ByteCache::new(),
            hot_cache: ByteCache::new(),
            picker_slot,
            picker: OnceLock::new(),
            load_flights: FlightGroup::new(),
            set_flights: FlightGroup::new(),
            remove_flights: FlightGroup::new(),
            write_gate: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes held by the (main, hot) tiers.
    pub fn tier_bytes(&self) -> (i64, i64) {
        (self.main_cache.bytes(), self.hot_cache.bytes())
    }

    /// Looks up `key`, loading it from a peer or the origin on a miss.
    ///
    /// The empty key resolves to the empty view without error.
    pub async fn query(&self, key: &str) -> Result<ByteView> {
        self.peers();
        if key.is_empty() {
            return Ok(ByteView::default());
        }
        if let Some(view) = self.lookup_cache(key) {
            tracing::debug!("group {}: cache hit for {:?}", self.name, key);
            return Ok(view);
        }
        tracing::debug!("group {}: cache miss for {:?}", self.name, key);
        self.load(key).await
    }

    /// Writes `key` through to its owner. When a remote peer owns the key
    /// the value is sent there; `mirror` additionally keeps a local hot-tier
    /// copy. When this node owns the key the value lands in the main tier.
    pub async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        expire: Option<SystemTime>,
        mirror: bool,
    ) -> Result<()> {
        self.peers();
        if key.is_empty() {
            return Err(CacheError::EmptyKey);
        }

        self.set_flights
            .run(key, || async {
                if let Some(peer) = self.peers().pick_peer(key) {
                    let req = SetRequest {
                        group: self.name.clone(),
                        key: key.to_string(),
                        value: value.clone(),
                        expire: expire_to_nanos(expire),
                    };
                    peer.store(&req).await?;
                    if mirror {
                        self.local_set(key, ByteView::from(value.clone()), expire, Tier::Hot);
                    }
                    return Ok(());
                }
                self.local_set(key, ByteView::from(value.clone()), expire, Tier::Main);
                Ok(())
            })
            .await
    }

    /// Deletes `key` everywhere: on its owner, locally, and then, fanning
    /// out concurrently, on every other known peer, so stale mirrors go now
    /// instead of aging out.
    ///
    /// The local deletion is never rolled back; peer-side failures are
    /// aggregated into [`CacheError::FanOut`].
    pub async fn remove(&self, key: &str) -> Result<()> {
        self.peers();
        if key.is_empty() {
            return Err(CacheError::EmptyKey);
        }

        self.remove_flights
            .run(key, || async {
                let req = KeyRequest {
                    group: self.name.clone(),
                    key: key.to_string(),
                };

                let owner = self.peers().pick_peer(key);
                if let Some(owner) = &owner {
                    owner.remove(&req).await?;
                }
                self.local_remove(key);

                let owner_addr = owner.map(|peer| peer.addr().to_string());
                let mut fanout = JoinSet::new();
                for peer in self.peers().get_all() {
                    if Some(peer.addr()) == owner_addr.as_deref() {
                        continue;
                    }
                    let req = req.clone();
                    fanout.spawn(async move { peer.remove(&req).await });
                }

                let mut failures = Vec::new();
                while let Some(joined) = fanout.join_next().await {
                    match joined {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => failures.push(e),
                        Err(e) => failures.push(CacheError::Internal(format!(
                            "fan-out task failed: {}",
                            e
                        ))),
                    }
                }
                if failures.is_empty() {
                    Ok(())
                } else {
                    Err(CacheError::FanOut(failures))
                }
            })
            .await
    }

    /// Places a value in the given tier, enforcing the byte budget. Used by
    /// the local write path of [`Group::set`] and by peer-dispatched Sets.
    pub fn local_set(
        &self,
        key: &str,
        value: ByteView,
        expire: Option<SystemTime>,
        tier: Tier,
    ) {
        if self.cache_bytes <= 0 {
            return;
        }
        self.populate_cache(key, value, expire, tier);
    }

    /// Drops `key` from both tiers. Used by [`Group::remove`] and by
    /// peer-dispatched Deletes.
    pub fn local_remove(&self, key: &str) {
        if self.cache_bytes <= 0 {
            return;
        }
        let _gate = self.write_gate.lock().expect("write gate poisoned");
        self.hot_cache.remove(key);
        self.main_cache.remove(key);
    }

    /// Collapses concurrent misses for one key into a single load.
    async fn load(&self, key: &str) -> Result<ByteView> {
        self.load_flights
            .run(key, || async {
                // Another caller may have populated the tiers while this one
                // waited for the flight slot.
                if let Some(view) = self.lookup_cache(key) {
                    return Ok(view);
                }

                if let Some(peer) = self.peers().pick_peer(key) {
                    match self.fetch_from_peer(peer.as_ref(), key).await {
                        Ok(view) => return Ok(view),
                        Err(e) => {
                            tracing::warn!(
                                "group {}: peer fetch for {:?} failed, trying origin: {}",
                                self.name,
                                key,
                                e
                            );
                        }
                    }
                }

                self.load_from_origin(key).await
            })
            .await
    }

    async fn fetch_from_peer(&self, peer: &dyn PeerClient, key: &str) -> Result<ByteView> {
        let req = KeyRequest {
            group: self.name.clone(),
            key: key.to_string(),
        };
        let view = peer.fetch(&req).await?;
        // Every remote fetch is mirrored; entries carry no expiry of their
        // own and age out via LRU pressure.
        self.populate_cache(key, view.clone(), None, Tier::Hot);
        Ok(view)
    }

    async fn load_from_origin(&self, key: &str) -> Result<ByteView> {
        let bytes = self
            .loader
            .load(key)
            .await
            .map_err(|e| CacheError::OriginMiss {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        let view = ByteView::from(bytes);
        self.populate_cache(key, view.clone(), None, Tier::Main);
        Ok(view)
    }

    fn lookup_cache(&self, key: &str) -> Option<ByteView> {
        if self.cache_bytes <= 0 {
            return None;
        }
        self.main_cache.get(key).or_else(|| self.hot_cache.get(key))
    }

    /// Adds to the selected tier, then evicts until both tiers fit the
    /// budget again. The hot tier gives way first whenever it exceeds an
    /// eighth of the main tier, capping the mirror share; each eviction
    /// strictly shrinks the total, so the loop terminates.
    fn populate_cache(
        &self,
        key: &str,
        value: ByteView,
        expire: Option<SystemTime>,
        tier: Tier,
    ) {
        if self.cache_bytes <= 0 {
            return;
        }
        let _gate = self.write_gate.lock().expect("write gate poisoned");

        let target = match tier {
            Tier::Main => &self.main_cache,
            Tier::Hot => &self.hot_cache,
        };
        target.add(key, value, expire);

        loop {
            let (main_bytes, hot_bytes) = (self.main_cache.bytes(), self.hot_cache.bytes());
            if main_bytes + hot_bytes <= self.cache_bytes {
                return;
            }
            if hot_bytes > main_bytes / 8 {
                self.hot_cache.remove_oldest();
            } else {
                self.main_cache.remove_oldest();
            }
        }
    }

    /// Resolves the peer picker on first use; lock-free reads afterward.
    /// Groups queried before a picker is registered stay standalone.
    fn peers(&self) -> &Arc<dyn PeerPicker> {
        self.picker
            .get_or_init(|| self.picker_slot.resolve())
    }
}
