use super::client::HttpPeer;
use super::{PeerClient, PeerPicker};
use crate::ring::{HashFn, HashRing};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Default virtual-node count per peer.
pub const DEFAULT_REPLICAS: usize = 50;

/// Production peer picker: a consistent-hash ring over the configured peer
/// addresses plus one long-lived client per address.
///
/// Membership is injected through [`PeerPool::set_peers`], which rebuilds
/// ring and client table together under the pool lock, so a concurrent
/// `pick_peer` never observes a ring entry without its client.
pub struct PeerPool {
    /// This node's own `host:port`; keys the ring maps here take the local
    /// path.
    self_addr: String,
    replicas: usize,
    hash_fn: Option<HashFn>,
    http: reqwest::Client,
    state: Mutex<PoolState>,
}

struct PoolState {
    ring: HashRing,
    clients: HashMap<String, Arc<HttpPeer>>,
}

impl PeerPool {
    /// Creates a pool with its own HTTP transport. `replicas` of zero
    /// selects the default; `hash_fn` of `None` selects the default hash.
    pub fn new(self_addr: &str, replicas: usize, hash_fn: Option<HashFn>) -> Self {
        Self::new_with_client(self_addr, replicas, hash_fn, reqwest::Client::new())
    }

    /// Like [`PeerPool::new`] with an injected transport, shared by every
    /// peer client the pool builds.
    pub fn new_with_client(
        self_addr: &str,
        replicas: usize,
        hash_fn: Option<HashFn>,
        http: reqwest::Client,
    ) -> Self {
        if !valid_peer_addr(self_addr) {
            panic!(
                "[peer {}] invalid address format, expected host:port",
                self_addr
            );
        }
        let replicas = if replicas == 0 {
            DEFAULT_REPLICAS
        } else {
            replicas
        };
        Self {
            self_addr: self_addr.to_string(),
            replicas,
            hash_fn,
            http,
            state: Mutex::new(PoolState {
                ring: HashRing::new(replicas, hash_fn),
                clients: HashMap::new(),
            }),
        }
    }

    /// Replaces the peer set, rebuilding the ring and the client table.
    ///
    /// Addresses must be `host:port`; a malformed address is a programmer
    /// error and panics. The current node is identified by equality with
    /// `self_addr` and participates in the ring like any other peer.
    pub fn set_peers<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let peers: Vec<String> = peers.into_iter().map(|p| p.as_ref().to_string()).collect();
        for peer in &peers {
            if !valid_peer_addr(peer) {
                panic!("[peer {}] invalid address format, expected host:port", peer);
            }
        }

        let mut ring = HashRing::new(self.replicas, self.hash_fn);
        ring.add_nodes(&peers);

        let clients = peers
            .iter()
            .map(|addr| {
                (
                    addr.clone(),
                    Arc::new(HttpPeer::new(addr, self.http.clone())),
                )
            })
            .collect();

        let mut state = self.state.lock().expect("peer pool lock poisoned");
        state.ring = ring;
        state.clients = clients;
        tracing::info!("peer set updated: {} peer(s)", peers.len());
    }

    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }
}

impl PeerPicker for PeerPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerClient>> {
        let state = self.state.lock().expect("peer pool lock poisoned");
        let owner = state.ring.find_node(key)?;
        if owner == self.self_addr {
            return None;
        }
        tracing::debug!("key {:?} owned by peer {}", key, owner);
        let client = state
            .clients
            .get(owner)
            .expect("ring node without client")
            .clone();
        Some(client)
    }

    fn get_all(&self) -> Vec<Arc<dyn PeerClient>> {
        let state = self.state.lock().expect("peer pool lock poisoned");
        state
            .clients
            .values()
            .map(|c| c.clone() as Arc<dyn PeerClient>)
            .collect()
    }
}

/// Accepts `host:port` where host is `localhost` or a literal IP address.
fn valid_peer_addr(addr: &str) -> bool {
    let Some((host, port)) = addr.rsplit_once(':') else {
        return false;
    };
    if port.parse::<u16>().is_err() {
        return false;
    }
    host == "localhost" || host.parse::<std::net::IpAddr>().is_ok()
}
