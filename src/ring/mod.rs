//! Consistent-hash ring for peer selection.
//!
//! Each physical node is projected onto the ring as `replicas` virtual nodes
//! so keys spread evenly even with few peers. Lookup walks clockwise to the
//! first virtual node at or past the key's hash, wrapping at the end.
//!
//! Membership is append-only per ring instance; shrinking the cluster means
//! building a fresh ring, which is what [`crate::peer::PeerPool::set_peers`]
//! does on every update.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::Hasher;

/// Maps raw bytes to a 32-bit ring position.
pub type HashFn = fn(&[u8]) -> u32;

/// Default ring hash: the standard hasher truncated to 32 bits.
fn default_hash(data: &[u8]) -> u32 {
    let mut hasher = DefaultHasher::new();
    hasher.write(data);
    hasher.finish() as u32
}

pub struct HashRing {
    hash_fn: HashFn,
    /// Virtual nodes per physical node.
    replicas: usize,
    /// Sorted virtual-node hashes.
    ring: Vec<u32>,
    /// Virtual-node hash -> physical node name.
    nodes: HashMap<u32, String>,
}

impl HashRing {
    /// Creates an empty ring. `hash_fn` of `None` selects the default
    /// 32-bit hash.
    pub fn new(replicas: usize, hash_fn: Option<HashFn>) -> Self {
        Self {
            hash_fn: hash_fn.unwrap_or(default_hash),
            replicas,
            ring: Vec::new(),
            nodes: HashMap::new(),
        }
    }

    /// Adds physical nodes, projecting each onto `replicas` ring positions.
    ///
    /// Virtual node `i` of node `name` hashes the ASCII concatenation
    /// `"{i}{name}"`. The ring is re-sorted after insertion, so adding in any
    /// order yields the same ring.
    pub fn add_nodes<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref();
            for i in 0..self.replicas {
                let virtual_key = format!("{}{}", i, name);
                let hash = (self.hash_fn)(virtual_key.as_bytes());
                self.ring.push(hash);
                self.nodes.insert(hash, name.to_string());
            }
        }
        self.ring.sort_unstable();
    }

    /// Returns the node owning `key`, or `None` on an empty ring.
    pub fn find_node(&self, key: &str) -> Option<&str> {
        if self.ring.is_empty() {
            return None;
        }
        let hash = (self.hash_fn)(key.as_bytes());
        let mut idx = self.ring.partition_point(|&h| h < hash);
        if idx == self.ring.len() {
            idx = 0;
        }
        self.nodes.get(&self.ring[idx]).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}
