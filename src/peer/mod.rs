//! Peer abstraction and RPC plumbing.
//!
//! ## Core Concepts
//! - **`PeerClient`**: the three-operation contract (Get/Set/Delete) a group
//!   uses to talk to one remote peer.
//! - **`PeerPicker`**: key -> owning peer selection plus full enumeration for
//!   the remove fan-out. `NoPeers` is the standalone-node fallback.
//! - **`PeerPool`**: the production picker, a consistent-hash ring over the
//!   configured peer set with one long-lived client per address.
//! - **`protocol`/`server`/`client`**: the bincode-over-HTTP wire layer.

pub mod client;
pub mod picker;
pub mod protocol;
pub mod server;

pub use client::HttpPeer;
pub use picker::PeerPool;

use crate::cache::ByteView;
use crate::error::Result;
use async_trait::async_trait;
use protocol::{KeyRequest, SetRequest};
use std::sync::Arc;

/// The peer RPC contract. Implemented against a remote address; every call
/// carries its own client-side deadline.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// `host:port` identity of the remote peer.
    fn addr(&self) -> &str;

    /// Asks the peer to resolve `req.key` in `req.group` and return the
    /// value bytes.
    async fn fetch(&self, req: &KeyRequest) -> Result<ByteView>;

    /// Writes a value into the owning peer's authoritative tier.
    async fn store(&self, req: &SetRequest) -> Result<()>;

    /// Deletes the key from both of the peer's tiers.
    async fn remove(&self, req: &KeyRequest) -> Result<()>;
}

/// Selects the peer responsible for a key.
pub trait PeerPicker: Send + Sync {
    /// Returns the owning peer when one exists and is not the current node;
    /// `None` sends the caller down the local path.
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerClient>>;

    /// Every known peer, for fan-out operations.
    fn get_all(&self) -> Vec<Arc<dyn PeerClient>>;
}

/// Picker used until a real peer pool is registered: every key is local.
pub struct NoPeers;

impl PeerPicker for NoPeers {
    fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerClient>> {
        None
    }

    fn get_all(&self) -> Vec<Arc<dyn PeerClient>> {
        Vec::new()
    }
}
