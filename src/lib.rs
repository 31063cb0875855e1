//! Peer-to-peer distributed in-memory cache.
//!
//! Each node owns an authoritative subset of keys, decided by consistent
//! hashing over the configured peer set, and transiently mirrors hot remote
//! keys. A caller-supplied origin loader produces values no cached copy
//! exists for.
//!
//! ## Architecture Modules
//!
//! - **`cache`**: the LRU engine, the immutable `ByteView` value type, and
//!   the concurrent byte-budget shell each group tier is built from.
//! - **`flight`**: single-flight coalescing; concurrent identical requests
//!   collapse into one in-flight call.
//! - **`ring`**: the consistent-hash ring mapping keys to owning peers via
//!   virtual nodes.
//! - **`peer`**: the peer RPC contract (Get/Set/Delete), its bincode-over-HTTP
//!   client and server, and the `PeerPool` picker.
//! - **`group`**: the controller tying it together. Two-tier lookup, the
//!   load path (local, then peer, then origin), write propagation, and
//!   distributed deletion with fan-out.
//! - **`api`**: the front-end HTTP surface end users talk to.

pub mod api;
pub mod cache;
pub mod error;
pub mod flight;
pub mod group;
pub mod peer;
pub mod ring;

pub use cache::ByteView;
pub use error::{CacheError, Result};
pub use group::{loader_fn, Group, Loader, Registry, Tier};
pub use peer::{PeerPicker, PeerPool};
