//! Two-tier cache building blocks.
//!
//! ## Core Concepts
//! - **`ByteView`**: immutable value wrapper; defensive copy on export.
//! - **`LruCache`**: the unlocked LRU engine with recency order, an optional
//!   entry cap, per-entry expiry, and an eviction callback.
//! - **`ByteCache`**: the concurrent shell every group tier actually uses.
//!   Lazily builds the engine on first write and tracks the byte footprint
//!   the group budget is enforced against.

pub mod byte_view;
pub mod lru;
pub mod shell;

pub use byte_view::ByteView;
pub use lru::{EvictFn, LruCache, NowFn};
pub use shell::ByteCache;
