//! Error types for the cache cluster.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors surfaced by cache groups and the peer transport.
///
/// Variants carry rendered messages rather than error sources so a result can
/// be cloned to every waiter coalesced behind a single in-flight call.
///
/// Duplicate group registration and malformed peer addresses are programmer
/// errors and panic instead of appearing here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// Caller supplied an empty key where one is required.
    #[error("empty key not allowed")]
    EmptyKey,

    /// An RPC named a group that is not registered on this node.
    #[error("no such group: {0}")]
    GroupUnknown(String),

    /// Transport or dial failure talking to a peer.
    #[error("peer {addr} unavailable: {reason}")]
    PeerUnavailable { addr: String, reason: String },

    /// The peer answered, but the exchange could not be encoded or decoded.
    #[error("peer {addr} protocol error: {reason}")]
    PeerProtocol { addr: String, reason: String },

    /// The per-call deadline elapsed before the peer answered.
    #[error("peer {addr} timed out after {millis}ms")]
    Timeout { addr: String, millis: u64 },

    /// The origin loader failed to produce a value for the key.
    #[error("origin load failed for {key:?}: {reason}")]
    OriginMiss { key: String, reason: String },

    /// One or more peers failed during a remove fan-out. The local deletion
    /// has already happened; the composite lists every peer-side failure.
    #[error("remove fan-out failed on {} peer(s): [{}]", .0.len(), join_errors(.0))]
    FanOut(Vec<CacheError>),

    /// Invariant violation inside the cache machinery itself.
    #[error("internal error: {0}")]
    Internal(String),
}

fn join_errors(errors: &[CacheError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
