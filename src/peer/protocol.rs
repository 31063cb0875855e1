//! Peer RPC wire protocol.
//!
//! Defines the endpoints and message envelopes used between cache nodes.
//! Bodies are bincode-encoded and travel as raw HTTP POST payloads; the
//! response to a Get is a bincode [`GetResponse`], Set and Delete answer
//! with an empty acknowledgment.
//!
//! Compatibility-critical details: `expire` is nanoseconds since the Unix
//! epoch with `0` meaning "never"; `value` is raw bytes; `group` and `key`
//! are UTF-8.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// --- Endpoints ---

/// Resolve a key through the target group (may recurse into its load path).
pub const ENDPOINT_GET: &str = "/_cache/get";
/// Write a value into the target node's authoritative tier.
pub const ENDPOINT_SET: &str = "/_cache/set";
/// Drop a key from both of the target node's tiers.
pub const ENDPOINT_DELETE: &str = "/_cache/delete";

// --- Envelopes ---

/// Envelope shared by Get and Delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRequest {
    pub group: String,
    pub key: String,
}

/// Envelope for Set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetRequest {
    pub group: String,
    pub key: String,
    pub value: Vec<u8>,
    /// Nanoseconds since the Unix epoch; `0` means no expiry.
    pub expire: i64,
}

/// Response to a successful Get.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetResponse {
    pub value: Vec<u8>,
}

// --- Expiry conversion ---

/// Encodes an optional absolute expiry as wire nanoseconds.
pub fn expire_to_nanos(expire: Option<SystemTime>) -> i64 {
    match expire {
        Some(at) => at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0),
        None => 0,
    }
}

/// Decodes wire nanoseconds back into an optional absolute expiry.
pub fn nanos_to_expire(nanos: i64) -> Option<SystemTime> {
    if nanos <= 0 {
        return None;
    }
    Some(UNIX_EPOCH + Duration::from_nanos(nanos as u64))
}
