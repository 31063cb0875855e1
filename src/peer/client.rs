use super::protocol::{KeyRequest, SetRequest, ENDPOINT_DELETE, ENDPOINT_GET, ENDPOINT_SET};
use super::PeerClient;
use crate::cache::ByteView;
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Deadline applied to every peer call, enforced on the client side.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Long-lived RPC client for a single peer address.
///
/// The HTTP transport is injected and shared across every peer in the pool;
/// reqwest pools connections behind the cloned handle.
pub struct HttpPeer {
    addr: String,
    base_url: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpPeer {
    pub fn new(addr: &str, http: reqwest::Client) -> Self {
        Self::new_with_timeout(addr, http, DEFAULT_CALL_TIMEOUT)
    }

    pub fn new_with_timeout(addr: &str, http: reqwest::Client, timeout: Duration) -> Self {
        Self {
            addr: addr.to_string(),
            base_url: format!("http://{}", addr),
            http,
            timeout,
        }
    }

    /// POSTs a bincode-encoded request and returns the raw response body.
    async fn call<Req: Serialize>(&self, endpoint: &str, req: &Req) -> Result<Vec<u8>> {
        let body = bincode::serialize(req).map_err(|e| CacheError::PeerProtocol {
            addr: self.addr.clone(),
            reason: format!("encode request: {}", e),
        })?;

        let response = self
            .http
            .post(format!("{}{}", self.base_url, endpoint))
            .timeout(self.timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CacheError::GroupUnknown(
                String::from_utf8_lossy(&bytes).into_owned(),
            ));
        }
        if !status.is_success() {
            return Err(CacheError::PeerProtocol {
                addr: self.addr.clone(),
                reason: format!("{}: {}", status, String::from_utf8_lossy(&bytes)),
            });
        }
        Ok(bytes.to_vec())
    }

    fn decode<Resp: DeserializeOwned>(&self, body: &[u8]) -> Result<Resp> {
        bincode::deserialize(body).map_err(|e| CacheError::PeerProtocol {
            addr: self.addr.clone(),
            reason: format!("decode response: {}", e),
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> CacheError {
        if e.is_timeout() {
            CacheError::Timeout {
                addr: self.addr.clone(),
                millis: self.timeout.as_millis() as u64,
            }
        } else {
            CacheError::PeerUnavailable {
                addr: self.addr.clone(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl PeerClient for HttpPeer {
    fn addr(&self) -> &str {
        &self.addr
    }

    async fn fetch(&self, req: &KeyRequest) -> Result<ByteView> {
        let body = self.call(ENDPOINT_GET, req).await?;
        let response: super::protocol::GetResponse = self.decode(&body)?;
        tracing::debug!(
            "fetched {:?}/{:?} from peer {} ({} bytes)",
            req.group,
            req.key,
            self.addr,
            response.value.len()
        );
        Ok(ByteView::from(response.value))
    }

    async fn store(&self, req: &SetRequest) -> Result<()> {
        self.call(ENDPOINT_SET, req).await?;
        Ok(())
    }

    async fn remove(&self, req: &KeyRequest) -> Result<()> {
        self.call(ENDPOINT_DELETE, req).await?;
        Ok(())
    }
}
