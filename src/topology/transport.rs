//! Request/Reply Transport
//!
//! Thin wrapper over `reqwest` used for every node-to-node call. Each call carries its own
//! timeout and a retry budget; the caller always learns whether the call itself failed
//! (`Unreachable`) or the remote side answered with an application error (`Rejected`).

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::net::SocketAddr;
use std::time::Duration;

/// Timeout and retry budget for a single logical call.
#[derive(Debug, Clone, Copy)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub attempts: usize,
}

impl CallPolicy {
    /// One attempt only. Used for calls that must not be replayed (claims, scatters).
    pub fn once(timeout: Duration) -> Self {
        Self {
            timeout,
            attempts: 1,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{addr} unreachable: {reason}")]
    Unreachable { addr: SocketAddr, reason: String },
    #[error("{addr} rejected the call with {status}: {message}")]
    Rejected {
        addr: SocketAddr,
        status: u16,
        message: String,
    },
    #[error("codec error talking to {addr}: {reason}")]
    Codec { addr: SocketAddr, reason: String },
}

impl TransportError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, TransportError::Unreachable { .. })
    }
}

enum Body {
    Json(Vec<u8>),
    Bincode(Vec<u8>),
    Empty,
}

#[derive(Clone)]
pub struct PeerClient {
    http_client: reqwest::Client,
}

impl Default for PeerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerClient {
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
        }
    }

    /// POSTs a JSON body and decodes a JSON reply.
    pub async fn post_json<Req, Resp>(
        &self,
        addr: SocketAddr,
        path: &str,
        payload: &Req,
        policy: CallPolicy,
    ) -> Result<Resp, TransportError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_vec(payload).map_err(|e| TransportError::Codec {
            addr,
            reason: e.to_string(),
        })?;
        let bytes = self.send_with_retry(addr, path, Body::Json(body), policy).await?;
        decode_json(addr, &bytes)
    }

    /// POSTs a bincode body and decodes a bincode reply.
    pub async fn post_bincode<Req, Resp>(
        &self,
        addr: SocketAddr,
        path: &str,
        payload: &Req,
        policy: CallPolicy,
    ) -> Result<Resp, TransportError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let body = bincode::serialize(payload).map_err(|e| TransportError::Codec {
            addr,
            reason: e.to_string(),
        })?;
        let bytes = self
            .send_with_retry(addr, path, Body::Bincode(body), policy)
            .await?;
        bincode::deserialize(&bytes).map_err(|e| TransportError::Codec {
            addr,
            reason: e.to_string(),
        })
    }

    pub async fn get_json<Resp: DeserializeOwned>(
        &self,
        addr: SocketAddr,
        path: &str,
        policy: CallPolicy,
    ) -> Result<Resp, TransportError> {
        let bytes = self.send_with_retry(addr, path, Body::Empty, policy).await?;
        decode_json(addr, &bytes)
    }

    async fn send_with_retry(
        &self,
        addr: SocketAddr,
        path: &str,
        body: Body,
        policy: CallPolicy,
    ) -> Result<Vec<u8>, TransportError> {
        let url = format!("http://{}{}", addr, path);
        let attempts = policy.attempts.max(1);
        let mut delay_ms = 150u64;

        for attempt in 0..attempts {
            let request = match &body {
                Body::Json(bytes) => self
                    .http_client
                    .post(url.clone())
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(bytes.clone()),
                Body::Bincode(bytes) => self
                    .http_client
                    .post(url.clone())
                    .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                    .body(bytes.clone()),
                Body::Empty => self.http_client.get(url.clone()),
            };

            match request.timeout(policy.timeout).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let bytes = resp.bytes().await.map_err(|e| TransportError::Unreachable {
                        addr,
                        reason: e.to_string(),
                    })?;
                    if !status.is_success() {
                        return Err(TransportError::Rejected {
                            addr,
                            status: status.as_u16(),
                            message: String::from_utf8_lossy(&bytes).into_owned(),
                        });
                    }
                    return Ok(bytes.to_vec());
                }
                Err(e) => {
                    if attempt + 1 == attempts {
                        return Err(TransportError::Unreachable {
                            addr,
                            reason: e.to_string(),
                        });
                    }
                    tracing::debug!("Call to {}{} failed ({}), retrying", addr, path, e);
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(TransportError::Unreachable {
            addr,
            reason: "retry attempts exhausted".to_string(),
        })
    }
}

fn decode_json<Resp: DeserializeOwned>(
    addr: SocketAddr,
    bytes: &[u8],
) -> Result<Resp, TransportError> {
    serde_json::from_slice(bytes).map_err(|e| TransportError::Codec {
        addr,
        reason: e.to_string(),
    })
}
