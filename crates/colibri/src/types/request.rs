use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::error::{ColibriError, Result};

/// Upstream a request is addressed to. `Internal` requests are satisfied by
/// the host itself (period store, local services), never by HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    BeaconApi,
    #[serde(alias = "eth_rpc")]
    ExecRpc,
    RestApi,
    Internal,
    Prover,
    Checkpointz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Json,
    Ssz,
}

/// Maximum nodes per pool; the exclusion mask is a u16 bitfield.
pub const MAX_NODES: usize = 16;

/// One pending unit of external I/O. Ownership moves into the
/// [`RequestState`] when queued; the host driver fills `response` or `error`.
#[derive(Debug, Clone)]
pub struct DataRequest {
    pub chain_id: u64,
    pub kind: RequestKind,
    pub method: HttpMethod,
    pub encoding: Encoding,
    pub url: String,
    pub payload: Option<serde_json::Value>,
    pub response: Option<Bytes>,
    pub response_node_index: u16,
    pub node_exclude_mask: u16,
    pub preferred_client_type: u32,
    pub error: Option<String>,
    pub ttl: u32,
    pub id: [u8; 32],
}

impl DataRequest {
    pub fn get(chain_id: u64, kind: RequestKind, encoding: Encoding, url: impl Into<String>) -> Self {
        let url = url.into();
        let id = request_id(&url, None);
        Self {
            chain_id,
            kind,
            method: HttpMethod::Get,
            encoding,
            url,
            payload: None,
            response: None,
            response_node_index: 0,
            node_exclude_mask: 0,
            preferred_client_type: 0,
            error: None,
            ttl: 0,
            id,
        }
    }

    pub fn post(
        chain_id: u64,
        kind: RequestKind,
        encoding: Encoding,
        url: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        let url = url.into();
        let id = request_id(&url, Some(&payload));
        Self {
            chain_id,
            kind,
            method: HttpMethod::Post,
            encoding,
            url,
            payload: Some(payload),
            response: None,
            response_node_index: 0,
            node_exclude_mask: 0,
            preferred_client_type: 0,
            error: None,
            ttl: 0,
            id,
        }
    }

    pub fn with_preferred_client(mut self, client_type: u32) -> Self {
        self.preferred_client_type = client_type;
        self
    }

    /// Open means the host still owes us a completion.
    pub fn is_open(&self) -> bool {
        self.response.is_none() && self.error.is_none()
    }

    /// Clear the response and exclude the node that produced it, so the host
    /// re-issues the request elsewhere.
    pub fn retry(&mut self) {
        if self.response.is_some() || self.error.is_some() {
            self.node_exclude_mask |= 1 << self.response_node_index;
        }
        self.response = None;
        self.error = None;
    }
}

/// SHA-256 of the POST payload, or of the URL for payload-less requests.
/// Used to deduplicate requests inside one context.
pub fn request_id(url: &str, payload: Option<&serde_json::Value>) -> [u8; 32] {
    let mut hasher = Sha256::new();
    match payload {
        Some(p) => hasher.update(p.to_string().as_bytes()),
        None => hasher.update(url.as_bytes()),
    }
    hasher.finalize().into()
}

/// Outcome of asking the state for a piece of data.
pub enum Fetch {
    Ready(Bytes),
    Pending,
}

/// Ordered set of pending requests plus a coalesced, append-only error
/// string. All per-request deduplication goes through the SHA-256 id.
#[derive(Debug, Default)]
pub struct RequestState {
    requests: Vec<DataRequest>,
    error: Option<String>,
}

impl RequestState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Errors are concatenated, never replaced.
    pub fn add_error(&mut self, msg: &str) {
        match &mut self.error {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(msg);
            }
            None => self.error = Some(msg.to_string()),
        }
    }

    pub fn has_open_requests(&self) -> bool {
        self.requests.iter().any(|r| r.is_open())
    }

    pub fn requests(&self) -> &[DataRequest] {
        &self.requests
    }

    pub fn open_requests_mut(&mut self) -> impl Iterator<Item = &mut DataRequest> {
        self.requests.iter_mut().filter(|r| r.is_open())
    }

    pub fn request_mut(&mut self, id: &[u8; 32]) -> Option<&mut DataRequest> {
        self.requests.iter_mut().find(|r| &r.id == id)
    }

    pub fn set_response(&mut self, id: &[u8; 32], data: Bytes, node_index: u16) {
        if let Some(req) = self.request_mut(id) {
            req.response = Some(data);
            req.response_node_index = node_index;
        }
    }

    pub fn set_error(&mut self, id: &[u8; 32], error: &str, node_index: u16) {
        if let Some(req) = self.request_mut(id) {
            req.error = Some(error.to_string());
            req.response_node_index = node_index;
        }
    }

    /// Queue a request if it is not already known, and report its current
    /// state. A completed request yields its bytes; a failed one propagates
    /// the host-recorded error.
    pub fn fetch(&mut self, req: DataRequest) -> Result<Fetch> {
        if let Some(existing) = self.requests.iter().find(|r| r.id == req.id) {
            if let Some(err) = &existing.error {
                return Err(ColibriError::Upstream(err.clone()));
            }
            return match &existing.response {
                Some(bytes) => Ok(Fetch::Ready(bytes.clone())),
                None => Ok(Fetch::Pending),
            };
        }
        self.requests.push(req);
        Ok(Fetch::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_dedup_by_id() {
        let mut state = RequestState::new();
        let req = DataRequest::get(1, RequestKind::BeaconApi, Encoding::Json, "/eth/v1/beacon/headers/head");
        let id = req.id;
        assert!(matches!(state.fetch(req.clone()), Ok(Fetch::Pending)));
        assert!(matches!(state.fetch(req.clone()), Ok(Fetch::Pending)));
        assert_eq!(state.requests().len(), 1);

        state.set_response(&id, Bytes::from_static(b"{}"), 3);
        match state.fetch(req).unwrap() {
            Fetch::Ready(bytes) => assert_eq!(&bytes[..], b"{}"),
            _ => panic!("expected ready"),
        }
        assert_eq!(state.requests()[0].response_node_index, 3);
    }

    #[test]
    fn test_post_id_uses_payload() {
        let a = DataRequest::post(
            1,
            RequestKind::ExecRpc,
            Encoding::Json,
            "",
            serde_json::json!({"method": "eth_getProof"}),
        );
        let b = DataRequest::post(
            1,
            RequestKind::ExecRpc,
            Encoding::Json,
            "",
            serde_json::json!({"method": "eth_getBalance"}),
        );
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_error_is_append_only() {
        let mut state = RequestState::new();
        state.add_error("first");
        state.add_error("second");
        assert_eq!(state.error(), Some("first\nsecond"));
    }

    #[test]
    fn test_retry_excludes_node() {
        let mut req = DataRequest::get(1, RequestKind::ExecRpc, Encoding::Json, "x");
        req.response = Some(Bytes::from_static(b"bad"));
        req.response_node_index = 2;
        req.retry();
        assert!(req.is_open());
        assert_eq!(req.node_exclude_mask, 1 << 2);
    }
}
