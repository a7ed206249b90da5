//! Proofer contexts and per-method dispatch.
//!
//! One context per RPC call. `execute` re-enters the method builder until it
//! either produces the SSZ proof container (`Success`), records an error
//! (`Error`) or leaves requests awaiting responses (`Pending`). Builders are
//! deterministic: re-execution replays the same request sequence, and the
//! request-id dedup in [`RequestState`] makes replays cheap.

pub mod account;
pub mod beacon;
pub mod block;
pub mod cache;
pub mod call;
pub mod logs;
pub mod receipt;
pub mod sync;
pub mod tx;

use bytes::Bytes;

use crate::schema;
use crate::ssz::{self, catalog};
use crate::types::chain::{chain_family, chain_spec, ChainFamily, ChainSpec};
use crate::types::error::{ColibriError, Result};
use crate::types::request::{DataRequest, Encoding, Fetch, RequestKind, RequestState};
use crate::types::status::{ExecStatus, PendingRequest, StatusReport};

use cache::ProoferCache;

/// Skip both cache tiers for this context.
pub const FLAG_NO_CACHE: u32 = 1;
/// Context runs on a worker thread; the global cache is off limits.
pub const FLAG_WORKER_THREAD: u32 = 2;
/// Include contract bytecode in `eth_call` proofs.
pub const FLAG_INCLUDE_CODE: u32 = 4;

type BuilderFn = fn(&mut Proofer) -> Result<Option<Vec<u8>>>;

struct MethodEntry {
    family: ChainFamily,
    method: &'static str,
    build: BuilderFn,
}

const fn eth(method: &'static str, build: BuilderFn) -> MethodEntry {
    MethodEntry { family: ChainFamily::Ethereum, method, build }
}

const fn op(method: &'static str, build: BuilderFn) -> MethodEntry {
    MethodEntry { family: ChainFamily::OpStack, method, build }
}

static METHODS: &[MethodEntry] = &[
    eth("eth_getBalance", account::build),
    eth("eth_getTransactionCount", account::build),
    eth("eth_getCode", account::build),
    eth("eth_getStorageAt", account::build),
    eth("eth_getProof", account::build),
    eth("eth_getTransactionByHash", tx::build),
    eth("eth_getTransactionByBlockNumberAndIndex", tx::build),
    eth("eth_getTransactionByBlockHashAndIndex", tx::build),
    eth("eth_getTransactionReceipt", receipt::build),
    eth("eth_getLogs", logs::build),
    eth("eth_getBlockByNumber", block::build),
    eth("eth_getBlockByHash", block::build),
    eth("eth_call", call::build),
    eth("eth_proof_sync", sync::build),
    // OP-style rollups: block, transaction, receipt, logs, call.
    op("eth_getBlockByNumber", block::build),
    op("eth_getBlockByHash", block::build),
    op("eth_getTransactionByHash", tx::build),
    op("eth_getTransactionByBlockNumberAndIndex", tx::build),
    op("eth_getTransactionByBlockHashAndIndex", tx::build),
    op("eth_getTransactionReceipt", receipt::build),
    op("eth_getLogs", logs::build),
    op("eth_call", call::build),
];

fn lookup(family: ChainFamily, method: &str) -> Option<BuilderFn> {
    METHODS
        .iter()
        .find(|e| e.family == family && e.method == method)
        .map(|e| e.build)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodSupport {
    Proofable,
    NotSupported,
}

pub fn method_support(chain_id: u64, method: &str) -> MethodSupport {
    match chain_family(chain_id) {
        Some(family) if lookup(family, method).is_some() => MethodSupport::Proofable,
        _ => MethodSupport::NotSupported,
    }
}

#[derive(Debug)]
pub struct Proofer {
    pub method: String,
    pub params: serde_json::Value,
    pub chain_id: u64,
    pub family: ChainFamily,
    pub spec: &'static ChainSpec,
    pub flags: u32,
    pub state: RequestState,
    pub cache: ProoferCache,
    proof: Option<Vec<u8>>,
}

impl Proofer {
    pub fn new(method: &str, params_json: &str, chain_id: u64, flags: u32) -> Result<Self> {
        let family =
            chain_family(chain_id).ok_or(ColibriError::UnsupportedChain(chain_id))?;
        let spec = chain_spec(chain_id).ok_or(ColibriError::UnsupportedChain(chain_id))?;
        let params: serde_json::Value = serde_json::from_str(params_json)?;
        if let Some(method_schema) = schema::schema_for(method) {
            schema::validate_params(method_schema, params_json, &params)?;
        }
        let global_cache = flags & (FLAG_NO_CACHE | FLAG_WORKER_THREAD) == 0;
        Ok(Self {
            method: method.to_string(),
            params,
            chain_id,
            family,
            spec,
            flags,
            state: RequestState::new(),
            cache: ProoferCache::new(global_cache),
            proof: None,
        })
    }

    /// One cooperative step. `Success` iff the proof is populated, `Error`
    /// iff the state error is set, `Pending` otherwise.
    pub fn execute(&mut self) -> ExecStatus {
        if self.proof.is_some() {
            return ExecStatus::Success;
        }
        if self.state.error().is_some() {
            return ExecStatus::Error;
        }
        let Some(build) = lookup(self.family, &self.method) else {
            self.state.add_error(&format!("Unsupported method: {}", self.method));
            return ExecStatus::Error;
        };
        match build(self) {
            Ok(Some(bytes)) => {
                self.proof = Some(bytes);
                ExecStatus::Success
            }
            Ok(None) => ExecStatus::Pending,
            Err(e) => {
                self.state.add_error(&e.to_string());
                ExecStatus::Error
            }
        }
    }

    pub fn status(&self) -> ExecStatus {
        if self.proof.is_some() {
            ExecStatus::Success
        } else if self.state.error().is_some() {
            ExecStatus::Error
        } else {
            ExecStatus::Pending
        }
    }

    pub fn proof(&self) -> Option<&[u8]> {
        self.proof.as_deref()
    }

    pub fn take_proof(&mut self) -> Option<Vec<u8>> {
        self.proof.take()
    }

    pub fn status_report(&self) -> StatusReport {
        match self.status() {
            ExecStatus::Success => StatusReport::Done,
            ExecStatus::Error => StatusReport::Error {
                message: self.state.error().unwrap_or_default().to_string(),
            },
            ExecStatus::Pending => StatusReport::Pending {
                requests: self
                    .state
                    .requests()
                    .iter()
                    .filter(|r| r.is_open())
                    .map(|r| PendingRequest {
                        request_id: hex::encode(r.id),
                        url: r.url.clone(),
                        method: format!("{:?}", r.method),
                        node_index: r.response_node_index,
                    })
                    .collect(),
            },
        }
    }

    // --- builder-facing data access ---

    fn fetch_cached(&mut self, req: DataRequest, ttl_secs: u64) -> Result<Option<Bytes>> {
        let use_cache = ttl_secs > 0 && self.flags & FLAG_NO_CACHE == 0;
        let key = format!("req:{}", hex::encode(req.id));
        if use_cache {
            if let Some(hit) = self.cache.get(&key) {
                return Ok(Some(hit));
            }
        }
        match self.state.fetch(req)? {
            Fetch::Pending => Ok(None),
            Fetch::Ready(bytes) => {
                if use_cache {
                    self.cache.put(&key, bytes.clone(), ttl_secs);
                }
                Ok(Some(bytes))
            }
        }
    }

    pub(crate) fn beacon_json(&mut self, path: &str) -> Result<Option<serde_json::Value>> {
        let req =
            DataRequest::get(self.chain_id, RequestKind::BeaconApi, Encoding::Json, path);
        match self.fetch_cached(req, 0)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn beacon_ssz(&mut self, path: &str, ttl_secs: u64) -> Result<Option<Bytes>> {
        let req = DataRequest::get(self.chain_id, RequestKind::BeaconApi, Encoding::Ssz, path);
        self.fetch_cached(req, ttl_secs)
    }

    pub(crate) fn internal(&mut self, path: &str) -> Result<Option<Bytes>> {
        let req = DataRequest::get(self.chain_id, RequestKind::Internal, Encoding::Ssz, path);
        self.fetch_cached(req, 0)
    }

    /// JSON-RPC call against the execution pool; returns the `result` field.
    pub(crate) fn rpc(
        &mut self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<serde_json::Value>> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let req =
            DataRequest::post(self.chain_id, RequestKind::ExecRpc, Encoding::Json, "", payload);
        let Some(bytes) = self.fetch_cached(req, 0)? else {
            return Ok(None);
        };
        let body: serde_json::Value = serde_json::from_slice(&bytes)?;
        if let Some(error) = body.get("error") {
            let message =
                error.get("message").and_then(|m| m.as_str()).unwrap_or("unknown error");
            return Err(ColibriError::Upstream(format!("{}: {}", method, message)));
        }
        match body.get("result") {
            Some(result) => Ok(Some(result.clone())),
            None => Err(ColibriError::Upstream(format!("{}: response without result", method))),
        }
    }

    /// Re-issue an earlier RPC after a malformed response: clears the
    /// response and excludes the node that produced it. Returns false once
    /// the request is unknown or already failed, making the error final.
    pub(crate) fn retry_rpc(&mut self, method: &str, params: serde_json::Value) -> bool {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let id = crate::types::request::request_id("", Some(&payload));
        match self.state.request_mut(&id) {
            Some(req) if req.response.is_some() => {
                req.retry();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn param(&self, index: usize) -> Option<&serde_json::Value> {
        self.params.as_array().and_then(|a| a.get(index))
    }

    pub(crate) fn param_str(&self, index: usize) -> Result<&str> {
        self.param(index)
            .and_then(|v| v.as_str())
            .ok_or_else(|| ColibriError::InvalidParams(format!("param {} missing", index)))
    }
}

/// Assemble the final `C4Request` container.
pub(crate) fn finish_request(
    data: (u8, ssz::Value),
    proof: (u8, ssz::Value),
    sync_data: Option<ssz::Value>,
) -> Result<Vec<u8>> {
    let sync = match sync_data {
        Some(v) => ssz::Value::Union(catalog::SYNC_COMMITTEE_SIGNATURE, Box::new(v)),
        None => ssz::Value::Union(catalog::SYNC_NONE, Box::new(ssz::Value::None)),
    };
    let request = ssz::Value::Items(vec![
        ssz::Value::Bytes(catalog::C4_VERSION.to_vec()),
        ssz::Value::Union(data.0, Box::new(data.1)),
        ssz::Value::Union(proof.0, Box::new(proof.1)),
        sync,
    ]);
    ssz::encode(&catalog::C4_REQUEST, &request)
}

// --- hex parsing helpers shared by builders ---

pub(crate) fn hex_str(value: &serde_json::Value) -> Result<&str> {
    value
        .as_str()
        .ok_or_else(|| ColibriError::Upstream("expected hex string".into()))
}

pub(crate) fn hex_u64(value: &serde_json::Value) -> Result<u64> {
    let s = hex_str(value)?;
    let body = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(body, 16)
        .map_err(|_| ColibriError::Upstream(format!("bad quantity '{}'", s)))
}

pub(crate) fn hex_bytes(value: &serde_json::Value) -> Result<Vec<u8>> {
    let s = hex_str(value)?;
    let body = s.strip_prefix("0x").unwrap_or(s);
    if body.len() % 2 == 1 {
        let padded = format!("0{}", body);
        return hex::decode(&padded).map_err(|e| ColibriError::Upstream(e.to_string()));
    }
    hex::decode(body).map_err(|e| ColibriError::Upstream(e.to_string()))
}

pub(crate) fn hex_array<const N: usize>(value: &serde_json::Value) -> Result<[u8; N]> {
    let bytes = hex_bytes(value)?;
    bytes
        .try_into()
        .map_err(|_| ColibriError::Upstream(format!("expected {} bytes", N)))
}

/// Left-pad a big-endian value to 32 bytes.
pub(crate) fn left_pad32(bytes: &[u8]) -> Result<[u8; 32]> {
    if bytes.len() > 32 {
        return Err(ColibriError::Upstream(format!(
            "value of {} bytes exceeds 32",
            bytes.len()
        )));
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(out)
}

/// Big-endian hex quantity to the 32-byte little-endian SSZ uint256 form.
pub(crate) fn hex_u256_le(value: &serde_json::Value) -> Result<[u8; 32]> {
    let be = hex_bytes(value)?;
    if be.len() > 32 {
        return Err(ColibriError::Upstream("quantity exceeds 256 bits".into()));
    }
    let mut out = [0u8; 32];
    for (i, b) in be.iter().rev().enumerate() {
        out[i] = *b;
    }
    Ok(out)
}

/// Number-as-string fields of the beacon JSON API.
pub(crate) fn str_u64(value: &serde_json::Value) -> Result<u64> {
    match value {
        serde_json::Value::String(s) => {
            s.parse().map_err(|_| ColibriError::Upstream(format!("bad number '{}'", s)))
        }
        serde_json::Value::Number(n) => {
            n.as_u64().ok_or_else(|| ColibriError::Upstream("bad number".into()))
        }
        _ => Err(ColibriError::Upstream("expected number".into())),
    }
}

/// Optional JSON-RPC quantity; absent and null map to zero.
pub(crate) fn opt_hex_u64(value: &serde_json::Value) -> u64 {
    if value.is_null() { 0 } else { hex_u64(value).unwrap_or(0) }
}

/// Optional JSON-RPC byte string; absent and null map to empty.
pub(crate) fn opt_hex_bytes(value: &serde_json::Value) -> Vec<u8> {
    if value.is_null() { Vec::new() } else { hex_bytes(value).unwrap_or_default() }
}

/// Optional 32-byte JSON-RPC hash; absent and null map to zero.
pub(crate) fn opt_b256(value: &serde_json::Value) -> [u8; 32] {
    hex_array::<32>(value).unwrap_or([0u8; 32])
}

pub(crate) fn bytes_to_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count).map(|i| bytes[i / 8] & (1 << (i % 8)) != 0).collect()
}

/// True when an upstream error denotes a missing resource (empty beacon
/// slot) rather than a failure.
pub(crate) fn is_not_found(err: &ColibriError) -> bool {
    match err {
        ColibriError::Upstream(msg) => {
            msg.contains("404") || msg.contains("NOT_FOUND") || msg.contains("Not Found")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_chain_is_rejected() {
        let err = Proofer::new("eth_getBalance", "[]", 424242, 0).unwrap_err();
        assert!(matches!(err, ColibriError::UnsupportedChain(424242)));
    }

    #[test]
    fn test_invalid_params_fail_early() {
        let err = Proofer::new("eth_getBalance", r#"["nope"]"#, 1, 0).unwrap_err();
        assert!(matches!(err, ColibriError::InvalidParams(_)));
    }

    #[test]
    fn test_unknown_method_errors_on_execute() {
        let mut p = Proofer::new("eth_fancyNewMethod", "[]", 1, 0).unwrap();
        assert_eq!(p.execute(), ExecStatus::Error);
        assert!(p.state.error().unwrap().contains("Unsupported method"));
    }

    #[test]
    fn test_op_family_subset() {
        use crate::types::chain::BASE;
        assert_eq!(method_support(BASE, "eth_getLogs"), MethodSupport::Proofable);
        assert_eq!(method_support(BASE, "eth_getBalance"), MethodSupport::NotSupported);
        assert_eq!(method_support(1, "eth_getBalance"), MethodSupport::Proofable);
        assert_eq!(method_support(1, "eth_mining"), MethodSupport::NotSupported);
    }

    #[test]
    fn test_first_execute_goes_pending() {
        let mut p = Proofer::new(
            "eth_getBalance",
            r#"["0xde0b295669a9fd93d5f28d9ec85e40f4cb697bae", "latest"]"#,
            1,
            0,
        )
        .unwrap();
        assert_eq!(p.execute(), ExecStatus::Pending);
        assert!(p.state.has_open_requests());
        // The first dependency is the beacon head header.
        let urls: Vec<&str> = p.state.requests().iter().map(|r| r.url.as_str()).collect();
        assert!(urls.iter().any(|u| u.contains("/headers/head")));
    }

    #[test]
    fn test_hex_helpers() {
        use serde_json::json;
        assert_eq!(hex_u64(&json!("0x10")).unwrap(), 16);
        assert_eq!(hex_bytes(&json!("0x0102")).unwrap(), vec![1, 2]);
        assert_eq!(hex_bytes(&json!("0x102")).unwrap(), vec![1, 2]);
        let le = hex_u256_le(&json!("0x0100")).unwrap();
        assert_eq!(le[0], 0);
        assert_eq!(le[1], 1);
        assert_eq!(str_u64(&json!("8192")).unwrap(), 8192);
    }
}
