//! Tight JSON schemas for RPC params, with a small validation cache.
//!
//! Validation results are cached by FNV-1a hash of `method || 0x00 || raw`
//! in a fixed ring so repeated calls with identical params skip the walk.

use once_cell::sync::Lazy;
use std::sync::Mutex;

use crate::types::error::{ColibriError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// 20-byte hex address.
    Address,
    /// 32-byte hex hash.
    Hash32,
    /// 0x-prefixed quantity.
    Quantity,
    /// 0x-prefixed byte string of even length.
    HexData,
    /// Block number, tag or block hash.
    BlockRef,
    /// Array of 32-byte storage keys.
    StorageKeys,
    /// eth_call-style transaction object.
    CallObject,
    /// eth_getLogs filter object.
    FilterObject,
    Bool,
    /// Plain integer (JSON number or quantity), e.g. a period.
    Uint,
}

pub struct MethodSchema {
    pub method: &'static str,
    pub params: &'static [ParamType],
    pub required: usize,
}

use ParamType::*;

pub static SCHEMAS: &[MethodSchema] = &[
    MethodSchema { method: "eth_getBalance", params: &[Address, BlockRef], required: 1 },
    MethodSchema { method: "eth_getTransactionCount", params: &[Address, BlockRef], required: 1 },
    MethodSchema { method: "eth_getCode", params: &[Address, BlockRef], required: 1 },
    MethodSchema { method: "eth_getStorageAt", params: &[Address, Hash32, BlockRef], required: 2 },
    MethodSchema { method: "eth_getProof", params: &[Address, StorageKeys, BlockRef], required: 2 },
    MethodSchema { method: "eth_getTransactionByHash", params: &[Hash32], required: 1 },
    MethodSchema {
        method: "eth_getTransactionByBlockNumberAndIndex",
        params: &[BlockRef, Quantity],
        required: 2,
    },
    MethodSchema {
        method: "eth_getTransactionByBlockHashAndIndex",
        params: &[Hash32, Quantity],
        required: 2,
    },
    MethodSchema { method: "eth_getTransactionReceipt", params: &[Hash32], required: 1 },
    MethodSchema { method: "eth_getLogs", params: &[FilterObject], required: 1 },
    MethodSchema { method: "eth_getBlockByNumber", params: &[BlockRef, Bool], required: 1 },
    MethodSchema { method: "eth_getBlockByHash", params: &[Hash32, Bool], required: 1 },
    MethodSchema { method: "eth_call", params: &[CallObject, BlockRef], required: 1 },
    MethodSchema { method: "eth_proof_sync", params: &[Uint], required: 1 },
];

pub fn schema_for(method: &str) -> Option<&'static MethodSchema> {
    SCHEMAS.iter().find(|s| s.method == method)
}

const CACHE_SLOTS: usize = 16;

/// Ring of recently validated `(schema, raw)` hashes.
pub struct ValidationCache {
    slots: [u64; CACHE_SLOTS],
    next: usize,
}

impl ValidationCache {
    pub const fn new() -> Self {
        Self { slots: [0; CACHE_SLOTS], next: 0 }
    }

    fn contains(&self, hash: u64) -> bool {
        hash != 0 && self.slots.contains(&hash)
    }

    fn insert(&mut self, hash: u64) {
        self.slots[self.next] = hash;
        self.next = (self.next + 1) % CACHE_SLOTS;
    }
}

static CACHE: Lazy<Mutex<ValidationCache>> = Lazy::new(|| Mutex::new(ValidationCache::new()));

pub fn fnv1a(data: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in data {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn cache_key(method: &str, raw: &str) -> u64 {
    let mut data = Vec::with_capacity(method.len() + 1 + raw.len());
    data.extend_from_slice(method.as_bytes());
    data.push(0);
    data.extend_from_slice(raw.as_bytes());
    fnv1a(&data)
}

/// Validate `params` against the schema. `raw` is the untouched params text
/// used for the cache key.
pub fn validate_params(
    schema: &MethodSchema,
    raw: &str,
    params: &serde_json::Value,
) -> Result<()> {
    let key = cache_key(schema.method, raw);
    if CACHE.lock().unwrap().contains(key) {
        return Ok(());
    }

    let arr = params
        .as_array()
        .ok_or_else(|| ColibriError::InvalidParams("params must be an array".into()))?;
    if arr.len() < schema.required || arr.len() > schema.params.len() {
        return Err(ColibriError::InvalidParams(format!(
            "{} expects {}..{} params, got {}",
            schema.method,
            schema.required,
            schema.params.len(),
            arr.len()
        )));
    }
    for (i, (value, ty)) in arr.iter().zip(schema.params.iter()).enumerate() {
        check_param(value, *ty)
            .map_err(|e| ColibriError::InvalidParams(format!("param {}: {}", i, e)))?;
    }

    CACHE.lock().unwrap().insert(key);
    Ok(())
}

fn check_param(value: &serde_json::Value, ty: ParamType) -> std::result::Result<(), String> {
    match ty {
        Address => check_hex(value, Some(40)),
        Hash32 => check_hex(value, Some(64)),
        Quantity => check_quantity(value),
        HexData => check_hex(value, None),
        BlockRef => {
            if let Some(s) = value.as_str() {
                if matches!(s, "latest" | "finalized" | "safe" | "earliest" | "pending") {
                    return Ok(());
                }
                if s.len() == 66 {
                    return check_hex(value, Some(64));
                }
                return check_quantity(value);
            }
            Err("expected block number, tag or hash".into())
        }
        StorageKeys => {
            let arr = value.as_array().ok_or("expected array of storage keys")?;
            for key in arr {
                check_hex(key, Some(64))?;
            }
            Ok(())
        }
        CallObject => {
            let obj = value.as_object().ok_or("expected call object")?;
            for (k, v) in obj {
                match k.as_str() {
                    "from" | "to" => check_hex(v, Some(40))?,
                    "data" | "input" => check_hex(v, None)?,
                    "value" | "gas" | "gasPrice" | "maxFeePerGas" | "maxPriorityFeePerGas"
                    | "nonce" => check_quantity(v)?,
                    _ => return Err(format!("unexpected field '{}'", k)),
                }
            }
            Ok(())
        }
        FilterObject => {
            let obj = value.as_object().ok_or("expected filter object")?;
            for (k, v) in obj {
                match k.as_str() {
                    "fromBlock" | "toBlock" => check_param(v, BlockRef)?,
                    "blockHash" => check_hex(v, Some(64))?,
                    "address" => {
                        if let Some(arr) = v.as_array() {
                            for a in arr {
                                check_hex(a, Some(40))?;
                            }
                        } else {
                            check_hex(v, Some(40))?;
                        }
                    }
                    "topics" => {
                        let topics = v.as_array().ok_or("topics must be an array")?;
                        for t in topics {
                            if t.is_null() {
                                continue;
                            }
                            if let Some(arr) = t.as_array() {
                                for x in arr {
                                    check_hex(x, Some(64))?;
                                }
                            } else {
                                check_hex(t, Some(64))?;
                            }
                        }
                    }
                    _ => return Err(format!("unexpected field '{}'", k)),
                }
            }
            Ok(())
        }
        Bool => value.as_bool().map(|_| ()).ok_or_else(|| "expected boolean".into()),
        Uint => {
            if value.is_u64() {
                return Ok(());
            }
            check_quantity(value)
        }
    }
}

fn check_hex(value: &serde_json::Value, nibbles: Option<usize>) -> std::result::Result<(), String> {
    let s = value.as_str().ok_or("expected hex string")?;
    let body = s.strip_prefix("0x").ok_or("missing 0x prefix")?;
    if let Some(n) = nibbles {
        if body.len() != n {
            return Err(format!("expected {} hex chars, got {}", n, body.len()));
        }
    } else if body.len() % 2 != 0 {
        return Err("odd-length hex data".into());
    }
    if !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err("invalid hex".into());
    }
    Ok(())
}

fn check_quantity(value: &serde_json::Value) -> std::result::Result<(), String> {
    let s = value.as_str().ok_or("expected quantity string")?;
    let body = s.strip_prefix("0x").ok_or("missing 0x prefix")?;
    if body.is_empty() || body.len() > 64 {
        return Err("quantity out of range".into());
    }
    if !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err("invalid hex quantity".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_balance_params() {
        let schema = schema_for("eth_getBalance").unwrap();
        let params = json!(["0xde0b295669a9fd93d5f28d9ec85e40f4cb697bae", "latest"]);
        validate_params(schema, &params.to_string(), &params).unwrap();
    }

    #[test]
    fn test_rejects_short_address() {
        let schema = schema_for("eth_getBalance").unwrap();
        let params = json!(["0xde0b2956", "latest"]);
        assert!(validate_params(schema, &params.to_string(), &params).is_err());
    }

    #[test]
    fn test_rejects_unknown_filter_field() {
        let schema = schema_for("eth_getLogs").unwrap();
        let params = json!([{ "fromBlock": "0x1", "bogus": true }]);
        assert!(validate_params(schema, &params.to_string(), &params).is_err());
    }

    #[test]
    fn test_storage_keys() {
        let schema = schema_for("eth_getProof").unwrap();
        let key = format!("0x{}", "11".repeat(32));
        let params = json!(["0xde0b295669a9fd93d5f28d9ec85e40f4cb697bae", [key], "0x10"]);
        validate_params(schema, &params.to_string(), &params).unwrap();
    }

    #[test]
    fn test_cache_hit_skips_revalidation() {
        let schema = schema_for("eth_getTransactionByHash").unwrap();
        let params = json!([format!("0x{}", "ab".repeat(32))]);
        let raw = params.to_string();
        validate_params(schema, &raw, &params).unwrap();
        // Second call takes the cached path; result must be identical.
        validate_params(schema, &raw, &params).unwrap();
    }

    #[test]
    fn test_fnv1a_known_value() {
        // FNV-1a of empty input is the offset basis.
        assert_eq!(fnv1a(b""), 0xcbf29ce484222325);
        assert_ne!(fnv1a(b"a"), fnv1a(b"b"));
    }
}
