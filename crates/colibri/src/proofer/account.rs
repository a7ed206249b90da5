//! Account-group proofs: `eth_getBalance`, `eth_getTransactionCount`,
//! `eth_getCode`, `eth_getStorageAt`, `eth_getProof`.
//!
//! The execution-layer proof is taken verbatim from `eth_getProof`; the
//! beacon side anchors the payload `state_root` into the block body.

use crate::ssz::{catalog, Value};
use crate::types::error::{ColibriError, Result};

use super::beacon::{self, BeaconAnchor};
use super::{finish_request, hex_bytes, hex_u256_le, Proofer, FLAG_INCLUDE_CODE};

/// Payload leaves every account-shaped proof needs.
const ACCOUNT_LEAVES: &[&str] = &["state_root", "block_number", "block_hash"];

pub fn build(p: &mut Proofer) -> Result<Option<Vec<u8>>> {
    let method = p.method.clone();
    let address = p.param_str(0)?.to_string();

    let (storage_keys, block_ref) = match method.as_str() {
        "eth_getStorageAt" => (
            vec![p.param_str(1)?.to_string()],
            p.param(2).and_then(|v| v.as_str()).unwrap_or("latest").to_string(),
        ),
        "eth_getProof" => {
            let keys = p
                .param(1)
                .and_then(|v| v.as_array())
                .map(|a| {
                    a.iter().filter_map(|k| k.as_str().map(str::to_string)).collect::<Vec<_>>()
                })
                .unwrap_or_default();
            (keys, p.param(2).and_then(|v| v.as_str()).unwrap_or("latest").to_string())
        }
        _ => (vec![], p.param(1).and_then(|v| v.as_str()).unwrap_or("latest").to_string()),
    };

    let Some(anchor) = beacon::get_block_for_eth(p, &block_ref)? else {
        return Ok(None);
    };
    let block_hex = format!("0x{:x}", anchor.exec_block_number);

    let proof_json =
        p.rpc("eth_getProof", serde_json::json!([address, storage_keys, block_hex]))?;

    let need_code = method == "eth_getCode" || p.flags & FLAG_INCLUDE_CODE != 0;
    let code_json = if need_code {
        p.rpc("eth_getCode", serde_json::json!([address, block_hex]))?
    } else {
        Some(serde_json::Value::Null)
    };
    let (Some(proof_json), Some(code_json)) = (proof_json, code_json) else {
        return Ok(None);
    };

    let code = if code_json.is_null() { Vec::new() } else { hex_bytes(&code_json)? };
    let account = account_value(&address, &proof_json, code.clone())?;

    let witnesses = beacon::body_multiproof(&anchor, ACCOUNT_LEAVES, &[])?;
    let proof_value = Value::Items(vec![account, beacon::state_proof_value(&anchor, witnesses)]);

    let data = data_for(&method, &proof_json, &code)?;
    finish_request(data, (catalog::PROOF_ACCOUNT, proof_value), Some(anchor.sync_data_value()))
        .map(Some)
}

/// Shared `EthAccount` container construction (also used for `eth_call`
/// touched accounts).
pub(crate) fn account_value(
    address: &str,
    proof_json: &serde_json::Value,
    code: Vec<u8>,
) -> Result<Value> {
    let addr = hex_bytes(&serde_json::Value::String(address.to_string()))?;
    if addr.len() != 20 {
        return Err(ColibriError::InvalidParams(format!("bad address {}", address)));
    }
    let nodes = proof_nodes(&proof_json["accountProof"])?;
    let mut storage = Vec::new();
    if let Some(entries) = proof_json["storageProof"].as_array() {
        for entry in entries {
            let key = super::left_pad32(&hex_bytes(&entry["key"])?)?;
            storage.push(Value::Items(vec![
                Value::Bytes(key.to_vec()),
                proof_nodes(&entry["proof"])?,
            ]));
        }
    }
    Ok(Value::Items(vec![
        Value::Bytes(addr),
        nodes,
        Value::Bytes(code),
        Value::Items(storage),
    ]))
}

fn proof_nodes(list: &serde_json::Value) -> Result<Value> {
    let nodes = list
        .as_array()
        .ok_or_else(|| ColibriError::Upstream("proof is not an array".into()))?
        .iter()
        .map(|n| hex_bytes(n).map(Value::Bytes))
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Items(nodes))
}

fn data_for(
    method: &str,
    proof_json: &serde_json::Value,
    code: &[u8],
) -> Result<(u8, Value)> {
    Ok(match method {
        "eth_getBalance" => {
            (catalog::DATA_UINT256, Value::U256(hex_u256_le(&proof_json["balance"])?))
        }
        "eth_getTransactionCount" => {
            (catalog::DATA_UINT256, Value::U256(hex_u256_le(&proof_json["nonce"])?))
        }
        "eth_getCode" => (catalog::DATA_BYTES, Value::Bytes(code.to_vec())),
        "eth_getStorageAt" => {
            let value = proof_json["storageProof"]
                .as_array()
                .and_then(|a| a.first())
                .map(|e| hex_u256_le(&e["value"]))
                .transpose()?
                .unwrap_or([0u8; 32]);
            (catalog::DATA_UINT256, Value::U256(value))
        }
        _ => {
            // eth_getProof: the account fields plus the storage values.
            let mut storage = Vec::new();
            if let Some(entries) = proof_json["storageProof"].as_array() {
                for entry in entries {
                    let key = super::left_pad32(&hex_bytes(&entry["key"])?)?;
                    let value = super::left_pad32(&hex_bytes(&entry["value"])?)?;
                    storage.push(Value::Items(vec![
                        Value::Bytes(key.to_vec()),
                        Value::Bytes(value.to_vec()),
                    ]));
                }
            }
            let account_data = Value::Items(vec![
                Value::U256(hex_u256_le(&proof_json["balance"])?),
                Value::Uint(super::hex_u64(&proof_json["nonce"])?),
                Value::Bytes(hex_bytes(&proof_json["codeHash"])?),
                Value::Bytes(hex_bytes(&proof_json["storageHash"])?),
                Value::Items(storage),
            ]);
            (catalog::DATA_ACCOUNT, account_data)
        }
    })
}

/// Anchor accessor used by other builders sharing the account leaf set.
pub(crate) fn account_state_proof(anchor: &BeaconAnchor) -> Result<Value> {
    let witnesses = beacon::body_multiproof(anchor, ACCOUNT_LEAVES, &[])?;
    Ok(beacon::state_proof_value(anchor, witnesses))
}
