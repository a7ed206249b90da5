//! Receipt proofs.
//!
//! The full receipt list of the block is re-encoded to RLP, the receipts
//! trie is rebuilt locally (keyed by `RLP(tx_index)`), and the proof for the
//! requested index is emitted. The rebuilt root must match the payload's
//! `receipts_root`, otherwise the upstream served an inconsistent set.

use crate::mpt::{self, OrderedTrie};
use crate::ssz::{catalog, Value};
use crate::types::error::{ColibriError, Result};

use super::beacon::{self, BeaconAnchor};
use super::{
    finish_request, hex_u64, opt_b256, opt_hex_bytes, opt_hex_u64, Proofer,
};

/// Payload leaves shared by receipt- and log-shaped proofs.
pub(crate) const RECEIPT_LEAVES: &[&str] = &["receipts_root", "block_number", "block_hash"];

pub fn build(p: &mut Proofer) -> Result<Option<Vec<u8>>> {
    let tx_hash = p.param_str(0)?.to_string();
    let Some(tx_json) = p.rpc("eth_getTransactionByHash", serde_json::json!([tx_hash]))? else {
        return Ok(None);
    };
    if tx_json.is_null() {
        return Err(ColibriError::InvalidParams("transaction not found".into()));
    }
    let block_hash = tx_json["blockHash"]
        .as_str()
        .ok_or_else(|| ColibriError::Upstream("transaction is pending".into()))?
        .to_string();
    let index = hex_u64(&tx_json["transactionIndex"])? as usize;

    let Some(anchor) = beacon::get_block_for_eth(p, &block_hash)? else {
        return Ok(None);
    };
    let Some(receipts_json) = block_receipts(p, &anchor)? else {
        return Ok(None);
    };

    let receipts = receipts_json
        .as_array()
        .ok_or_else(|| ColibriError::Upstream("eth_getBlockReceipts: not an array".into()))?;
    let trie = match receipts_trie(&anchor, receipts) {
        Ok(trie) => trie,
        // A node serving inconsistent receipts gets one more chance on a
        // different node before the error is final.
        Err(e) => {
            let block_hex = format!("0x{:x}", anchor.exec_block_number);
            if p.retry_rpc("eth_getBlockReceipts", serde_json::json!([block_hex])) {
                return Ok(None);
            }
            return Err(e);
        }
    };
    let proof = trie.proof(&mpt::index_key(index));

    let receipt_json = receipts
        .get(index)
        .ok_or_else(|| ColibriError::Upstream(format!("receipt {} missing from block", index)))?;

    let witnesses = beacon::body_multiproof(&anchor, RECEIPT_LEAVES, &[])?;
    let proof_value = Value::Items(vec![
        Value::Uint(index as u64),
        Value::Items(proof.into_iter().map(Value::Bytes).collect()),
        beacon::state_proof_value(&anchor, witnesses),
    ]);

    finish_request(
        (catalog::DATA_RECEIPT, receipt_data_value(receipt_json)?),
        (catalog::PROOF_RECEIPT, proof_value),
        Some(anchor.sync_data_value()),
    )
    .map(Some)
}

pub(crate) fn block_receipts(
    p: &mut Proofer,
    anchor: &BeaconAnchor,
) -> Result<Option<serde_json::Value>> {
    let block_hex = format!("0x{:x}", anchor.exec_block_number);
    p.rpc("eth_getBlockReceipts", serde_json::json!([block_hex]))
}

/// Rebuild the receipts trie and check it against the beacon payload.
pub(crate) fn receipts_trie(
    anchor: &BeaconAnchor,
    receipts: &[serde_json::Value],
) -> Result<OrderedTrie> {
    let encoded: Vec<Vec<u8>> =
        receipts.iter().map(encode_receipt).collect::<Result<Vec<_>>>()?;
    let trie = OrderedTrie::from_indexed(&encoded);
    let receipts_root = anchor
        .body()?
        .field("execution_payload")?
        .field("receipts_root")?
        .as_bytes32()?;
    if trie.root_hash() != receipts_root {
        return Err(ColibriError::Upstream(format!(
            "rebuilt receipts root does not match payload for block {}",
            anchor.exec_block_number
        )));
    }
    Ok(trie)
}

/// Consensus encoding of a receipt: `type || RLP([status, cumulativeGas,
/// bloom, logs])`, with the type byte omitted for legacy receipts.
pub(crate) fn encode_receipt(receipt: &serde_json::Value) -> Result<Vec<u8>> {
    let ty = opt_hex_u64(&receipt["type"]) as u8;
    let status_item = if let Some(root) = receipt["root"].as_str() {
        // Pre-Byzantium receipts commit to a state root instead of a status.
        mpt::rlp_string(&opt_hex_bytes(&serde_json::Value::String(root.to_string())))
    } else {
        rlp_uint(opt_hex_u64(&receipt["status"]))
    };
    let bloom = opt_hex_bytes(&receipt["logsBloom"]);
    if bloom.len() != 256 {
        return Err(ColibriError::Upstream("receipt bloom must be 256 bytes".into()));
    }
    let logs: Vec<Vec<u8>> = receipt["logs"]
        .as_array()
        .map(|logs| logs.iter().map(encode_log).collect::<Result<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();

    let payload = mpt::rlp_list(&[
        status_item,
        rlp_uint(opt_hex_u64(&receipt["cumulativeGasUsed"])),
        mpt::rlp_string(&bloom),
        mpt::rlp_list(&logs),
    ]);
    if ty == 0 {
        Ok(payload)
    } else {
        let mut out = Vec::with_capacity(payload.len() + 1);
        out.push(ty);
        out.extend_from_slice(&payload);
        Ok(out)
    }
}

fn encode_log(log: &serde_json::Value) -> Result<Vec<u8>> {
    let address = opt_hex_bytes(&log["address"]);
    let topics: Vec<Vec<u8>> = log["topics"]
        .as_array()
        .map(|t| t.iter().map(|x| mpt::rlp_string(&opt_hex_bytes(x))).collect())
        .unwrap_or_default();
    Ok(mpt::rlp_list(&[
        mpt::rlp_string(&address),
        mpt::rlp_list(&topics),
        mpt::rlp_string(&opt_hex_bytes(&log["data"])),
    ]))
}

fn rlp_uint(value: u64) -> Vec<u8> {
    alloy_rlp::encode(value)
}

pub(crate) fn log_value(log: &serde_json::Value) -> Result<Value> {
    let topics = log["topics"]
        .as_array()
        .map(|t| t.iter().map(|x| Value::Bytes(opt_b256(x).to_vec())).collect())
        .unwrap_or_default();
    let mut address = opt_hex_bytes(&log["address"]);
    address.resize(20, 0);
    Ok(Value::Items(vec![
        Value::Bytes(address),
        Value::Items(topics),
        Value::Bytes(opt_hex_bytes(&log["data"])),
        Value::Uint(opt_hex_u64(&log["blockNumber"])),
        Value::Bytes(opt_b256(&log["transactionHash"]).to_vec()),
        Value::Uint(opt_hex_u64(&log["transactionIndex"])),
        Value::Bytes(opt_b256(&log["blockHash"]).to_vec()),
        Value::Uint(opt_hex_u64(&log["logIndex"])),
        Value::Bool(log["removed"].as_bool().unwrap_or(false)),
    ]))
}

pub(crate) fn receipt_data_value(receipt: &serde_json::Value) -> Result<Value> {
    let logs = receipt["logs"]
        .as_array()
        .map(|l| l.iter().map(log_value).collect::<Result<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();
    let mut contract = opt_hex_bytes(&receipt["contractAddress"]);
    contract.truncate(20);
    let mut to = opt_hex_bytes(&receipt["to"]);
    to.truncate(20);
    let mut from = opt_hex_bytes(&receipt["from"]);
    from.resize(20, 0);
    let mut bloom = opt_hex_bytes(&receipt["logsBloom"]);
    bloom.resize(256, 0);
    Ok(Value::Items(vec![
        Value::Bytes(opt_b256(&receipt["blockHash"]).to_vec()),
        Value::Uint(opt_hex_u64(&receipt["blockNumber"])),
        Value::Bytes(opt_b256(&receipt["transactionHash"]).to_vec()),
        Value::Uint(opt_hex_u64(&receipt["transactionIndex"])),
        Value::Uint(opt_hex_u64(&receipt["type"])),
        Value::Uint(opt_hex_u64(&receipt["status"])),
        Value::Uint(opt_hex_u64(&receipt["cumulativeGasUsed"])),
        Value::Uint(opt_hex_u64(&receipt["gasUsed"])),
        Value::Bytes(contract),
        Value::Items(logs),
        Value::Bytes(bloom),
        Value::Uint(opt_hex_u64(&receipt["effectiveGasPrice"])),
        Value::Bytes(from),
        Value::Bytes(to),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_receipt() -> serde_json::Value {
        json!({
            "type": "0x2",
            "status": "0x1",
            "cumulativeGasUsed": "0x5208",
            "gasUsed": "0x5208",
            "logsBloom": format!("0x{}", "00".repeat(256)),
            "logs": [{
                "address": "0xde0b295669a9fd93d5f28d9ec85e40f4cb697bae",
                "topics": [format!("0x{}", "aa".repeat(32))],
                "data": "0x0102",
                "blockNumber": "0x10",
                "transactionHash": format!("0x{}", "bb".repeat(32)),
                "transactionIndex": "0x0",
                "blockHash": format!("0x{}", "cc".repeat(32)),
                "logIndex": "0x0",
                "removed": false
            }],
            "blockHash": format!("0x{}", "cc".repeat(32)),
            "blockNumber": "0x10",
            "transactionHash": format!("0x{}", "bb".repeat(32)),
            "transactionIndex": "0x0",
            "effectiveGasPrice": "0x3b9aca00",
            "from": "0xde0b295669a9fd93d5f28d9ec85e40f4cb697bae",
            "to": "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"
        })
    }

    #[test]
    fn test_typed_receipt_has_type_prefix() {
        let encoded = encode_receipt(&sample_receipt()).unwrap();
        assert_eq!(encoded[0], 2);
        // The remainder is an RLP list.
        assert!(encoded[1] >= 0xc0);
    }

    #[test]
    fn test_legacy_receipt_is_bare_list() {
        let mut receipt = sample_receipt();
        receipt["type"] = json!("0x0");
        let encoded = encode_receipt(&receipt).unwrap();
        assert!(encoded[0] >= 0xc0);
    }

    #[test]
    fn test_receipt_data_roundtrip() {
        let value = receipt_data_value(&sample_receipt()).unwrap();
        let bytes = crate::ssz::encode(&catalog::ETH_RECEIPT_DATA, &value).unwrap();
        let view = crate::ssz::Ssz::new(&catalog::ETH_RECEIPT_DATA, &bytes);
        view.validate().unwrap();
        assert_eq!(view.field("status").unwrap().as_u64().unwrap(), 1);
        assert_eq!(view.field("logs").unwrap().len().unwrap(), 1);
        let log = view.field("logs").unwrap().at(0).unwrap();
        assert_eq!(log.field("topics").unwrap().len().unwrap(), 1);
        assert_eq!(log.field("data").unwrap().bytes, &[1, 2]);
    }

    #[test]
    fn test_bad_bloom_is_rejected() {
        let mut receipt = sample_receipt();
        receipt["logsBloom"] = json!("0x00");
        assert!(encode_receipt(&receipt).is_err());
    }
}
