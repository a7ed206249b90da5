//! Transaction proofs.
//!
//! The raw transaction bytes come straight out of the beacon payload's
//! `transactions` list; the multiproof descends to that list element so the
//! verifier re-hashes the bytes against the body root.

use crate::ssz::{catalog, multiproof::PathSeg, Value};
use crate::types::error::{ColibriError, Result};

use super::beacon;
use super::{
    finish_request, hex_u256_le, hex_u64, opt_b256, opt_hex_bytes, opt_hex_u64, Proofer,
};

pub fn build(p: &mut Proofer) -> Result<Option<Vec<u8>>> {
    // The method params pass through unchanged; the node answers with the
    // full transaction object including its block position.
    let method = p.method.clone();
    let params = p.params.clone();
    let Some(tx_json) = p.rpc(&method, params)? else {
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

    let raw_tx = {
        let body = anchor.body()?;
        let txs = body.field("execution_payload")?.field("transactions")?;
        if index >= txs.len()? {
            return Err(ColibriError::Upstream(format!(
                "transaction index {} not in payload ({} transactions)",
                index,
                txs.len()?
            )));
        }
        txs.at(index)?.bytes.to_vec()
    };

    let extra = vec![vec![
        PathSeg::Field("execution_payload"),
        PathSeg::Field("transactions"),
        PathSeg::Index(index),
    ]];
    let witnesses = beacon::body_multiproof(&anchor, &["block_number", "block_hash"], &extra)?;

    let proof_value = Value::Items(vec![
        Value::Bytes(raw_tx),
        Value::Uint(index as u64),
        beacon::state_proof_value(&anchor, witnesses),
    ]);

    finish_request(
        (catalog::DATA_TX, tx_data_value(&tx_json)?),
        (catalog::PROOF_TRANSACTION, proof_value),
        Some(anchor.sync_data_value()),
    )
    .map(Some)
}

/// `EthTxData` container from a JSON-RPC transaction object.
pub(crate) fn tx_data_value(tx: &serde_json::Value) -> Result<Value> {
    let mut to = opt_hex_bytes(&tx["to"]);
    to.truncate(20);
    Ok(Value::Items(vec![
        Value::Bytes(opt_b256(&tx["blockHash"]).to_vec()),
        Value::Uint(opt_hex_u64(&tx["blockNumber"])),
        Value::Bytes(opt_b256(&tx["hash"]).to_vec()),
        Value::Uint(opt_hex_u64(&tx["transactionIndex"])),
        Value::Uint(opt_hex_u64(&tx["type"])),
        Value::Uint(opt_hex_u64(&tx["nonce"])),
        Value::Uint(opt_hex_u64(&tx["gas"])),
        Value::Uint(opt_hex_u64(&tx["gasPrice"])),
        Value::Uint(opt_hex_u64(&tx["maxFeePerGas"])),
        Value::Uint(opt_hex_u64(&tx["maxPriorityFeePerGas"])),
        Value::U256(hex_u256_le(&tx["value"]).unwrap_or([0u8; 32])),
        Value::Bytes(opt_hex_bytes(&tx["input"])),
        Value::Bytes(to),
        Value::Uint(opt_hex_u64(&tx["v"])),
        Value::Bytes(opt_b256(&tx["r"]).to_vec()),
        Value::Bytes(opt_b256(&tx["s"]).to_vec()),
        Value::Uint(opt_hex_u64(&tx["chainId"])),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tx_data_roundtrip() {
        let tx = json!({
            "blockHash": format!("0x{}", "ab".repeat(32)),
            "blockNumber": "0x10",
            "hash": format!("0x{}", "cd".repeat(32)),
            "transactionIndex": "0x3",
            "type": "0x2",
            "nonce": "0x7",
            "gas": "0x5208",
            "maxFeePerGas": "0x77359400",
            "maxPriorityFeePerGas": "0x3b9aca00",
            "value": "0xde0b6b3a7640000",
            "input": "0x",
            "to": "0xde0b295669a9fd93d5f28d9ec85e40f4cb697bae",
            "v": "0x1",
            "r": format!("0x{}", "11".repeat(32)),
            "s": format!("0x{}", "22".repeat(32)),
            "chainId": "0x1",
        });
        let value = tx_data_value(&tx).unwrap();
        let bytes = crate::ssz::encode(&catalog::ETH_TX_DATA, &value).unwrap();
        let view = crate::ssz::Ssz::new(&catalog::ETH_TX_DATA, &bytes);
        view.validate().unwrap();
        assert_eq!(view.field("block_number").unwrap().as_u64().unwrap(), 16);
        assert_eq!(view.field("transaction_index").unwrap().as_u64().unwrap(), 3);
        assert_eq!(view.field("gas").unwrap().as_u64().unwrap(), 21000);
        assert_eq!(view.field("to").unwrap().bytes.len(), 20);
        // Legacy gasPrice was absent and defaults to zero.
        assert_eq!(view.field("gas_price").unwrap().as_u64().unwrap(), 0);
    }

    #[test]
    fn test_contract_creation_has_empty_to() {
        let tx = json!({ "to": null, "value": "0x0" });
        let value = tx_data_value(&tx).unwrap();
        let bytes = crate::ssz::encode(&catalog::ETH_TX_DATA, &value).unwrap();
        let view = crate::ssz::Ssz::new(&catalog::ETH_TX_DATA, &bytes);
        assert!(view.field("to").unwrap().bytes.is_empty());
    }
}
