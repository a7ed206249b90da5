//! Log proofs: one receipt proof per matching receipt, grouped per block.
//!
//! Blocks resolve independently; a pass over all groups issues every
//! outstanding request before yielding, so the host fetches them in
//! parallel.

use std::collections::BTreeMap;

use crate::mpt;
use crate::ssz::{catalog, Value};
use crate::types::error::{ColibriError, Result};

use super::beacon;
use super::receipt::{block_receipts, log_value, receipts_trie, RECEIPT_LEAVES};
use super::{finish_request, hex_u64, Proofer};

const MAX_BLOCKS: usize = 256;

pub fn build(p: &mut Proofer) -> Result<Option<Vec<u8>>> {
    let filter = p
        .param(0)
        .cloned()
        .ok_or_else(|| ColibriError::InvalidParams("missing filter".into()))?;
    let Some(logs_json) = p.rpc("eth_getLogs", serde_json::json!([filter]))? else {
        return Ok(None);
    };
    let logs = logs_json
        .as_array()
        .ok_or_else(|| ColibriError::Upstream("eth_getLogs: not an array".into()))?;

    // Group matching logs by block.
    let mut by_block: BTreeMap<u64, Vec<&serde_json::Value>> = BTreeMap::new();
    for log in logs {
        by_block.entry(hex_u64(&log["blockNumber"])?).or_default().push(log);
    }
    if by_block.len() > MAX_BLOCKS {
        return Err(ColibriError::InvalidParams(format!(
            "filter matches logs in {} blocks (limit {})",
            by_block.len(),
            MAX_BLOCKS
        )));
    }

    let mut blocks = Vec::with_capacity(by_block.len());
    let mut data_logs = Vec::with_capacity(logs.len());
    let mut waiting = false;

    for (block_number, block_logs) in &by_block {
        let block_ref = format!("0x{:x}", block_number);
        let Some(anchor) = beacon::get_block_for_eth(p, &block_ref)? else {
            waiting = true;
            continue;
        };
        let Some(receipts_json) = block_receipts(p, &anchor)? else {
            waiting = true;
            continue;
        };
        if waiting {
            // Data for this block is complete, but an earlier block is
            // still fetching; skip the CPU-heavy part until all arrived.
            continue;
        }
        let receipts = receipts_json
            .as_array()
            .ok_or_else(|| ColibriError::Upstream("eth_getBlockReceipts: not an array".into()))?;
        let trie = match receipts_trie(&anchor, receipts) {
            Ok(trie) => trie,
            Err(e) => {
                let block_hex = format!("0x{:x}", anchor.exec_block_number);
                if p.retry_rpc("eth_getBlockReceipts", serde_json::json!([block_hex])) {
                    waiting = true;
                    continue;
                }
                return Err(e);
            }
        };

        let mut indices: Vec<u64> = block_logs
            .iter()
            .map(|l| hex_u64(&l["transactionIndex"]))
            .collect::<Result<Vec<_>>>()?;
        indices.sort_unstable();
        indices.dedup();

        let entries = indices
            .iter()
            .map(|idx| {
                let proof = trie.proof(&mpt::index_key(*idx as usize));
                Value::Items(vec![
                    Value::Uint(*idx),
                    Value::Items(proof.into_iter().map(Value::Bytes).collect()),
                ])
            })
            .collect();

        let witnesses = beacon::body_multiproof(&anchor, RECEIPT_LEAVES, &[])?;
        blocks.push(Value::Items(vec![
            Value::Uint(*block_number),
            Value::Items(entries),
            beacon::state_proof_value(&anchor, witnesses),
        ]));
        for log in block_logs {
            data_logs.push(log_value(log)?);
        }
    }

    if waiting {
        return Ok(None);
    }

    finish_request(
        (catalog::DATA_LOGS, Value::Items(data_logs)),
        (catalog::PROOF_LOGS, Value::Items(vec![Value::Items(blocks)])),
        None,
    )
    .map(Some)
}
