//! `eth_call` proofs.
//!
//! `debug_traceCall` with the prestate tracer reveals every account and
//! storage slot the call touches; each one gets an `eth_getProof` anchored
//! on the same state root. All account proofs are requested in a single
//! pass so the host can fetch them in parallel.

use crate::ssz::{catalog, Value};
use crate::types::error::{ColibriError, Result};

use super::account::account_value;
use super::beacon;
use super::{finish_request, hex_bytes, Proofer, FLAG_INCLUDE_CODE};

pub fn build(p: &mut Proofer) -> Result<Option<Vec<u8>>> {
    let call_obj = p
        .param(0)
        .cloned()
        .ok_or_else(|| ColibriError::InvalidParams("missing call object".into()))?;
    let block_ref = p.param(1).and_then(|v| v.as_str()).unwrap_or("latest").to_string();

    let Some(anchor) = beacon::get_block_for_eth(p, &block_ref)? else {
        return Ok(None);
    };
    let block_hex = format!("0x{:x}", anchor.exec_block_number);

    let trace = p.rpc(
        "debug_traceCall",
        serde_json::json!([call_obj, block_hex, {"tracer": "prestateTracer"}]),
    )?;
    let call_result = p.rpc("eth_call", serde_json::json!([call_obj, block_hex]))?;
    let (Some(trace), Some(call_result)) = (trace, call_result) else {
        return Ok(None);
    };

    let touched = trace
        .as_object()
        .ok_or_else(|| ColibriError::Upstream("prestateTracer: not an object".into()))?;

    let include_code = p.flags & FLAG_INCLUDE_CODE != 0;
    let mut accounts = Vec::with_capacity(touched.len());
    let mut waiting = false;
    for (address, state) in touched {
        let keys: Vec<String> = state["storage"]
            .as_object()
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default();
        let Some(proof_json) =
            p.rpc("eth_getProof", serde_json::json!([address, keys, block_hex]))?
        else {
            waiting = true;
            continue;
        };
        if waiting {
            continue;
        }
        let code = if include_code && state["code"].is_string() {
            hex_bytes(&state["code"])?
        } else {
            Vec::new()
        };
        accounts.push(account_value(address, &proof_json, code)?);
    }
    if waiting {
        return Ok(None);
    }

    let state_proof = super::account::account_state_proof(&anchor)?;
    let proof_value = Value::Items(vec![Value::Items(accounts), state_proof]);

    finish_request(
        (catalog::DATA_BYTES, Value::Bytes(hex_bytes(&call_result)?)),
        (catalog::PROOF_CALL, proof_value),
        Some(anchor.sync_data_value()),
    )
    .map(Some)
}
