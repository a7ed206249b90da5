//! Block proofs: the full execution payload plus a one-leaf multiproof
//! anchoring its root into the beacon body. The verifier re-hashes the
//! payload and derives the JSON result itself.

use crate::ssz::{catalog, multiproof::PathSeg, Value};
use crate::types::error::Result;

use super::beacon;
use super::{finish_request, Proofer};

pub fn build(p: &mut Proofer) -> Result<Option<Vec<u8>>> {
    let block_ref = p.param_str(0)?.to_string();
    let Some(anchor) = beacon::get_block_for_eth(p, &block_ref)? else {
        return Ok(None);
    };

    let payload_bytes = {
        let body = anchor.body()?;
        body.field("execution_payload")?.bytes.to_vec()
    };
    let witnesses =
        beacon::body_multiproof(&anchor, &[], &[vec![PathSeg::Field("execution_payload")]])?;

    let proof_value = Value::Items(vec![
        Value::Bytes(payload_bytes),
        beacon::state_proof_value(&anchor, witnesses),
    ]);

    finish_request(
        (catalog::DATA_NONE, Value::None),
        (catalog::PROOF_BLOCK, proof_value),
        Some(anchor.sync_data_value()),
    )
    .map(Some)
}
