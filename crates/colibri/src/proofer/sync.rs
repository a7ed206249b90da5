//! `eth_proof_sync`: the zk guest input for one sync-committee transition.
//!
//! Two consecutive light-client updates provide the signing committee
//! (period `target-2`'s next committee) and the transition being proven
//! (period `target-1`'s update). The emitted branch walks from the next
//! committee's pubkeys root all the way to the signing root: one
//! aggregate-pubkey helper node, the update's committee branch, then the
//! four header/domain nodes.

use crate::ssz::tree::{hash_pair, ZERO_CHUNK};
use crate::ssz::{self, catalog, multiproof::gindex_concat, Ssz, Value};
use crate::store::lcu;
use crate::types::error::{ColibriError, Result};

use super::{bytes_to_bits, finish_request, str_u64, Proofer};

pub fn build(p: &mut Proofer) -> Result<Option<Vec<u8>>> {
    let target = p
        .param(0)
        .map(str_u64)
        .transpose()?
        .ok_or_else(|| ColibriError::InvalidParams("missing period".into()))?;
    if target < 2 {
        return Err(ColibriError::InvalidParams(
            "sync proofs start at period 2".into(),
        ));
    }

    let Some(bytes) =
        p.internal(&format!("lcu?start_period={}&count=2", target - 2))?
    else {
        return Ok(None);
    };
    let frames = lcu::parse_frames(p.spec, &bytes)?;
    if frames.len() != 2 {
        return Err(ColibriError::Upstream(format!(
            "expected 2 light client updates, got {}",
            frames.len()
        )));
    }

    let prev = Ssz::new(catalog::light_client_update(frames[0].fork), frames[0].payload);
    let cur = Ssz::new(catalog::light_client_update(frames[1].fork), frames[1].payload);
    prev.validate()?;
    cur.validate()?;

    let current_keys = prev.field("next_sync_committee")?.field("pubkeys")?.bytes;
    let committee = cur.field("next_sync_committee")?;
    let next_keys = committee.field("pubkeys")?.bytes;
    let aggregate_root =
        ssz::hash_tree_root(&catalog::BYTES48, committee.field("aggregate_pubkey")?.bytes)?;

    let attested = cur.field("attested_header")?.field("beacon")?;
    let slot = attested.field("slot")?.as_u64()?;
    let proposer_index = attested.field("proposer_index")?.as_u64()?;
    if slot >> 13 != target - 1 {
        return Err(ColibriError::Upstream(format!(
            "update attests slot {} outside period {}",
            slot,
            target - 1
        )));
    }

    let aggregate = cur.field("sync_aggregate")?;
    let bits = aggregate.field("sync_committee_bits")?.bytes;
    let signature = aggregate.field("sync_committee_signature")?.bytes;
    let signature_slot = cur.field("signature_slot")?.as_u64()?;

    // Branch from the pubkeys root up to the signing root.
    let mut branch: Vec<[u8; 32]> = vec![aggregate_root];
    let committee_branch = cur.field("next_sync_committee_branch")?;
    for i in 0..committee_branch.len()? {
        branch.push(committee_branch.at(i)?.as_bytes32()?);
    }
    let mut slot_chunk = [0u8; 32];
    slot_chunk[..8].copy_from_slice(&slot.to_le_bytes());
    let mut proposer_chunk = [0u8; 32];
    proposer_chunk[..8].copy_from_slice(&proposer_index.to_le_bytes());
    branch.push(attested.field("parent_root")?.as_bytes32()?);
    branch.push(hash_pair(&slot_chunk, &proposer_chunk));
    branch.push(hash_pair(&attested.field("body_root")?.as_bytes32()?, &ZERO_CHUNK));
    branch.push(p.spec.sync_committee_domain(signature_slot));

    // SigningData.header.state_root (19) composed with the state's
    // next_sync_committee, then one more level down to its pubkeys.
    const SIGNING_DATA_STATE_ROOT_GINDEX: u64 = 19;
    let gindex = gindex_concat(
        SIGNING_DATA_STATE_ROOT_GINDEX,
        catalog::next_sync_committee_gindex(frames[1].fork),
    ) * 2;

    let proof_value = Value::Items(vec![
        keys_value(current_keys)?,
        keys_value(next_keys)?,
        Value::Bits(bytes_to_bits(bits, 512)),
        Value::Bytes(signature.to_vec()),
        Value::Uint(gindex),
        Value::Uint(slot),
        Value::Uint(proposer_index),
        Value::Items(branch.into_iter().map(|n| Value::Bytes(n.to_vec())).collect()),
    ]);

    finish_request(
        (catalog::DATA_NONE, Value::None),
        (catalog::PROOF_SYNC, proof_value),
        None,
    )
    .map(Some)
}

fn keys_value(keys: &[u8]) -> Result<Value> {
    if keys.len() != 512 * 48 {
        return Err(ColibriError::Ssz(format!(
            "sync committee keys must be 24576 bytes, got {}",
            keys.len()
        )));
    }
    Ok(Value::Items(
        keys.chunks(48).map(|k| Value::Bytes(k.to_vec())).collect(),
    ))
}
