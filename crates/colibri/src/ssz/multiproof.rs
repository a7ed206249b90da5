//! Generalized-index navigation and Merkle multiproofs over SSZ values.
//!
//! Witnesses are the minimal helper set: the union of all path siblings
//! minus every node derivable from the leaves, emitted once each in
//! descending gindex order (deepest-first, i.e. bottom-up for a single
//! branch).

use std::collections::{BTreeMap, BTreeSet};

use crate::types::error::{ColibriError, Result};

use super::tree::{hash_pair, length_chunk, log2_ceil, merkle_node, pack_chunks, ZERO_CHUNK};
use super::{strip_bitlist_sentinel, Ssz, TypeDef};

#[derive(Debug, Clone, Copy)]
pub enum PathSeg {
    Field(&'static str),
    Index(usize),
}

fn err(msg: impl Into<String>) -> ColibriError {
    ColibriError::Ssz(msg.into())
}

/// Compose generalized indices: `child` addresses a node inside the subtree
/// rooted at `parent`.
pub fn gindex_concat(parent: u64, child: u64) -> u64 {
    let depth = 63 - child.leading_zeros() as u64;
    (parent << depth) | (child - (1u64 << depth))
}

fn depth_of(gindex: u64) -> u64 {
    63 - gindex.leading_zeros() as u64
}

/// Generalized index of a path inside `ty`'s Merkle tree.
pub fn gindex_of(ty: &TypeDef, path: &[PathSeg]) -> Result<u64> {
    let mut g = 1u64;
    let mut cur = ty;
    for seg in path {
        match (cur, seg) {
            (TypeDef::Container(name, fields), PathSeg::Field(field_name)) => {
                let idx = fields
                    .iter()
                    .position(|f| f.name == *field_name)
                    .ok_or_else(|| err(format!("{} has no field '{}'", name, field_name)))?;
                let depth = log2_ceil(fields.len());
                g = gindex_concat(g, (1u64 << depth) | idx as u64);
                cur = fields[idx].ty;
            }
            (TypeDef::Vector(elem, n), PathSeg::Index(i)) => {
                if i >= n {
                    return Err(err(format!("index {} out of vector bounds {}", i, n)));
                }
                let depth = log2_ceil(*n);
                g = gindex_concat(g, (1u64 << depth) | *i as u64);
                cur = *elem;
            }
            (TypeDef::List(elem, max), PathSeg::Index(i)) => {
                if i >= max {
                    return Err(err(format!("index {} out of list limit {}", i, max)));
                }
                let depth = log2_ceil(*max);
                // Left child of the length mix-in, then down the data tree.
                let local = gindex_concat(2, (1u64 << depth) | *i as u64);
                g = gindex_concat(g, local);
                cur = *elem;
            }
            _ => return Err(err(format!("cannot navigate {} with {:?}", cur.name(), seg))),
        }
    }
    Ok(g)
}

/// One level of a value's own Merkle tree: the child chunk roots, the tree
/// depth above them, an optional mixed-in chunk (length or union selector)
/// and the sub-views to descend into.
struct OwnLayer<'a> {
    depth: usize,
    mix: Option<[u8; 32]>,
    chunks: Vec<[u8; 32]>,
    children: Option<Vec<Ssz<'a>>>,
}

fn chunk_count(byte_len: usize) -> usize {
    (byte_len + 31) / 32
}

fn own_layer<'a>(view: Ssz<'a>) -> Result<OwnLayer<'a>> {
    Ok(match view.ty {
        TypeDef::Uint(_) | TypeDef::Boolean => {
            let mut chunk = [0u8; 32];
            chunk[..view.bytes.len().min(32)].copy_from_slice(view.bytes);
            OwnLayer { depth: 0, mix: None, chunks: vec![chunk], children: None }
        }
        TypeDef::Bytes(n) => OwnLayer {
            depth: log2_ceil(chunk_count(*n)),
            mix: None,
            chunks: pack_chunks(view.bytes),
            children: None,
        },
        TypeDef::ByteList(max) => OwnLayer {
            depth: log2_ceil(chunk_count(*max)),
            mix: Some(length_chunk(view.bytes.len() as u64)),
            chunks: pack_chunks(view.bytes),
            children: None,
        },
        TypeDef::BitVector(n) => OwnLayer {
            depth: log2_ceil((n + 255) / 256),
            mix: None,
            chunks: pack_chunks(view.bytes),
            children: None,
        },
        TypeDef::BitList(max) => {
            let (data, bit_len) = strip_bitlist_sentinel(view.bytes)?;
            OwnLayer {
                depth: log2_ceil((max + 255) / 256),
                mix: Some(length_chunk(bit_len as u64)),
                chunks: pack_chunks(&data),
                children: None,
            }
        }
        TypeDef::Vector(elem, n) => match elem.fixed_size() {
            Some(size) if elem.is_basic() => OwnLayer {
                depth: log2_ceil(chunk_count(size * n)),
                mix: None,
                chunks: pack_chunks(view.bytes),
                children: None,
            },
            _ => {
                let mut chunks = Vec::with_capacity(*n);
                let mut children = Vec::with_capacity(*n);
                for i in 0..*n {
                    let child = view.at(i)?;
                    chunks.push(child.hash_tree_root()?);
                    children.push(child);
                }
                OwnLayer { depth: log2_ceil(*n), mix: None, chunks, children: Some(children) }
            }
        },
        TypeDef::List(elem, max) => match elem.fixed_size() {
            Some(size) if elem.is_basic() => {
                let count = if size == 0 { 0 } else { view.bytes.len() / size };
                OwnLayer {
                    depth: log2_ceil(chunk_count(size * max)),
                    mix: Some(length_chunk(count as u64)),
                    chunks: pack_chunks(view.bytes),
                    children: None,
                }
            }
            _ => {
                let count = view.len()?;
                let mut chunks = Vec::with_capacity(count);
                let mut children = Vec::with_capacity(count);
                for i in 0..count {
                    let child = view.at(i)?;
                    chunks.push(child.hash_tree_root()?);
                    children.push(child);
                }
                OwnLayer {
                    depth: log2_ceil(*max),
                    mix: Some(length_chunk(count as u64)),
                    chunks,
                    children: Some(children),
                }
            }
        },
        TypeDef::Container(_, fields) => {
            let ranges = super::container_ranges(fields, view.bytes)?;
            let mut chunks = Vec::with_capacity(fields.len());
            let mut children = Vec::with_capacity(fields.len());
            for (i, f) in fields.iter().enumerate() {
                let (start, end) = ranges[i];
                let child = Ssz::new(f.ty, &view.bytes[start..end]);
                chunks.push(child.hash_tree_root()?);
                children.push(child);
            }
            OwnLayer { depth: log2_ceil(fields.len()), mix: None, chunks, children: Some(children) }
        }
        TypeDef::Union(..) => {
            let (selector, inner) = view.union_variant()?;
            OwnLayer {
                depth: 0,
                mix: Some(length_chunk(selector as u64)),
                chunks: vec![inner.hash_tree_root()?],
                children: Some(vec![inner]),
            }
        }
        TypeDef::None => OwnLayer { depth: 0, mix: None, chunks: vec![ZERO_CHUNK], children: None },
    })
}

/// Take the top path step of a gindex: which immediate child (2 or 3), and
/// the remaining gindex within that child's subtree.
fn split_top(g: u64) -> (u64, u64) {
    let depth = depth_of(g);
    let bit = (g >> (depth - 1)) & 1;
    let mask = (1u64 << (depth - 1)) - 1;
    (2 + bit, (g & mask) | (1u64 << (depth - 1)))
}

/// Hash of the tree node at `gindex` within the value's Merkle tree.
pub fn node_hash(view: Ssz<'_>, gindex: u64) -> Result<[u8; 32]> {
    if gindex == 0 {
        return Err(err("gindex 0 is invalid"));
    }
    if gindex == 1 {
        return view.hash_tree_root();
    }
    let layer = own_layer(view)?;
    let mut g = gindex;
    if let Some(mix) = layer.mix {
        let (child, rest) = split_top(g);
        if child == 3 {
            if rest != 1 {
                return Err(err("cannot descend into a mixed-in chunk"));
            }
            return Ok(mix);
        }
        g = rest;
        if g == 1 {
            return Ok(merkle_node(&layer.chunks, 0, layer.depth));
        }
    }
    let gd = depth_of(g) as usize;
    if gd <= layer.depth {
        let index = ((g - (1u64 << gd)) as usize) << (layer.depth - gd);
        return Ok(merkle_node(&layer.chunks, index, layer.depth - gd));
    }
    // Deeper than this value's own leaves: descend into a child subtree.
    let children = layer
        .children
        .ok_or_else(|| err("cannot descend below packed leaves"))?;
    let shift = gd - layer.depth;
    let child_index = ((g >> shift) - (1u64 << layer.depth)) as usize;
    let sub = (g & ((1u64 << shift) - 1)) | (1u64 << shift);
    if child_index >= children.len() {
        return Err(err(format!(
            "gindex descends into zero padding (child {} of {})",
            child_index,
            children.len()
        )));
    }
    node_hash(children[child_index], sub)
}

/// Helper (witness) gindices for proving `indices`, deduplicated and in
/// descending order.
pub fn helper_gindices(indices: &[u64]) -> Vec<u64> {
    let mut helpers: BTreeSet<u64> = BTreeSet::new();
    let mut on_path: BTreeSet<u64> = BTreeSet::new();
    for &leaf in indices {
        let mut g = leaf;
        while g > 1 {
            helpers.insert(g ^ 1);
            on_path.insert(g);
            g >>= 1;
        }
        on_path.insert(1);
    }
    let mut out: Vec<u64> = helpers.difference(&on_path).copied().collect();
    out.sort_unstable_by(|a, b| b.cmp(a));
    out
}

/// Witness hashes proving every gindex in `indices` against the value root.
pub fn build_multiproof(view: Ssz<'_>, indices: &[u64]) -> Result<Vec<[u8; 32]>> {
    helper_gindices(indices)
        .iter()
        .map(|g| node_hash(view, *g))
        .collect()
}

/// Reconstruct the root from `(gindex, leaf)` pairs plus witnesses produced
/// by [`build_multiproof`]; compare against the expected root.
pub fn verify_multiproof(
    leaves: &[(u64, [u8; 32])],
    proof: &[[u8; 32]],
    root: [u8; 32],
) -> bool {
    let indices: Vec<u64> = leaves.iter().map(|(g, _)| *g).collect();
    let helpers = helper_gindices(&indices);
    if helpers.len() != proof.len() {
        return false;
    }
    let mut nodes: BTreeMap<u64, [u8; 32]> = BTreeMap::new();
    for (g, h) in leaves {
        nodes.insert(*g, *h);
    }
    for (g, h) in helpers.iter().zip(proof.iter()) {
        nodes.insert(*g, *h);
    }
    loop {
        let Some((&g, _)) = nodes.iter().next_back() else {
            return false;
        };
        if g == 1 {
            return nodes.get(&1) == Some(&root);
        }
        let Some(&own) = nodes.get(&g) else { return false };
        let Some(&sibling) = nodes.get(&(g ^ 1)) else {
            return false;
        };
        let parent = if g & 1 == 0 {
            hash_pair(&own, &sibling)
        } else {
            hash_pair(&sibling, &own)
        };
        nodes.remove(&g);
        nodes.remove(&(g ^ 1));
        if let Some(existing) = nodes.get(&(g >> 1)) {
            if *existing != parent {
                return false;
            }
        }
        nodes.insert(g >> 1, parent);
    }
}
