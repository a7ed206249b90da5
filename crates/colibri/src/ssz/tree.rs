//! SSZ merkleization primitives: chunk packing, zero-subtree hashing,
//! length/selector mix-ins.

use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};

pub const ZERO_CHUNK: [u8; 32] = [0u8; 32];

/// SHA256(left || right).
pub fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Roots of all-zero subtrees by depth: `ZERO_HASHES[0]` is the zero chunk,
/// `ZERO_HASHES[d]` covers `2^d` zero chunks.
static ZERO_HASHES: Lazy<[[u8; 32]; 64]> = Lazy::new(|| {
    let mut table = [[0u8; 32]; 64];
    for depth in 1..64 {
        let below = table[depth - 1];
        table[depth] = hash_pair(&below, &below);
    }
    table
});

pub fn zero_hash(depth: usize) -> [u8; 32] {
    ZERO_HASHES[depth]
}

pub fn log2_ceil(value: usize) -> usize {
    if value <= 1 {
        return 0;
    }
    (usize::BITS - (value - 1).leading_zeros()) as usize
}

/// Split serialized bytes into right-zero-padded 32-byte chunks.
pub fn pack_chunks(bytes: &[u8]) -> Vec<[u8; 32]> {
    if bytes.is_empty() {
        return Vec::new();
    }
    bytes
        .chunks(32)
        .map(|c| {
            let mut chunk = [0u8; 32];
            chunk[..c.len()].copy_from_slice(c);
            chunk
        })
        .collect()
}

/// Root of the virtual node covering `chunks[start .. start + 2^depth)`,
/// where absent chunks are zero.
pub fn merkle_node(chunks: &[[u8; 32]], start: usize, depth: usize) -> [u8; 32] {
    if start >= chunks.len() {
        return zero_hash(depth);
    }
    if depth == 0 {
        return chunks[start];
    }
    let half = 1usize << (depth - 1);
    let left = merkle_node(chunks, start, depth - 1);
    let right = merkle_node(chunks, start + half, depth - 1);
    hash_pair(&left, &right)
}

/// Merkleize chunks into a tree padded with zero chunks to `limit` leaves.
pub fn merkleize(chunks: &[[u8; 32]], limit: usize) -> [u8; 32] {
    let limit = limit.max(chunks.len()).max(1);
    merkle_node(chunks, 0, log2_ceil(limit))
}

pub fn mix_in_length(root: [u8; 32], length: u64) -> [u8; 32] {
    hash_pair(&root, &length_chunk(length))
}

pub fn length_chunk(length: u64) -> [u8; 32] {
    let mut chunk = [0u8; 32];
    chunk[..8].copy_from_slice(&length.to_le_bytes());
    chunk
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_hashes_chain() {
        assert_eq!(zero_hash(0), ZERO_CHUNK);
        assert_eq!(zero_hash(1), hash_pair(&ZERO_CHUNK, &ZERO_CHUNK));
        assert_eq!(zero_hash(2), hash_pair(&zero_hash(1), &zero_hash(1)));
    }

    #[test]
    fn test_log2_ceil() {
        assert_eq!(log2_ceil(0), 0);
        assert_eq!(log2_ceil(1), 0);
        assert_eq!(log2_ceil(2), 1);
        assert_eq!(log2_ceil(3), 2);
        assert_eq!(log2_ceil(8192), 13);
    }

    #[test]
    fn test_merkleize_single_chunk() {
        let chunk = [7u8; 32];
        assert_eq!(merkleize(&[chunk], 1), chunk);
    }

    #[test]
    fn test_merkleize_pads_with_zero() {
        let a = [1u8; 32];
        assert_eq!(merkleize(&[a], 2), hash_pair(&a, &ZERO_CHUNK));
        // Four-leaf tree with one present chunk reuses the zero subtree.
        assert_eq!(
            merkleize(&[a], 4),
            hash_pair(&hash_pair(&a, &ZERO_CHUNK), &zero_hash(1))
        );
    }

    #[test]
    fn test_merkleize_empty_equals_zero_tree() {
        assert_eq!(merkleize(&[], 8192), zero_hash(13));
    }

    #[test]
    fn test_pack_chunks_pads_tail() {
        let chunks = pack_chunks(&[0xff; 33]);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1][0], 0xff);
        assert_eq!(chunks[1][1], 0);
    }

    #[test]
    fn test_mix_in_length() {
        let root = [3u8; 32];
        let mut len_chunk = [0u8; 32];
        len_chunk[0] = 5;
        assert_eq!(mix_in_length(root, 5), hash_pair(&root, &len_chunk));
    }
}
