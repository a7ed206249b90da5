//! Ordered Merkle-Patricia tries for transaction and receipt proofs.
//!
//! The trie is keyed by `RLP(index)` and holds the raw encoded transaction
//! or receipt. Nodes use the hex-prefix compact path encoding; references
//! shorter than 32 bytes are embedded in their parent, everything else is
//! referenced by keccak-256 hash.

use tiny_keccak::{Hasher, Keccak};

/// keccak256 of the empty trie node, the root of an empty trie.
pub const EMPTY_TRIE_ROOT: [u8; 32] = [
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8,
    0x6e, 0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63,
    0xb4, 0x21,
];

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

#[derive(Debug, Clone)]
enum Node {
    Empty,
    Leaf { path: Vec<u8>, value: Vec<u8> },
    Ext { path: Vec<u8>, child: Box<Node> },
    Branch { children: Box<[Node; 16]>, value: Option<Vec<u8>> },
}

impl Node {
    fn empty_branch() -> Box<[Node; 16]> {
        Box::new(std::array::from_fn(|_| Node::Empty))
    }
}

/// Build-only trie over `RLP(index) -> value` pairs.
pub struct OrderedTrie {
    root: Node,
}

impl OrderedTrie {
    pub fn new() -> Self {
        Self { root: Node::Empty }
    }

    /// Trie of `values[i]` at key `RLP(i)`, as used by the execution layer
    /// for transactions and receipts.
    pub fn from_indexed(values: &[Vec<u8>]) -> Self {
        let mut trie = Self::new();
        for (i, value) in values.iter().enumerate() {
            trie.insert(&index_key(i), value.clone());
        }
        trie
    }

    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) {
        let nibbles = to_nibbles(key);
        let root = std::mem::replace(&mut self.root, Node::Empty);
        self.root = insert_node(root, &nibbles, value);
    }

    pub fn root_hash(&self) -> [u8; 32] {
        keccak256(&encode_node(&self.root))
    }

    /// Proof nodes from the root towards `key`, top-down. Embedded
    /// sub-32-byte children stay inside their parent node.
    pub fn proof(&self, key: &[u8]) -> Vec<Vec<u8>> {
        let nibbles = to_nibbles(key);
        let mut out = vec![encode_node(&self.root)];
        let mut node = &self.root;
        let mut path: &[u8] = &nibbles;
        loop {
            match node {
                Node::Empty | Node::Leaf { .. } => return out,
                Node::Ext { path: ep, child } => {
                    if !path.starts_with(ep) {
                        return out;
                    }
                    path = &path[ep.len()..];
                    let enc = encode_node(child);
                    if enc.len() >= 32 {
                        out.push(enc);
                    }
                    node = child.as_ref();
                }
                Node::Branch { children, .. } => {
                    let Some((&first, rest)) = path.split_first() else {
                        return out;
                    };
                    path = rest;
                    let child = &children[first as usize];
                    if matches!(child, Node::Empty) {
                        return out;
                    }
                    let enc = encode_node(child);
                    if enc.len() >= 32 {
                        out.push(enc);
                    }
                    node = child;
                }
            }
        }
    }
}

impl Default for OrderedTrie {
    fn default() -> Self {
        Self::new()
    }
}

/// Key of the i-th entry in a transactions or receipts trie.
pub fn index_key(index: usize) -> Vec<u8> {
    alloy_rlp::encode(index as u64)
}

fn insert_node(node: Node, path: &[u8], value: Vec<u8>) -> Node {
    match node {
        Node::Empty => Node::Leaf { path: path.to_vec(), value },
        Node::Leaf { path: lp, value: lv } => {
            let common = common_prefix(&lp, path);
            if common == lp.len() && common == path.len() {
                return Node::Leaf { path: lp, value };
            }
            let mut children = Node::empty_branch();
            let mut branch_value = None;
            if lp.len() == common {
                branch_value = Some(lv);
            } else {
                children[lp[common] as usize] =
                    Node::Leaf { path: lp[common + 1..].to_vec(), value: lv };
            }
            if path.len() == common {
                branch_value = Some(value);
            } else {
                children[path[common] as usize] =
                    Node::Leaf { path: path[common + 1..].to_vec(), value };
            }
            let branch = Node::Branch { children, value: branch_value };
            wrap_ext(&path[..common], branch)
        }
        Node::Ext { path: ep, child } => {
            let common = common_prefix(&ep, path);
            if common == ep.len() {
                return Node::Ext {
                    path: ep,
                    child: Box::new(insert_node(*child, &path[common..], value)),
                };
            }
            let mut children = Node::empty_branch();
            let mut branch_value = None;
            let existing = if ep.len() - common == 1 {
                *child
            } else {
                Node::Ext { path: ep[common + 1..].to_vec(), child }
            };
            children[ep[common] as usize] = existing;
            if path.len() == common {
                branch_value = Some(value);
            } else {
                children[path[common] as usize] =
                    Node::Leaf { path: path[common + 1..].to_vec(), value };
            }
            let branch = Node::Branch { children, value: branch_value };
            wrap_ext(&path[..common], branch)
        }
        Node::Branch { mut children, value: bv } => {
            if path.is_empty() {
                return Node::Branch { children, value: Some(value) };
            }
            let idx = path[0] as usize;
            let child = std::mem::replace(&mut children[idx], Node::Empty);
            children[idx] = insert_node(child, &path[1..], value);
            Node::Branch { children, value: bv }
        }
    }
}

fn wrap_ext(prefix: &[u8], node: Node) -> Node {
    if prefix.is_empty() {
        node
    } else {
        Node::Ext { path: prefix.to_vec(), child: Box::new(node) }
    }
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

fn to_nibbles(bytes: &[u8]) -> Vec<u8> {
    let mut nibbles = Vec::with_capacity(bytes.len() * 2);
    for b in bytes {
        nibbles.push(b >> 4);
        nibbles.push(b & 0x0f);
    }
    nibbles
}

/// Hex-prefix compact encoding of a nibble path.
fn compact_encode(nibbles: &[u8], is_leaf: bool) -> Vec<u8> {
    let mut flag: u8 = if is_leaf { 2 } else { 0 };
    let odd = nibbles.len() % 2 == 1;
    if odd {
        flag |= 1;
    }
    let mut out = Vec::with_capacity(nibbles.len() / 2 + 1);
    let mut rest = nibbles;
    if odd {
        out.push((flag << 4) | nibbles[0]);
        rest = &nibbles[1..];
    } else {
        out.push(flag << 4);
    }
    for pair in rest.chunks(2) {
        out.push((pair[0] << 4) | pair[1]);
    }
    out
}

// --- minimal RLP encoding for trie nodes ---

fn rlp_header(prefix_base: u8, payload_len: usize, out: &mut Vec<u8>) {
    if payload_len <= 55 {
        out.push(prefix_base + payload_len as u8);
    } else {
        let len_bytes = payload_len.to_be_bytes();
        let trimmed: Vec<u8> = len_bytes.iter().copied().skip_while(|b| *b == 0).collect();
        out.push(prefix_base + 55 + trimmed.len() as u8);
        out.extend_from_slice(&trimmed);
    }
}

pub(crate) fn rlp_string(bytes: &[u8]) -> Vec<u8> {
    if bytes.len() == 1 && bytes[0] < 0x80 {
        return bytes.to_vec();
    }
    let mut out = Vec::with_capacity(bytes.len() + 4);
    rlp_header(0x80, bytes.len(), &mut out);
    out.extend_from_slice(bytes);
    out
}

/// Assemble an RLP list from already-encoded items.
pub(crate) fn rlp_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload: usize = items.iter().map(|i| i.len()).sum();
    let mut out = Vec::with_capacity(payload + 4);
    rlp_header(0xc0, payload, &mut out);
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

fn child_ref(child: &Node) -> Vec<u8> {
    if matches!(child, Node::Empty) {
        return vec![0x80];
    }
    let enc = encode_node(child);
    if enc.len() >= 32 {
        rlp_string(&keccak256(&enc))
    } else {
        enc
    }
}

fn encode_node(node: &Node) -> Vec<u8> {
    match node {
        Node::Empty => vec![0x80],
        Node::Leaf { path, value } => rlp_list(&[
            rlp_string(&compact_encode(path, true)),
            rlp_string(value),
        ]),
        Node::Ext { path, child } => rlp_list(&[
            rlp_string(&compact_encode(path, false)),
            child_ref(child),
        ]),
        Node::Branch { children, value } => {
            let mut items: Vec<Vec<u8>> = children.iter().map(child_ref).collect();
            items.push(match value {
                Some(v) => rlp_string(v),
                None => vec![0x80],
            });
            rlp_list(&items)
        }
    }
}

// --- proof verification (walk from root, used by tests and callers that
// --- double-check upstream proofs) ---

/// Walk a proof from `root` towards `key`. Returns the value if present,
/// `None` for a valid proof of absence.
pub fn verify_proof(root: &[u8; 32], key: &[u8], proof: &[Vec<u8>]) -> Option<Vec<u8>> {
    if proof.is_empty() {
        return None;
    }
    if keccak256(&proof[0]) != *root {
        return None;
    }
    let nibbles = to_nibbles(key);
    let mut path: &[u8] = &nibbles;
    let mut expected: Option<[u8; 32]> = Some(*root);
    let mut node_index = 0;
    let mut current: Vec<u8> = proof[0].clone();

    loop {
        if let Some(hash) = expected {
            if keccak256(&current) != hash {
                return None;
            }
        }
        let items = rlp_decode_list(&current)?;
        match items.len() {
            2 => {
                let (prefix, is_leaf) = compact_decode(&items[0])?;
                if is_leaf {
                    return if path == prefix.as_slice() {
                        Some(items[1].clone())
                    } else {
                        None
                    };
                }
                if !path.starts_with(&prefix) {
                    return None;
                }
                path = &path[prefix.len()..];
                match follow_ref(&items[1], proof, &mut node_index) {
                    Follow::Next(next, hash) => {
                        current = next;
                        expected = hash;
                    }
                    Follow::Missing => return None,
                }
            }
            17 => {
                let Some((&first, rest)) = path.split_first() else {
                    let value = &items[16];
                    return if value.is_empty() { None } else { Some(value.clone()) };
                };
                path = rest;
                let child = &items[first as usize];
                if child.is_empty() {
                    return None;
                }
                match follow_ref(child, proof, &mut node_index) {
                    Follow::Next(next, hash) => {
                        current = next;
                        expected = hash;
                    }
                    Follow::Missing => return None,
                }
            }
            _ => return None,
        }
    }
}

enum Follow {
    Next(Vec<u8>, Option<[u8; 32]>),
    Missing,
}

fn follow_ref(item: &[u8], proof: &[Vec<u8>], node_index: &mut usize) -> Follow {
    if item.len() == 32 {
        *node_index += 1;
        match proof.get(*node_index) {
            Some(next) => Follow::Next(next.clone(), Some(item.try_into().unwrap())),
            None => Follow::Missing,
        }
    } else {
        // Embedded node: the item bytes are themselves the RLP node. The
        // decoder returned the list payload re-wrapped, so re-encode.
        Follow::Next(item.to_vec(), None)
    }
}

fn compact_decode(encoded: &[u8]) -> Option<(Vec<u8>, bool)> {
    let first = *encoded.first()?;
    let flag = first >> 4;
    let is_leaf = flag >= 2;
    let odd = flag % 2 == 1;
    let mut nibbles = Vec::new();
    if odd {
        nibbles.push(first & 0x0f);
    }
    for b in &encoded[1..] {
        nibbles.push(b >> 4);
        nibbles.push(b & 0x0f);
    }
    Some((nibbles, is_leaf))
}

/// Decode an RLP list into items; nested lists are returned re-encoded so
/// embedded trie nodes stay parseable.
fn rlp_decode_list(data: &[u8]) -> Option<Vec<Vec<u8>>> {
    let (payload, consumed) = rlp_list_payload(data)?;
    if consumed != data.len() {
        return None;
    }
    let mut items = Vec::new();
    let mut offset = 0;
    while offset < payload.len() {
        let (item, used) = rlp_item(&payload[offset..])?;
        items.push(item);
        offset += used;
    }
    Some(items)
}

fn rlp_list_payload(data: &[u8]) -> Option<(&[u8], usize)> {
    let prefix = *data.first()?;
    if prefix < 0xc0 {
        return None;
    }
    if prefix <= 0xf7 {
        let len = (prefix - 0xc0) as usize;
        let total = 1 + len;
        data.get(1..total).map(|p| (p, total))
    } else {
        let len_bytes = (prefix - 0xf7) as usize;
        let mut len = 0usize;
        for b in data.get(1..1 + len_bytes)? {
            len = (len << 8) | *b as usize;
        }
        let total = 1 + len_bytes + len;
        data.get(1 + len_bytes..total).map(|p| (p, total))
    }
}

fn rlp_item(data: &[u8]) -> Option<(Vec<u8>, usize)> {
    let prefix = *data.first()?;
    if prefix <= 0x7f {
        Some((vec![prefix], 1))
    } else if prefix <= 0xb7 {
        let len = (prefix - 0x80) as usize;
        data.get(1..1 + len).map(|b| (b.to_vec(), 1 + len))
    } else if prefix <= 0xbf {
        let len_bytes = (prefix - 0xb7) as usize;
        let mut len = 0usize;
        for b in data.get(1..1 + len_bytes)? {
            len = (len << 8) | *b as usize;
        }
        let total = 1 + len_bytes + len;
        data.get(1 + len_bytes..total).map(|b| (b.to_vec(), total))
    } else {
        // Nested list: keep the full encoding as the item.
        let (_, total) = rlp_list_payload(data)?;
        Some((data[..total].to_vec(), total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_trie_root() {
        assert_eq!(OrderedTrie::new().root_hash(), EMPTY_TRIE_ROOT);
    }

    #[test]
    fn test_index_key_encoding() {
        // RLP(0) = 0x80, small ints are single bytes.
        assert_eq!(index_key(0), vec![0x80]);
        assert_eq!(index_key(1), vec![0x01]);
        assert_eq!(index_key(0x7f), vec![0x7f]);
        assert_eq!(index_key(0x80), vec![0x81, 0x80]);
    }

    #[test]
    fn test_single_entry_proof() {
        let values = vec![b"first receipt".to_vec()];
        let trie = OrderedTrie::from_indexed(&values);
        let root = trie.root_hash();
        let proof = trie.proof(&index_key(0));
        assert_eq!(verify_proof(&root, &index_key(0), &proof), Some(values[0].clone()));
    }

    #[test]
    fn test_many_entries_roundtrip() {
        // Payloads large enough that every node is hash-referenced.
        let values: Vec<Vec<u8>> = (0..64u64)
            .map(|i| {
                let mut v = vec![i as u8; 80];
                v.extend_from_slice(&i.to_be_bytes());
                v
            })
            .collect();
        let trie = OrderedTrie::from_indexed(&values);
        let root = trie.root_hash();
        for (i, expected) in values.iter().enumerate() {
            let key = index_key(i);
            let proof = trie.proof(&key);
            assert_eq!(
                verify_proof(&root, &key, &proof).as_ref(),
                Some(expected),
                "index {}",
                i
            );
        }
    }

    #[test]
    fn test_small_values_embed_nodes() {
        // One-byte values force embedded (sub-32-byte) children.
        let values: Vec<Vec<u8>> = (0..17u8).map(|i| vec![i]).collect();
        let trie = OrderedTrie::from_indexed(&values);
        let root = trie.root_hash();
        for (i, expected) in values.iter().enumerate() {
            let key = index_key(i);
            let proof = trie.proof(&key);
            assert_eq!(verify_proof(&root, &key, &proof).as_ref(), Some(expected));
        }
    }

    #[test]
    fn test_absent_key() {
        let values = vec![b"only".to_vec()];
        let trie = OrderedTrie::from_indexed(&values);
        let root = trie.root_hash();
        let key = index_key(5);
        let proof = trie.proof(&key);
        assert_eq!(verify_proof(&root, &key, &proof), None);
    }

    #[test]
    fn test_root_changes_with_content() {
        let a = OrderedTrie::from_indexed(&[b"x".to_vec()]);
        let b = OrderedTrie::from_indexed(&[b"y".to_vec()]);
        assert_ne!(a.root_hash(), b.root_hash());
    }

    #[test]
    fn test_last_write_wins() {
        let mut trie = OrderedTrie::new();
        trie.insert(&index_key(0), b"old".to_vec());
        trie.insert(&index_key(0), b"new".to_vec());
        let root = trie.root_hash();
        let proof = trie.proof(&index_key(0));
        assert_eq!(verify_proof(&root, &index_key(0), &proof), Some(b"new".to_vec()));
    }
}
