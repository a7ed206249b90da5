//! Dynamic SSZ engine.
//!
//! Types are described by a static [`TypeDef`] catalog; serialized values are
//! read through the zero-copy [`Ssz`] view (a `(type, bytes)` pair) and built
//! with the owned [`Value`] tree. Offsets follow the SSZ container rules:
//! 4-byte little-endian, strictly non-decreasing, first offset equal to the
//! fixed-part length, last segment ending at the container end.

pub mod catalog;
pub mod multiproof;
pub mod tree;

use crate::types::error::{ColibriError, Result};
use tree::{merkleize, mix_in_length, pack_chunks};

#[derive(Debug)]
pub struct Field {
    pub name: &'static str,
    pub ty: &'static TypeDef,
}

#[derive(Debug)]
pub enum TypeDef {
    /// Unsigned integer of the given byte width (1, 2, 4, 8 or 32),
    /// little-endian on the wire.
    Uint(usize),
    Boolean,
    /// `Vector[uint8, N]`.
    Bytes(usize),
    /// `List[uint8, max]`.
    ByteList(usize),
    Vector(&'static TypeDef, usize),
    List(&'static TypeDef, usize),
    BitVector(usize),
    BitList(usize),
    Container(&'static str, &'static [Field]),
    Union(&'static str, &'static [&'static TypeDef]),
    None,
}

impl TypeDef {
    pub fn name(&self) -> &'static str {
        match self {
            TypeDef::Uint(_) => "uint",
            TypeDef::Boolean => "boolean",
            TypeDef::Bytes(_) => "bytes",
            TypeDef::ByteList(_) => "byte_list",
            TypeDef::Vector(..) => "vector",
            TypeDef::List(..) => "list",
            TypeDef::BitVector(_) => "bit_vector",
            TypeDef::BitList(_) => "bit_list",
            TypeDef::Container(name, _) => *name,
            TypeDef::Union(name, _) => *name,
            TypeDef::None => "none",
        }
    }

    /// Basic types pack directly into chunks.
    pub fn is_basic(&self) -> bool {
        matches!(self, TypeDef::Uint(_) | TypeDef::Boolean)
    }

    /// Serialized size for fixed-size types, `None` for dynamic ones.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            TypeDef::Uint(w) => Some(*w),
            TypeDef::Boolean => Some(1),
            TypeDef::Bytes(n) => Some(*n),
            TypeDef::BitVector(n) => Some((n + 7) / 8),
            TypeDef::Vector(elem, n) => elem.fixed_size().map(|s| s * n),
            TypeDef::Container(_, fields) => {
                let mut total = 0;
                for f in *fields {
                    total += f.ty.fixed_size()?;
                }
                Some(total)
            }
            TypeDef::None => Some(0),
            TypeDef::ByteList(_) | TypeDef::BitList(_) | TypeDef::List(..) | TypeDef::Union(..) => {
                None
            }
        }
    }

    /// Length of a container's fixed part, counting 4 bytes per dynamic
    /// field offset.
    pub fn fixed_part_len(fields: &[Field]) -> usize {
        fields
            .iter()
            .map(|f| f.ty.fixed_size().unwrap_or(4))
            .sum()
    }
}

fn err(msg: impl Into<String>) -> ColibriError {
    ColibriError::Ssz(msg.into())
}

fn read_u32_le(bytes: &[u8], pos: usize) -> Result<u32> {
    let slice = bytes
        .get(pos..pos + 4)
        .ok_or_else(|| err(format!("offset read out of bounds at {}", pos)))?;
    Ok(u32::from_le_bytes(slice.try_into().unwrap()))
}

/// Byte ranges of every container field, in declaration order.
pub(crate) fn container_ranges(fields: &[Field], bytes: &[u8]) -> Result<Vec<(usize, usize)>> {
    let fixed_len = TypeDef::fixed_part_len(fields);
    if bytes.len() < fixed_len {
        return Err(err(format!(
            "container too short: {} < fixed part {}",
            bytes.len(),
            fixed_len
        )));
    }
    let mut ranges = vec![(0usize, 0usize); fields.len()];
    let mut dynamic: Vec<(usize, usize)> = Vec::new();
    let mut pos = 0usize;
    for (i, f) in fields.iter().enumerate() {
        match f.ty.fixed_size() {
            Some(size) => {
                ranges[i] = (pos, pos + size);
                pos += size;
            }
            None => {
                let offset = read_u32_le(bytes, pos)? as usize;
                dynamic.push((i, offset));
                pos += 4;
            }
        }
    }
    for (k, (i, offset)) in dynamic.iter().enumerate() {
        let end = if k + 1 < dynamic.len() { dynamic[k + 1].1 } else { bytes.len() };
        if k == 0 && *offset != fixed_len {
            return Err(err(format!(
                "first offset {} does not match fixed part {}",
                offset, fixed_len
            )));
        }
        if end < *offset || end > bytes.len() {
            return Err(err(format!("offsets not monotonic: {}..{}", offset, end)));
        }
        ranges[*i] = (*offset, end);
    }
    Ok(ranges)
}

/// Byte ranges of the elements of a list/vector with dynamic element type.
pub(crate) fn dyn_element_ranges(bytes: &[u8]) -> Result<Vec<(usize, usize)>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    let first = read_u32_le(bytes, 0)? as usize;
    if first == 0 || first % 4 != 0 || first > bytes.len() {
        return Err(err(format!("bad first element offset {}", first)));
    }
    let count = first / 4;
    let mut offsets = Vec::with_capacity(count);
    for i in 0..count {
        offsets.push(read_u32_le(bytes, i * 4)? as usize);
    }
    let mut ranges = Vec::with_capacity(count);
    for i in 0..count {
        let end = if i + 1 < count { offsets[i + 1] } else { bytes.len() };
        if end < offsets[i] || end > bytes.len() {
            return Err(err(format!("offsets not monotonic: {}..{}", offsets[i], end)));
        }
        ranges.push((offsets[i], end));
    }
    Ok(ranges)
}

/// Strip the bit-list sentinel; returns the payload bytes and the bit length.
pub(crate) fn strip_bitlist_sentinel(bytes: &[u8]) -> Result<(Vec<u8>, usize)> {
    let last = bytes
        .iter()
        .rposition(|b| *b != 0)
        .ok_or_else(|| err("bit list missing sentinel"))?;
    let top = 7 - bytes[last].leading_zeros() as usize;
    let bit_len = last * 8 + top;
    let mut data = bytes[..=last].to_vec();
    data[last] &= !(1u8 << top);
    Ok((data, bit_len))
}

/// Zero-copy view over a serialized SSZ value.
#[derive(Clone, Copy)]
pub struct Ssz<'a> {
    pub ty: &'a TypeDef,
    pub bytes: &'a [u8],
}

impl<'a> Ssz<'a> {
    pub fn new(ty: &'a TypeDef, bytes: &'a [u8]) -> Self {
        Self { ty, bytes }
    }

    pub fn field(&self, name: &str) -> Result<Ssz<'a>> {
        let TypeDef::Container(type_name, fields) = self.ty else {
            return Err(err(format!("{} is not a container", self.ty.name())));
        };
        let idx = fields
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| err(format!("{} has no field '{}'", type_name, name)))?;
        let ranges = container_ranges(fields, self.bytes)?;
        let (start, end) = ranges[idx];
        let bytes = self
            .bytes
            .get(start..end)
            .ok_or_else(|| err(format!("field '{}' out of bounds", name)))?;
        Ok(Ssz::new(fields[idx].ty, bytes))
    }

    /// Number of elements of a list/vector (bytes for byte types).
    pub fn len(&self) -> Result<usize> {
        match self.ty {
            TypeDef::Bytes(_) | TypeDef::ByteList(_) => Ok(self.bytes.len()),
            TypeDef::Vector(_, n) => Ok(*n),
            TypeDef::List(elem, _) => match elem.fixed_size() {
                Some(size) => {
                    if size == 0 || self.bytes.len() % size != 0 {
                        return Err(err("list length not a multiple of element size"));
                    }
                    Ok(self.bytes.len() / size)
                }
                None => Ok(dyn_element_ranges(self.bytes)?.len()),
            },
            _ => Err(err(format!("{} has no length", self.ty.name()))),
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn at(&self, index: usize) -> Result<Ssz<'a>> {
        let (elem, count): (&'static TypeDef, Option<usize>) = match self.ty {
            TypeDef::Vector(elem, n) => (*elem, Some(*n)),
            TypeDef::List(elem, _) => (*elem, None),
            _ => return Err(err(format!("{} is not indexable", self.ty.name()))),
        };
        match elem.fixed_size() {
            Some(size) => {
                let count = count.unwrap_or(self.bytes.len() / size.max(1));
                if index >= count {
                    return Err(err(format!("index {} out of bounds ({})", index, count)));
                }
                let start = index * size;
                let bytes = self
                    .bytes
                    .get(start..start + size)
                    .ok_or_else(|| err("element out of bounds"))?;
                Ok(Ssz::new(elem, bytes))
            }
            None => {
                let ranges = dyn_element_ranges(self.bytes)?;
                let (start, end) = *ranges
                    .get(index)
                    .ok_or_else(|| err(format!("index {} out of bounds", index)))?;
                Ok(Ssz::new(elem, &self.bytes[start..end]))
            }
        }
    }

    pub fn union_variant(&self) -> Result<(u8, Ssz<'a>)> {
        let TypeDef::Union(_, variants) = self.ty else {
            return Err(err(format!("{} is not a union", self.ty.name())));
        };
        let selector = *self.bytes.first().ok_or_else(|| err("empty union"))?;
        let ty = variants
            .get(selector as usize)
            .ok_or_else(|| err(format!("union selector {} out of range", selector)))?;
        Ok((selector, Ssz::new(ty, &self.bytes[1..])))
    }

    pub fn as_u64(&self) -> Result<u64> {
        match self.ty {
            TypeDef::Uint(w) if *w <= 8 => {
                if self.bytes.len() != *w {
                    return Err(err("uint width mismatch"));
                }
                let mut buf = [0u8; 8];
                buf[..*w].copy_from_slice(self.bytes);
                Ok(u64::from_le_bytes(buf))
            }
            TypeDef::Boolean => Ok(u64::from(self.bytes.first().copied().unwrap_or(0))),
            _ => Err(err(format!("{} is not a small uint", self.ty.name()))),
        }
    }

    pub fn as_bytes32(&self) -> Result<[u8; 32]> {
        if self.bytes.len() != 32 {
            return Err(err(format!("expected 32 bytes, got {}", self.bytes.len())));
        }
        Ok(self.bytes.try_into().unwrap())
    }

    pub fn hash_tree_root(&self) -> Result<[u8; 32]> {
        hash_tree_root(self.ty, self.bytes)
    }

    /// Recursive structural validation, enforcing the offset invariants on
    /// every nesting level.
    pub fn validate(&self) -> Result<()> {
        match self.ty {
            TypeDef::Uint(w) => {
                if self.bytes.len() != *w {
                    return Err(err(format!("uint{}: bad length {}", w * 8, self.bytes.len())));
                }
            }
            TypeDef::Boolean => {
                if self.bytes.len() != 1 || self.bytes[0] > 1 {
                    return Err(err("invalid boolean"));
                }
            }
            TypeDef::Bytes(n) => {
                if self.bytes.len() != *n {
                    return Err(err(format!("bytes{}: bad length {}", n, self.bytes.len())));
                }
            }
            TypeDef::ByteList(max) => {
                if self.bytes.len() > *max {
                    return Err(err(format!("byte list exceeds max {}", max)));
                }
            }
            TypeDef::BitVector(n) => {
                if self.bytes.len() != (n + 7) / 8 {
                    return Err(err("bit vector length mismatch"));
                }
            }
            TypeDef::BitList(max) => {
                let (_, bit_len) = strip_bitlist_sentinel(self.bytes)?;
                if bit_len > *max {
                    return Err(err(format!("bit list exceeds max {}", max)));
                }
            }
            TypeDef::Vector(elem, n) => match elem.fixed_size() {
                Some(size) => {
                    if self.bytes.len() != size * n {
                        return Err(err("vector length mismatch"));
                    }
                    if !elem.is_basic() {
                        for i in 0..*n {
                            self.at(i)?.validate()?;
                        }
                    }
                }
                None => {
                    let ranges = dyn_element_ranges(self.bytes)?;
                    if ranges.len() != *n {
                        return Err(err("vector element count mismatch"));
                    }
                    for i in 0..ranges.len() {
                        self.at(i)?.validate()?;
                    }
                }
            },
            TypeDef::List(elem, max) => {
                let count = self.len()?;
                if count > *max {
                    return Err(err(format!("list exceeds max {}", max)));
                }
                if !elem.is_basic() {
                    for i in 0..count {
                        self.at(i)?.validate()?;
                    }
                }
            }
            TypeDef::Container(_, fields) => {
                let ranges = container_ranges(fields, self.bytes)?;
                for (i, f) in fields.iter().enumerate() {
                    let (start, end) = ranges[i];
                    Ssz::new(f.ty, &self.bytes[start..end]).validate()?;
                }
            }
            TypeDef::Union(..) => {
                let (_, inner) = self.union_variant()?;
                inner.validate()?;
            }
            TypeDef::None => {
                if !self.bytes.is_empty() {
                    return Err(err("none carries data"));
                }
            }
        }
        Ok(())
    }
}

fn chunk_count(byte_len: usize) -> usize {
    (byte_len + 31) / 32
}

pub fn hash_tree_root(ty: &TypeDef, bytes: &[u8]) -> Result<[u8; 32]> {
    Ok(match ty {
        TypeDef::Uint(_) | TypeDef::Boolean => {
            let mut chunk = [0u8; 32];
            if bytes.len() > 32 {
                return Err(err("basic value exceeds one chunk"));
            }
            chunk[..bytes.len()].copy_from_slice(bytes);
            chunk
        }
        TypeDef::Bytes(n) => merkleize(&pack_chunks(bytes), chunk_count(*n)),
        TypeDef::ByteList(max) => mix_in_length(
            merkleize(&pack_chunks(bytes), chunk_count(*max)),
            bytes.len() as u64,
        ),
        TypeDef::BitVector(n) => merkleize(&pack_chunks(bytes), (n + 255) / 256),
        TypeDef::BitList(max) => {
            let (data, bit_len) = strip_bitlist_sentinel(bytes)?;
            mix_in_length(merkleize(&pack_chunks(&data), (max + 255) / 256), bit_len as u64)
        }
        TypeDef::Vector(elem, n) => match elem.fixed_size() {
            Some(size) if elem.is_basic() => {
                merkleize(&pack_chunks(bytes), chunk_count(size * n))
            }
            _ => {
                let view = Ssz::new(ty, bytes);
                let mut roots = Vec::with_capacity(*n);
                for i in 0..*n {
                    roots.push(view.at(i)?.hash_tree_root()?);
                }
                merkleize(&roots, *n)
            }
        },
        TypeDef::List(elem, max) => match elem.fixed_size() {
            Some(size) if elem.is_basic() => {
                let count = if size == 0 { 0 } else { bytes.len() / size };
                mix_in_length(
                    merkleize(&pack_chunks(bytes), chunk_count(size * max)),
                    count as u64,
                )
            }
            _ => {
                let view = Ssz::new(ty, bytes);
                let count = view.len()?;
                let mut roots = Vec::with_capacity(count);
                for i in 0..count {
                    roots.push(view.at(i)?.hash_tree_root()?);
                }
                mix_in_length(merkleize(&roots, *max), count as u64)
            }
        },
        TypeDef::Container(_, fields) => {
            let ranges = container_ranges(fields, bytes)?;
            let mut roots = Vec::with_capacity(fields.len());
            for (i, f) in fields.iter().enumerate() {
                let (start, end) = ranges[i];
                roots.push(hash_tree_root(f.ty, &bytes[start..end])?);
            }
            merkleize(&roots, fields.len())
        }
        TypeDef::Union(_, variants) => {
            let selector = *bytes.first().ok_or_else(|| err("empty union"))?;
            let inner = variants
                .get(selector as usize)
                .ok_or_else(|| err("union selector out of range"))?;
            let value_root = hash_tree_root(inner, &bytes[1..])?;
            mix_in_length(value_root, selector as u64)
        }
        TypeDef::None => [0u8; 32],
    })
}

/// Owned value tree for constructing SSZ bytes.
#[derive(Debug, Clone)]
pub enum Value {
    Uint(u64),
    U256([u8; 32]),
    Bool(bool),
    Bytes(Vec<u8>),
    Bits(Vec<bool>),
    Items(Vec<Value>),
    Union(u8, Box<Value>),
    None,
}

pub fn encode(ty: &TypeDef, value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_into(ty, value, &mut out)?;
    Ok(out)
}

fn encode_into(ty: &TypeDef, value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match (ty, value) {
        (TypeDef::Uint(w), Value::Uint(x)) if *w <= 8 => {
            if *w < 8 && *x >> (w * 8) != 0 {
                return Err(err(format!("value {} exceeds uint{}", x, w * 8)));
            }
            out.extend_from_slice(&x.to_le_bytes()[..*w]);
        }
        (TypeDef::Uint(32), Value::U256(b)) => out.extend_from_slice(b),
        (TypeDef::Boolean, Value::Bool(b)) => out.push(u8::from(*b)),
        (TypeDef::Bytes(n), Value::Bytes(v)) => {
            if v.len() != *n {
                return Err(err(format!("bytes{}: got {} bytes", n, v.len())));
            }
            out.extend_from_slice(v);
        }
        (TypeDef::ByteList(max), Value::Bytes(v)) => {
            if v.len() > *max {
                return Err(err(format!("byte list exceeds max {}", max)));
            }
            out.extend_from_slice(v);
        }
        (TypeDef::BitVector(n), Value::Bits(bits)) => {
            if bits.len() != *n {
                return Err(err("bit vector length mismatch"));
            }
            out.extend_from_slice(&pack_bits(bits, false));
        }
        (TypeDef::BitList(max), Value::Bits(bits)) => {
            if bits.len() > *max {
                return Err(err("bit list exceeds max"));
            }
            out.extend_from_slice(&pack_bits(bits, true));
        }
        (TypeDef::Vector(elem, n), Value::Items(items)) => {
            if items.len() != *n {
                return Err(err("vector arity mismatch"));
            }
            encode_sequence(elem, items, out)?;
        }
        (TypeDef::List(elem, max), Value::Items(items)) => {
            if items.len() > *max {
                return Err(err(format!("list exceeds max {}", max)));
            }
            encode_sequence(elem, items, out)?;
        }
        (TypeDef::Container(_, fields), Value::Items(items)) => {
            if items.len() != fields.len() {
                return Err(err(format!(
                    "container arity mismatch: {} != {}",
                    items.len(),
                    fields.len()
                )));
            }
            let mut encoded = Vec::with_capacity(fields.len());
            for (f, item) in fields.iter().zip(items) {
                let mut buf = Vec::new();
                encode_into(f.ty, item, &mut buf)?;
                encoded.push(buf);
            }
            let fixed_len = TypeDef::fixed_part_len(fields);
            let mut heap_pos = fixed_len;
            for (f, buf) in fields.iter().zip(&encoded) {
                match f.ty.fixed_size() {
                    Some(_) => out.extend_from_slice(buf),
                    None => {
                        out.extend_from_slice(&(heap_pos as u32).to_le_bytes());
                        heap_pos += buf.len();
                    }
                }
            }
            for (f, buf) in fields.iter().zip(&encoded) {
                if f.ty.fixed_size().is_none() {
                    out.extend_from_slice(buf);
                }
            }
        }
        (TypeDef::Union(_, variants), Value::Union(selector, inner)) => {
            let variant = variants
                .get(*selector as usize)
                .ok_or_else(|| err("union selector out of range"))?;
            out.push(*selector);
            encode_into(variant, inner, out)?;
        }
        (TypeDef::None, Value::None) => {}
        _ => {
            return Err(err(format!(
                "value does not match type {}",
                ty.name()
            )))
        }
    }
    Ok(())
}

fn encode_sequence(elem: &TypeDef, items: &[Value], out: &mut Vec<u8>) -> Result<()> {
    match elem.fixed_size() {
        Some(_) => {
            for item in items {
                encode_into(elem, item, out)?;
            }
        }
        None => {
            let mut encoded = Vec::with_capacity(items.len());
            for item in items {
                let mut buf = Vec::new();
                encode_into(elem, item, &mut buf)?;
                encoded.push(buf);
            }
            let mut heap_pos = items.len() * 4;
            for buf in &encoded {
                out.extend_from_slice(&(heap_pos as u32).to_le_bytes());
                heap_pos += buf.len();
            }
            for buf in &encoded {
                out.extend_from_slice(buf);
            }
        }
    }
    Ok(())
}

fn pack_bits(bits: &[bool], sentinel: bool) -> Vec<u8> {
    let total = bits.len() + usize::from(sentinel);
    let mut out = vec![0u8; (total + 7) / 8];
    for (i, bit) in bits.iter().enumerate() {
        if *bit {
            out[i / 8] |= 1 << (i % 8);
        }
    }
    if sentinel {
        out[bits.len() / 8] |= 1 << (bits.len() % 8);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree::hash_pair;

    static UINT64: TypeDef = TypeDef::Uint(8);
    static BYTES32: TypeDef = TypeDef::Bytes(32);
    static SMALL: TypeDef = TypeDef::Container(
        "Small",
        &[
            Field { name: "a", ty: &UINT64 },
            Field { name: "b", ty: &BYTES32 },
        ],
    );
    static DYN_LIST: TypeDef = TypeDef::ByteList(64);
    static WITH_DYN: TypeDef = TypeDef::Container(
        "WithDyn",
        &[
            Field { name: "a", ty: &UINT64 },
            Field { name: "data", ty: &DYN_LIST },
            Field { name: "tail", ty: &DYN_LIST },
        ],
    );

    #[test]
    fn test_fixed_container_roundtrip() {
        let value = Value::Items(vec![Value::Uint(7), Value::Bytes(vec![9u8; 32])]);
        let bytes = encode(&SMALL, &value).unwrap();
        assert_eq!(bytes.len(), 40);
        let view = Ssz::new(&SMALL, &bytes);
        view.validate().unwrap();
        assert_eq!(view.field("a").unwrap().as_u64().unwrap(), 7);
        assert_eq!(view.field("b").unwrap().as_bytes32().unwrap(), [9u8; 32]);
    }

    #[test]
    fn test_dynamic_offsets_layout() {
        let value = Value::Items(vec![
            Value::Uint(1),
            Value::Bytes(b"abc".to_vec()),
            Value::Bytes(b"xy".to_vec()),
        ]);
        let bytes = encode(&WITH_DYN, &value).unwrap();
        // fixed part: 8 (uint) + 4 + 4 offsets = 16; first offset = 16.
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), 16);
        assert_eq!(u32::from_le_bytes(bytes[12..16].try_into().unwrap()), 19);
        let view = Ssz::new(&WITH_DYN, &bytes);
        view.validate().unwrap();
        assert_eq!(view.field("data").unwrap().bytes, b"abc");
        assert_eq!(view.field("tail").unwrap().bytes, b"xy");
    }

    #[test]
    fn test_validate_rejects_bad_first_offset() {
        let value = Value::Items(vec![
            Value::Uint(1),
            Value::Bytes(b"abc".to_vec()),
            Value::Bytes(b"".to_vec()),
        ]);
        let mut bytes = encode(&WITH_DYN, &value).unwrap();
        bytes[8] = 17; // first offset must be 16
        assert!(Ssz::new(&WITH_DYN, &bytes).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_decreasing_offsets() {
        let value = Value::Items(vec![
            Value::Uint(1),
            Value::Bytes(b"abc".to_vec()),
            Value::Bytes(b"".to_vec()),
        ]);
        let mut bytes = encode(&WITH_DYN, &value).unwrap();
        bytes[12] = 3; // second offset below the first
        assert!(Ssz::new(&WITH_DYN, &bytes).validate().is_err());
    }

    #[test]
    fn test_uint_root_is_padded_chunk() {
        let bytes = encode(&UINT64, &Value::Uint(0xa5)).unwrap();
        let root = hash_tree_root(&UINT64, &bytes).unwrap();
        let mut expected = [0u8; 32];
        expected[0] = 0xa5;
        assert_eq!(root, expected);
    }

    #[test]
    fn test_container_root_matches_manual() {
        let value = Value::Items(vec![Value::Uint(3), Value::Bytes(vec![4u8; 32])]);
        let bytes = encode(&SMALL, &value).unwrap();
        let root = hash_tree_root(&SMALL, &bytes).unwrap();
        let mut a = [0u8; 32];
        a[0] = 3;
        assert_eq!(root, hash_pair(&a, &[4u8; 32]));
    }

    #[test]
    fn test_bitlist_sentinel() {
        static BITS: TypeDef = TypeDef::BitList(8);
        let bytes = encode(&BITS, &Value::Bits(vec![true, false, true])).unwrap();
        // bits 101 + sentinel at position 3 -> 0b1101
        assert_eq!(bytes, vec![0b1101]);
        let (data, len) = strip_bitlist_sentinel(&bytes).unwrap();
        assert_eq!(len, 3);
        assert_eq!(data, vec![0b101]);
    }

    #[test]
    fn test_union_selector() {
        static NONE: TypeDef = TypeDef::None;
        static UNION: TypeDef = TypeDef::Union("U", &[&NONE, &UINT64]);
        let bytes = encode(&UNION, &Value::Union(1, Box::new(Value::Uint(42)))).unwrap();
        assert_eq!(bytes[0], 1);
        let view = Ssz::new(&UNION, &bytes);
        let (selector, inner) = view.union_variant().unwrap();
        assert_eq!(selector, 1);
        assert_eq!(inner.as_u64().unwrap(), 42);
    }

    #[test]
    fn test_dynamic_list_of_lists() {
        static INNER: TypeDef = TypeDef::ByteList(16);
        static OUTER: TypeDef = TypeDef::List(&INNER, 8);
        let value = Value::Items(vec![
            Value::Bytes(b"one".to_vec()),
            Value::Bytes(b"".to_vec()),
            Value::Bytes(b"three".to_vec()),
        ]);
        let bytes = encode(&OUTER, &value).unwrap();
        let view = Ssz::new(&OUTER, &bytes);
        view.validate().unwrap();
        assert_eq!(view.len().unwrap(), 3);
        assert_eq!(view.at(0).unwrap().bytes, b"one");
        assert_eq!(view.at(1).unwrap().bytes, b"");
        assert_eq!(view.at(2).unwrap().bytes, b"three");
    }
}
