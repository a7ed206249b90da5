//! Groth16 verifier over BN254.
//!
//! Proofs are 260 bytes: a 4-byte selector binding the proof to its
//! verification key, then A (G1, 64 bytes), B (G2, 128 bytes) and C (G1,
//! 64 bytes) with big-endian coordinates; Fq2 elements carry the imaginary
//! coefficient first (the EVM precompile convention). The public input is
//! the SHA-256 of the raw public-value bytes with the top 3 bits masked,
//! matching the circuit's field encoding; the masking must stay in lock
//! step with the prover. Any parsing failure is a definitive `false`.

use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G1Projective, G2Affine};
use ark_ec::pairing::Pairing;
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{BigInteger, One, PrimeField};
use sha2::{Digest, Sha256};

pub const PROOF_LEN: usize = 260;
const G1_LEN: usize = 64;
const G2_LEN: usize = 128;

/// A registered verification key: the guest program hash plus the curve
/// points, with β, γ and δ stored negated so verification is a single
/// pairing product.
#[derive(Debug, Clone)]
pub struct VerifyingKey {
    pub selector: [u8; 4],
    pub program_hash: [u8; 32],
    pub alpha_g1: G1Affine,
    pub neg_beta_g2: G2Affine,
    pub neg_gamma_g2: G2Affine,
    pub neg_delta_g2: G2Affine,
    pub ic: Vec<G1Affine>,
}

/// Canonical big-endian field element; rejects non-reduced encodings.
fn fq_from_be(bytes: &[u8]) -> Option<Fq> {
    if bytes.len() != 32 {
        return None;
    }
    let element = Fq::from_be_bytes_mod_order(bytes);
    if element.into_bigint().to_bytes_be() != bytes {
        return None;
    }
    Some(element)
}

fn g1_from_be(bytes: &[u8]) -> Option<G1Affine> {
    if bytes.len() != G1_LEN {
        return None;
    }
    let x = fq_from_be(&bytes[..32])?;
    let y = fq_from_be(&bytes[32..])?;
    let point = G1Affine::new_unchecked(x, y);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return None;
    }
    Some(point)
}

fn g2_from_be(bytes: &[u8]) -> Option<G2Affine> {
    if bytes.len() != G2_LEN {
        return None;
    }
    let x = Fq2::new(fq_from_be(&bytes[32..64])?, fq_from_be(&bytes[..32])?);
    let y = Fq2::new(fq_from_be(&bytes[96..128])?, fq_from_be(&bytes[64..96])?);
    let point = G2Affine::new_unchecked(x, y);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return None;
    }
    Some(point)
}

/// `zk_vk.bin` layout: selector(4) || program_hash(32) || α(64) ||
/// -β(128) || -γ(128) || -δ(128) || ic_count(u32le) || IC entries (64 each),
/// with `ic_count >= 3`.
pub fn parse_vk(bytes: &[u8]) -> Option<VerifyingKey> {
    const FIXED: usize = 4 + 32 + G1_LEN + 3 * G2_LEN + 4;
    if bytes.len() < FIXED {
        return None;
    }
    let mut pos = 0usize;
    let selector: [u8; 4] = bytes[pos..pos + 4].try_into().ok()?;
    pos += 4;
    let program_hash: [u8; 32] = bytes[pos..pos + 32].try_into().ok()?;
    pos += 32;
    let alpha_g1 = g1_from_be(&bytes[pos..pos + G1_LEN])?;
    pos += G1_LEN;
    let neg_beta_g2 = g2_from_be(&bytes[pos..pos + G2_LEN])?;
    pos += G2_LEN;
    let neg_gamma_g2 = g2_from_be(&bytes[pos..pos + G2_LEN])?;
    pos += G2_LEN;
    let neg_delta_g2 = g2_from_be(&bytes[pos..pos + G2_LEN])?;
    pos += G2_LEN;
    let ic_count = u32::from_le_bytes(bytes[pos..pos + 4].try_into().ok()?) as usize;
    pos += 4;
    if ic_count < 3 || bytes.len() != pos + ic_count * G1_LEN {
        return None;
    }
    let mut ic = Vec::with_capacity(ic_count);
    for i in 0..ic_count {
        ic.push(g1_from_be(&bytes[pos + i * G1_LEN..pos + (i + 1) * G1_LEN])?);
    }
    Some(VerifyingKey {
        selector,
        program_hash,
        alpha_g1,
        neg_beta_g2,
        neg_gamma_g2,
        neg_delta_g2,
        ic,
    })
}

/// SHA-256 of the public-value bytes, reduced to the low 253 bits.
pub(crate) fn public_input_scalar(public_inputs: &[u8]) -> Fr {
    let mut digest: [u8; 32] = Sha256::digest(public_inputs).into();
    digest[0] &= 0x1f;
    Fr::from_be_bytes_mod_order(&digest)
}

/// Check one Groth16 proof. No hidden state: calling twice on the same
/// inputs yields the same result.
pub fn verify_proof(vk: &VerifyingKey, proof_bytes: &[u8], public_inputs: &[u8]) -> bool {
    if proof_bytes.len() != PROOF_LEN {
        return false;
    }
    if proof_bytes[..4] != vk.selector {
        return false;
    }
    let Some(a) = g1_from_be(&proof_bytes[4..4 + G1_LEN]) else {
        return false;
    };
    let Some(b) = g2_from_be(&proof_bytes[4 + G1_LEN..4 + G1_LEN + G2_LEN]) else {
        return false;
    };
    let Some(c) = g1_from_be(&proof_bytes[4 + G1_LEN + G2_LEN..PROOF_LEN]) else {
        return false;
    };
    if vk.ic.len() < 3 {
        return false;
    }

    let vkey = Fr::from_be_bytes_mod_order(&vk.program_hash);
    let public = public_input_scalar(public_inputs);

    let l: G1Projective = vk.ic[0].into_group()
        + vk.ic[1].mul_bigint(vkey.into_bigint())
        + vk.ic[2].mul_bigint(public.into_bigint());

    let result = Bn254::multi_pairing(
        [a, c, vk.alpha_g1, l.into_affine()],
        [b, vk.neg_delta_g2, vk.neg_beta_g2, vk.neg_gamma_g2],
    );
    result.0 == <Bn254 as Pairing>::TargetField::one()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::Field;

    fn g1_bytes(p: &G1Affine) -> Vec<u8> {
        let mut out = p.x.into_bigint().to_bytes_be();
        out.extend(p.y.into_bigint().to_bytes_be());
        out
    }

    fn g2_bytes(p: &G2Affine) -> Vec<u8> {
        let mut out = p.x.c1.into_bigint().to_bytes_be();
        out.extend(p.x.c0.into_bigint().to_bytes_be());
        out.extend(p.y.c1.into_bigint().to_bytes_be());
        out.extend(p.y.c0.into_bigint().to_bytes_be());
        out
    }

    fn vk_bytes(
        selector: [u8; 4],
        program_hash: [u8; 32],
        alpha: &G1Affine,
        neg_beta: &G2Affine,
        neg_gamma: &G2Affine,
        neg_delta: &G2Affine,
        ic: &[G1Affine],
    ) -> Vec<u8> {
        let mut out = selector.to_vec();
        out.extend_from_slice(&program_hash);
        out.extend(g1_bytes(alpha));
        out.extend(g2_bytes(neg_beta));
        out.extend(g2_bytes(neg_gamma));
        out.extend(g2_bytes(neg_delta));
        out.extend((ic.len() as u32).to_le_bytes());
        for p in ic {
            out.extend(g1_bytes(p));
        }
        out
    }

    fn g1(scalar: u64) -> G1Affine {
        G1Affine::generator().mul_bigint(Fr::from(scalar).into_bigint()).into_affine()
    }

    fn g2(scalar: Fr) -> G2Affine {
        G2Affine::generator().mul_bigint(scalar.into_bigint()).into_affine()
    }

    /// A VK and proof whose pairing exponents cancel by construction:
    /// x·y + z·d + a·b + l·c = 0 over the scalar field.
    fn satisfying_instance() -> (VerifyingKey, Vec<u8>, Vec<u8>) {
        let program_hash = [7u8; 32];
        let public_inputs = b"public values".to_vec();
        let vkey = Fr::from_be_bytes_mod_order(&program_hash);
        let public = public_input_scalar(&public_inputs);

        let (s0, s1, s2) = (Fr::from(19u64), Fr::from(23u64), Fr::from(29u64));
        let l = s0 + s1 * vkey + s2 * public;

        let (x, y, z, d, a, b) = (
            Fr::from(2u64),
            Fr::from(5u64),
            Fr::from(7u64),
            Fr::from(11u64),
            Fr::from(13u64),
            Fr::from(17u64),
        );
        let c = -(x * y + z * d + a * b) * l.inverse().unwrap();

        let selector = [0xc4, 0x00, 0x11, 0x22];
        let ic = vec![
            g1(19),
            g1(23),
            g1(29),
        ];
        let vk_raw = vk_bytes(
            selector,
            program_hash,
            &g1(13),
            &g2(b),
            &g2(c),
            &g2(d),
            &ic,
        );
        let vk = parse_vk(&vk_raw).unwrap();

        let mut proof = selector.to_vec();
        proof.extend(g1_bytes(&g1(2)));
        proof.extend(g2_bytes(&g2(y)));
        proof.extend(g1_bytes(&g1(7)));
        (vk, proof, public_inputs)
    }

    #[test]
    fn test_valid_proof_verifies() {
        let (vk, proof, public) = satisfying_instance();
        assert!(verify_proof(&vk, &proof, &public));
    }

    #[test]
    fn test_verification_is_idempotent() {
        let (vk, proof, public) = satisfying_instance();
        assert_eq!(verify_proof(&vk, &proof, &public), verify_proof(&vk, &proof, &public));
    }

    #[test]
    fn test_short_proof_is_false() {
        let (vk, proof, public) = satisfying_instance();
        assert!(!verify_proof(&vk, &proof[..259], &public));
    }

    #[test]
    fn test_wrong_selector_is_false() {
        let (vk, mut proof, public) = satisfying_instance();
        proof[0] ^= 1;
        assert!(!verify_proof(&vk, &proof, &public));
    }

    #[test]
    fn test_tampered_point_is_false() {
        let (vk, mut proof, public) = satisfying_instance();
        // Corrupting a coordinate either leaves the curve (parse failure) or
        // breaks the pairing equation; both are definitive false.
        proof[10] ^= 1;
        assert!(!verify_proof(&vk, &proof, &public));
    }

    #[test]
    fn test_wrong_public_inputs_are_false() {
        let (vk, proof, _) = satisfying_instance();
        assert!(!verify_proof(&vk, &proof, b"other values"));
    }

    #[test]
    fn test_masking_keeps_scalar_in_field() {
        // 0xff.. digests reduce to 253 bits before entering the field.
        let scalar = public_input_scalar(b"anything");
        let be = scalar.into_bigint().to_bytes_be();
        assert!(be[0] <= 0x1f);
    }

    #[test]
    fn test_vk_rejects_truncation_and_bad_counts() {
        let program_hash = [1u8; 32];
        let ic = vec![g1(1), g1(2), g1(3)];
        let raw = vk_bytes(
            [0; 4],
            program_hash,
            &g1(1),
            &g2(Fr::from(2u64)),
            &g2(Fr::from(3u64)),
            &g2(Fr::from(4u64)),
            &ic,
        );
        assert!(parse_vk(&raw).is_some());
        assert!(parse_vk(&raw[..raw.len() - 1]).is_none());
        // Fewer than 3 IC points cannot bind vkey and public input.
        let short = vk_bytes(
            [0; 4],
            program_hash,
            &g1(1),
            &g2(Fr::from(2u64)),
            &g2(Fr::from(3u64)),
            &g2(Fr::from(4u64)),
            &ic[..2],
        );
        assert!(parse_vk(&short).is_none());
    }

    #[test]
    fn test_non_canonical_field_is_rejected() {
        // The field modulus itself is not a canonical encoding.
        let modulus = [
            0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29, 0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81,
            0x58, 0x5d, 0x97, 0x81, 0x6a, 0x91, 0x68, 0x71, 0xca, 0x8d, 0x3c, 0x20, 0x8c, 0x16,
            0xd8, 0x7c, 0xfd, 0x47,
        ];
        assert!(fq_from_be(&modulus).is_none());
        assert!(fq_from_be(&[0u8; 32]).is_some());
    }
}
