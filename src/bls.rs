//! BLS12-381 helpers (blstrs): hash-to-curve, pairings, serialization.

use std::io::Cursor;

use blstrs::{
    Bls12, Compress, G1Affine, G1Projective, G2Affine, G2Prepared, G2Projective, Gt, Scalar,
};
use ff::Field;
use group::Curve;
use pairing::{MillerLoopResult as _, MultiMillerLoop};
use rand_core::SeedableRng;

use crate::kdf::hkdf_sha256;
use crate::types::{Error, MemberIndex};

pub type Fr = Scalar;
pub type G1 = G1Projective;
pub type G2 = G2Projective;
pub type Target = Gt;

const DST_KEYGEN: &[u8] = b"EQS/BEAST/KEYGEN/v1";

pub fn hash_to_g2(msg: &[u8], dst: &[u8]) -> G2 {
    // Hash-to-curve on the auxiliary side of the pairing.
    G2Projective::hash_to_curve(msg, dst, &[])
}

pub fn pairing(g1: &G1, g2: &G2) -> Target {
    // Standard BLS12-381 pairing with final exponentiation.
    blstrs::pairing(&g1.to_affine(), &g2.to_affine())
}

/// Product of pairings over (G1, G2) pairs, evaluated as one Miller loop.
///
/// Callers negate a G1 input to place that term in the denominator; no GT
/// inversion is ever performed.
pub fn multi_pairing(pairs: &[(G1, G2)]) -> Target {
    let lhs: Vec<G1Affine> = pairs.iter().map(|(p, _)| p.to_affine()).collect();
    let rhs: Vec<G2Prepared> = pairs
        .iter()
        .map(|(_, q)| G2Prepared::from(q.to_affine()))
        .collect();
    let terms: Vec<(&G1Affine, &G2Prepared)> = lhs.iter().zip(rhs.iter()).collect();
    Bls12::multi_miller_loop(&terms).final_exponentiation()
}

pub fn scalar_from_index(index: MemberIndex) -> Result<Fr, Error> {
    // Member indices embed into the field as small integers; zero is not a
    // valid evaluation point.
    if index == 0 {
        return Err(Error::Invalid);
    }
    Ok(Fr::from(u64::from(index)))
}

pub fn scalar_random<R: rand_core::RngCore + ?Sized>(rng: &mut R) -> Fr {
    // Sample a uniform scalar.
    Fr::random(rng)
}

/// Derive a uniform scalar from 32 bytes of input keying material.
///
/// The IKM is stretched through HKDF-SHA256 into a ChaCha20 stream that
/// drives uniform field sampling, so equal IKM always yields the same scalar.
pub fn scalar_from_ikm(ikm: &[u8]) -> Result<Fr, Error> {
    if ikm.len() != 32 {
        return Err(Error::Invalid);
    }
    scalar_from_seed(ikm, DST_KEYGEN)
}

/// Deterministic scalar from an arbitrary seed under a caller-chosen salt.
pub fn scalar_from_seed(seed: &[u8], salt: &[u8]) -> Result<Fr, Error> {
    let okm = hkdf_sha256(salt, seed, b"scalar", 32)?;
    let mut raw = [0u8; 32];
    raw.copy_from_slice(&okm);
    let mut rng = rand_chacha::ChaCha20Rng::from_seed(raw);
    Ok(Fr::random(&mut rng))
}

pub fn scalar_inv(x: &Fr) -> Result<Fr, Error> {
    // Invertibility check precedes the inversion; zero reports an error.
    Option::from(x.invert()).ok_or(Error::Invalid)
}

pub fn scalar_to_bytes(s: &Fr) -> [u8; 32] {
    s.to_bytes_be()
}

pub fn scalar_from_bytes(bytes: &[u8]) -> Result<Fr, Error> {
    if bytes.len() != 32 {
        return Err(Error::Invalid);
    }
    let mut raw = [0u8; 32];
    raw.copy_from_slice(bytes);
    Option::<Fr>::from(Fr::from_bytes_be(&raw)).ok_or(Error::Invalid)
}

pub fn g1_to_bytes(p: &G1) -> [u8; 48] {
    // Compressed encoding for G1.
    p.to_affine().to_compressed()
}

pub fn g1_from_bytes(bytes: &[u8]) -> Result<G1, Error> {
    // Decode compressed G1, rejecting invalid points.
    if bytes.len() != 48 {
        return Err(Error::Invalid);
    }
    let mut raw = [0u8; 48];
    raw.copy_from_slice(bytes);
    let affine =
        Option::<G1Affine>::from(G1Affine::from_compressed(&raw)).ok_or(Error::Invalid)?;
    Ok(affine.into())
}

pub fn g2_to_bytes(p: &G2) -> [u8; 96] {
    // Compressed encoding for G2.
    p.to_affine().to_compressed()
}

pub fn g2_from_bytes(bytes: &[u8]) -> Result<G2, Error> {
    // Decode compressed G2, rejecting invalid points.
    if bytes.len() != 96 {
        return Err(Error::Invalid);
    }
    let mut raw = [0u8; 96];
    raw.copy_from_slice(bytes);
    let affine =
        Option::<G2Affine>::from(G2Affine::from_compressed(&raw)).ok_or(Error::Invalid)?;
    Ok(affine.into())
}

pub fn gt_to_bytes(t: &Target) -> Vec<u8> {
    // Compressed GT encoding, used for equality checks and mask derivation.
    let mut bytes = Vec::with_capacity(288);
    t.write_compressed(&mut bytes)
        .expect("in-memory serialization should not fail");
    bytes
}

pub fn gt_from_bytes(bytes: &[u8]) -> Result<Target, Error> {
    let mut cursor = Cursor::new(bytes);
    Target::read_compressed(&mut cursor).map_err(|_| Error::Invalid)
}
