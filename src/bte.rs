//! ElGamal-in-the-exponent threshold KEM over G1.
//!
//! A key scalar `k` is encrypted as `(C1, C2) = (g^r, pk^r + g^k)` under the
//! committee public key `pk = g^s`. Ciphertexts add component-wise, which
//! aggregates the encrypted keys. Decryption is threshold-only: each holder
//! of a Shamir share `s_i` contributes `C1^{s_i}`, and any `t` distinct
//! shares Lagrange-combine at zero into `C1^s`, exposing `g^k` but never `k`.

use group::Group;
use sha2::{Digest, Sha256};

use crate::bls::{g1_from_bytes, g1_to_bytes, scalar_random, Fr, G1};
use crate::lagrange::combine_g1_at_zero;
use crate::types::{Error, MemberIndex};

pub const CIPHERTEXT_LEN: usize = 96;
pub const SHARE_LEN: usize = 48;

/// `C1 = g^r`, `C2 = pk^r + g^k`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyCiphertext {
    pub c1: G1,
    pub c2: G1,
}

impl KeyCiphertext {
    /// Wire form `C1 ‖ C2` (two compressed G1 points).
    pub fn to_bytes(&self) -> [u8; CIPHERTEXT_LEN] {
        let mut out = [0u8; CIPHERTEXT_LEN];
        out[..48].copy_from_slice(&g1_to_bytes(&self.c1));
        out[48..].copy_from_slice(&g1_to_bytes(&self.c2));
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != CIPHERTEXT_LEN {
            return Err(Error::Invalid);
        }
        Ok(Self {
            c1: g1_from_bytes(&bytes[..48])?,
            c2: g1_from_bytes(&bytes[48..])?,
        })
    }
}

/// One node's contribution `C1^{s_i}` toward recovering `g^k`.
#[derive(Clone, Copy, Debug)]
pub struct DecryptShare {
    pub index: MemberIndex,
    pub value: G1,
}

/// Encrypt a key scalar under the group public key.
pub fn encrypt_key<R: rand_core::RngCore + ?Sized>(
    pk: &G1,
    key: &Fr,
    rng: &mut R,
) -> KeyCiphertext {
    let r = scalar_random(rng);
    KeyCiphertext {
        c1: G1::generator() * r,
        c2: *pk * r + G1::generator() * key,
    }
}

/// Component-wise sum; the result encrypts `Σ k_i` under the same key.
pub fn add_ciphertexts(cts: &[KeyCiphertext]) -> Result<KeyCiphertext, Error> {
    if cts.is_empty() {
        return Err(Error::Invalid);
    }
    let mut acc1 = G1::identity();
    let mut acc2 = G1::identity();
    for ct in cts {
        acc1 += ct.c1;
        acc2 += ct.c2;
    }
    Ok(KeyCiphertext { c1: acc1, c2: acc2 })
}

/// Threshold decryption share for `ct` under the Shamir share `s_i`.
pub fn partial_decrypt(
    ct: &KeyCiphertext,
    share: &Fr,
    index: MemberIndex,
) -> Result<DecryptShare, Error> {
    if index == 0 {
        return Err(Error::Invalid);
    }
    Ok(DecryptShare {
        index,
        value: ct.c1 * share,
    })
}

/// Recover `g^k` from at least `t` partial decrypt shares.
///
/// The quorum is deterministic: the `t` smallest indices in ascending order.
/// Duplicate indices inside the quorum are rejected.
pub fn combine(ct: &KeyCiphertext, shares: &[DecryptShare], t: usize) -> Result<G1, Error> {
    if t == 0 || shares.len() < t {
        return Err(Error::Invalid);
    }
    let mut sorted: Vec<DecryptShare> = shares.to_vec();
    sorted.sort_by_key(|s| s.index);
    let quorum = &sorted[..t];

    let mut indices = Vec::with_capacity(t);
    let mut values = Vec::with_capacity(t);
    for s in quorum {
        if s.index == 0 || indices.contains(&s.index) {
            return Err(Error::Invalid);
        }
        indices.push(s.index);
        values.push(s.value);
    }

    // C1^s = Σ λ_i(0) · C1^{s_i}
    let c1_s = combine_g1_at_zero(&indices, &values)?;
    Ok(ct.c2 - c1_s)
}

/// XOR `data` against a SHA-256 digest of the PRF bytes, tiled.
///
/// The operation is its own inverse; seal and open both call it.
pub fn xor_mask(data: &[u8], prf_bytes: &[u8]) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }
    let digest = Sha256::digest(prf_bytes);
    data.iter()
        .enumerate()
        .map(|(i, b)| b ^ digest[i % digest.len()])
        .collect()
}
