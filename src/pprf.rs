//! Key-homomorphic puncturable PRF with linear setup over BLS12-381.
//!
//! Public parameters hold `g^{x^i}` for `i ∈ [1..2N+1]` in both source
//! groups, with the slot at `N+1` deliberately absent: publishing
//! `g^{x^{N+1}}` would let a punctured key be completed at its own index.
//! Evaluation pairs a G1 power against the G2 generator; punctured
//! evaluation shifts the exponent by the punctured index and can therefore
//! never touch the missing slot.

use std::collections::BTreeMap;

use group::Group;
use rand_core::OsRng;

use crate::bls::{multi_pairing, pairing, scalar_from_seed, scalar_random, Fr, Target, G1, G2};
use crate::types::Error;

const SALT_SETUP: &[u8] = b"PPRF-SETUP";

/// Linear-setup public parameters for the PRF domain `[1..N]`.
///
/// Slot `0` and slot `N+1` are structurally empty.
#[derive(Clone, Debug)]
pub struct PprfParams {
    n: usize,
    g1: Vec<Option<G1>>,
    g2: Vec<Option<G2>>,
}

impl PprfParams {
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.n == 0 {
            return Err(Error::Invalid);
        }
        let want = 2 * self.n + 2;
        if self.g1.len() != want || self.g2.len() != want {
            return Err(Error::Invalid);
        }
        for i in 1..want {
            let present = self.g1[i].is_some() && self.g2[i].is_some();
            if i == self.n + 1 {
                if present {
                    return Err(Error::Invalid);
                }
            } else if !present {
                return Err(Error::Invalid);
            }
        }
        Ok(())
    }

    fn g1_at(&self, i: usize) -> Result<&G1, Error> {
        self.g1.get(i).and_then(Option::as_ref).ok_or(Error::Invalid)
    }

    fn g2_at(&self, i: usize) -> Result<&G2, Error> {
        self.g2.get(i).and_then(Option::as_ref).ok_or(Error::Invalid)
    }

    fn check_domain(&self, i: usize) -> Result<(), Error> {
        if i == 0 || i > self.n {
            return Err(Error::Invalid);
        }
        Ok(())
    }
}

/// Generate public parameters for a bounded domain `[1..n]`.
///
/// The secret exponent is sampled fresh and dropped when this returns.
pub fn setup(n: usize) -> Result<PprfParams, Error> {
    let x = scalar_random(&mut OsRng);
    setup_with_exponent(n, &x)
}

/// Deterministic setup: the secret exponent is expanded from `seed`, so all
/// nodes sharing a seed (in practice the group public key) agree on the
/// parameters without further gossip.
pub fn setup_deterministic(n: usize, seed: &[u8]) -> Result<PprfParams, Error> {
    if seed.is_empty() {
        return Err(Error::Invalid);
    }
    let x = scalar_from_seed(seed, SALT_SETUP)?;
    setup_with_exponent(n, &x)
}

fn setup_with_exponent(n: usize, x: &Fr) -> Result<PprfParams, Error> {
    if n == 0 {
        return Err(Error::Invalid);
    }
    let max_pow = 2 * n + 1;
    let mut g1 = vec![None; max_pow + 1];
    let mut g2 = vec![None; max_pow + 1];
    let mut pow = *x;
    for i in 1..=max_pow {
        if i > 1 {
            pow *= x;
        }
        if i == n + 1 {
            // The forbidden slot stays unset.
            continue;
        }
        g1[i] = Some(G1::generator() * pow);
        g2[i] = Some(G2::generator() * pow);
    }
    let pp = PprfParams { n, g1, g2 };
    pp.validate()?;
    Ok(pp)
}

/// Sample a fresh PRF key.
pub fn key_gen<R: rand_core::RngCore + ?Sized>(rng: &mut R) -> Fr {
    scalar_random(rng)
}

/// Sum of PRF keys mod the group order. Evaluation is linear in the key:
/// `eval(k_a + k_b, i) = eval(k_a, i) + eval(k_b, i)` in GT.
pub fn add_keys(keys: &[Fr]) -> Result<Fr, Error> {
    if keys.is_empty() {
        return Err(Error::Invalid);
    }
    let mut acc = keys[0];
    for k in &keys[1..] {
        acc += k;
    }
    Ok(acc)
}

/// PRF value at `i ∈ [1..N]` as a GT element.
pub fn eval(pp: &PprfParams, key: &Fr, i: usize) -> Result<Target, Error> {
    pp.validate()?;
    pp.check_domain(i)?;
    // Exponent index N+1+i is in [N+2..2N+1]; the missing slot is unreachable.
    let base = *pp.g1_at(pp.n + 1 + i)?;
    Ok(pairing(&(base * key), &G2::generator()))
}

/// PRF value at `i` given only `g1^k`, for callers that recovered the key in
/// the exponent via threshold decryption.
pub fn eval_from_gk(pp: &PprfParams, gk: &G1, i: usize) -> Result<Target, Error> {
    pp.validate()?;
    pp.check_domain(i)?;
    Ok(pairing(gk, pp.g2_at(pp.n + 1 + i)?))
}

/// Punctured key `k* = g1^{x^{i*}·k}` for `i* ∈ [1..N]`.
pub fn puncture(pp: &PprfParams, key: &Fr, i_star: usize) -> Result<G1, Error> {
    pp.validate()?;
    pp.check_domain(i_star)?;
    Ok(*pp.g1_at(i_star)? * key)
}

/// Evaluate a punctured key at `i ≠ i*`; the punctured index itself fails
/// with [`Error::Punctured`] since its exponent would be the missing `N+1`.
pub fn punctured_eval(pp: &PprfParams, k_star: &G1, i_star: usize, i: usize) -> Result<Target, Error> {
    pp.validate()?;
    pp.check_domain(i_star)?;
    pp.check_domain(i)?;
    if i == i_star {
        return Err(Error::Punctured);
    }
    let exp = pp.n + 1 + i - i_star;
    Ok(pairing(k_star, pp.g2_at(exp)?))
}

/// Recover `PRF(k_i, i)` from the aggregate key `g^k` (with `k = Σ k_j`) and
/// the other participants' punctured keys:
///
/// `PRF(k_i, i) = e(g^k, g^{x^{N+1+i}}) · Π_{j≠i} e(k*_j, g^{x^{N+1+i-j}})^{-1}`
///
/// evaluated as a single multi-pairing; negating the G1 inputs stands in for
/// the GT inversion. Entries keyed at `i` itself are skipped, so the
/// single-submitter case degenerates to the numerator term alone.
pub fn recover_prf_at(
    pp: &PprfParams,
    gk: &G1,
    i: usize,
    punctured: &BTreeMap<usize, G1>,
) -> Result<Target, Error> {
    pp.validate()?;
    pp.check_domain(i)?;
    if punctured.is_empty() {
        return Err(Error::Invalid);
    }
    let mut pairs = Vec::with_capacity(1 + punctured.len());
    pairs.push((*gk, *pp.g2_at(pp.n + 1 + i)?));
    // BTreeMap iteration keeps the term order deterministic.
    for (&j, k_star) in punctured.iter() {
        if j == i {
            continue;
        }
        pp.check_domain(j)?;
        let exp = pp.n + 1 + i - j;
        pairs.push((-*k_star, *pp.g2_at(exp)?));
    }
    Ok(multi_pairing(&pairs))
}
