//! Crypto seam for the decrypt pipeline.
//!
//! The pipeline talks to a [`BlsBackend`] chosen at construction: the
//! pairing-backed production implementation, or a null implementation that
//! lets coordination logic be exercised without any curve arithmetic.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::bls::{g1_to_bytes, gt_to_bytes, Fr, G1};
use crate::bte::{self, DecryptShare, KeyCiphertext};
use crate::pprf::{self, PprfParams};
use crate::types::{Error, MemberIndex};

pub trait BlsBackend: Send + Sync {
    fn partial_decrypt(
        &self,
        ct: &KeyCiphertext,
        share: &Fr,
        index: MemberIndex,
    ) -> Result<DecryptShare, Error>;

    fn combine(&self, ct: &KeyCiphertext, shares: &[DecryptShare], t: usize) -> Result<G1, Error>;

    /// PRF bytes for `batch_index` from the recovered `g^k` and the batch's
    /// punctured keys. The result feeds the XOR mask.
    fn recover_prf(
        &self,
        gk: &G1,
        batch_index: MemberIndex,
        punctured: &BTreeMap<MemberIndex, G1>,
    ) -> Result<Vec<u8>, Error>;
}

/// Production backend: BTE combine plus linear-setup PPRF recovery, with the
/// public parameters derived once from the group key and immutable after.
pub struct BlstBackend {
    params: PprfParams,
}

impl BlstBackend {
    pub fn new(n: u32, group_pubkey: &G1) -> Result<Self, Error> {
        let params = pprf::setup_deterministic(n as usize, &g1_to_bytes(group_pubkey))?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &PprfParams {
        &self.params
    }
}

impl BlsBackend for BlstBackend {
    fn partial_decrypt(
        &self,
        ct: &KeyCiphertext,
        share: &Fr,
        index: MemberIndex,
    ) -> Result<DecryptShare, Error> {
        bte::partial_decrypt(ct, share, index)
    }

    fn combine(&self, ct: &KeyCiphertext, shares: &[DecryptShare], t: usize) -> Result<G1, Error> {
        bte::combine(ct, shares, t)
    }

    fn recover_prf(
        &self,
        gk: &G1,
        batch_index: MemberIndex,
        punctured: &BTreeMap<MemberIndex, G1>,
    ) -> Result<Vec<u8>, Error> {
        let keys: BTreeMap<usize, G1> = punctured
            .iter()
            .map(|(idx, point)| (*idx as usize, *point))
            .collect();
        let prf = pprf::recover_prf_at(&self.params, gk, batch_index as usize, &keys)?;
        Ok(gt_to_bytes(&prf))
    }
}

/// Test-only backend with cheap deterministic outputs: shares echo `C1`,
/// combine hands back `C2`, and the PRF is a hash of the batch index. Lets
/// threshold counting, publish-once and XOR plumbing run without pairings.
pub struct NullBackend;

impl BlsBackend for NullBackend {
    fn partial_decrypt(
        &self,
        ct: &KeyCiphertext,
        _share: &Fr,
        index: MemberIndex,
    ) -> Result<DecryptShare, Error> {
        if index == 0 {
            return Err(Error::Invalid);
        }
        Ok(DecryptShare {
            index,
            value: ct.c1,
        })
    }

    fn combine(&self, ct: &KeyCiphertext, shares: &[DecryptShare], t: usize) -> Result<G1, Error> {
        if t == 0 || shares.len() < t {
            return Err(Error::Invalid);
        }
        Ok(ct.c2)
    }

    fn recover_prf(
        &self,
        _gk: &G1,
        batch_index: MemberIndex,
        _punctured: &BTreeMap<MemberIndex, G1>,
    ) -> Result<Vec<u8>, Error> {
        Ok(null_prf(batch_index))
    }
}

/// The mask preimage [`NullBackend`] produces; exposed so tests can seal
/// envelopes the null pipeline will open.
pub fn null_prf(batch_index: MemberIndex) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(b"null-prf");
    hasher.update(batch_index.to_be_bytes());
    hasher.finalize().to_vec()
}
