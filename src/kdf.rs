//! HKDF-SHA256 seed stretching for deterministic scalar derivation.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::types::Error;

/// One-shot HKDF-SHA256: extract `ikm` under `salt`, then expand `out_len`
/// bytes for `info`.
pub fn hkdf_sha256(
    salt: &[u8],
    ikm: &[u8],
    info: &[u8],
    out_len: usize,
) -> Result<Vec<u8>, Error> {
    let mut okm = vec![0u8; out_len];
    Hkdf::<Sha256>::new(Some(salt), ikm)
        .expand(info, &mut okm)
        .map_err(|_| Error::Cipher)?;
    Ok(okm)
}
