//! Common types and the error taxonomy shared across the core.

use thiserror::Error;

/// One-based committee member index.
pub type MemberIndex = u32;

/// Monotonic block height supplied by the embedding chain.
pub type BlockHeight = u64;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed point, wrong length, missing required envelope field,
    /// index out of domain, or a forbidden PPRF exponent.
    #[error("invalid input")]
    Invalid,
    /// The current block height has not yet reached the target height.
    #[error("target height not reached")]
    Early,
    /// Not enough valid decrypt shares collected yet; the caller may retry.
    #[error("decrypt shares below threshold")]
    NotReady,
    /// Pairing, combine or symmetric-cipher step produced an unusable result.
    #[error("cipher failure")]
    Cipher,
    /// A successful cipher path produced zero-length plaintext.
    #[error("empty plaintext")]
    Empty,
    /// Plaintext could not be parsed as an inner envelope.
    #[error("undecodable inner envelope")]
    Decode,
    /// Punctured evaluation requested at the punctured index.
    #[error("punctured index")]
    Punctured,
    /// Signature verification failed or key material is missing for the
    /// required (from, to) pair.
    #[error("unauthorized")]
    Unauthorized,
    /// Persisted state not present.
    #[error("not found")]
    NotFound,
    /// Store I/O failure; fatal when no fallback file loads either.
    #[error("store i/o: {0}")]
    Io(#[from] std::io::Error),
}
