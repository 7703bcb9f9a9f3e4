#![forbid(unsafe_code)]

//! BEAST private-transaction core.
//!
//! A committee of nodes runs a one-shot Feldman DKG over BLS12-381 to derive
//! a group public key and per-node secret shares, then accepts
//! encrypted-until-reveal transactions that become decryptable at a target
//! block height through batched threshold encryption: an
//! ElGamal-in-the-exponent KEM combined with a key-homomorphic puncturable
//! PRF, with per-height gossip of partial decrypt shares.

pub mod aead;
pub mod backend;
pub mod bls;
pub mod bte;
pub mod collector;
pub mod committee;
pub mod decrypter;
pub mod dkg;
pub mod envelope;
pub mod kdf;
pub mod keystore;
pub mod lagrange;
pub mod logging;
pub mod pprf;
pub mod runner;
pub mod session_store;
pub mod transport;
pub mod types;

pub use crate::committee::{CommitteeConfig, CommitteeMember, GroupPublicKey};
pub use crate::decrypter::{seal_envelope, BatchDecrypter, DecrypterConfig};
pub use crate::dkg::{DkgGossip, DkgResult, DkgSession};
pub use crate::envelope::{InnerEnvelope, PayloadKind, PrivateEnvelope};
pub use crate::runner::DkgRunner;
pub use crate::types::Error;
