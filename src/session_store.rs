//! Atomic persistence of in-progress DKG sessions.
//!
//! A snapshot carries everything needed to resume an epoch without
//! regenerating the local polynomial. Same framing and fallback semantics as
//! the keystore, under its own magic.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::keystore::{read_framed, write_framed};
use crate::types::{Error, MemberIndex};

const MAGIC_SESSION: u32 = 0x4244_5353; // 'BDSS'

/// Serializable per-epoch session state.
///
/// `BTreeMap` keys keep the JSON body byte-identical across nodes and runs.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub epoch: u64,
    /// Local polynomial coefficients (32-byte big-endian scalars).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coeffs: Vec<Vec<u8>>,
    /// Own Feldman commitments (compressed G1, 48 bytes each).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub self_commitments: Vec<Vec<u8>>,
    /// Accepted commitments per dealer.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub commitments: BTreeMap<MemberIndex, Vec<Vec<u8>>>,
    /// Verified dealer → self shares (32-byte big-endian scalars).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub shares: BTreeMap<MemberIndex, Vec<u8>>,
    /// Ack sets per dealer.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub acks: BTreeMap<MemberIndex, Vec<MemberIndex>>,
    /// Open complaint sets per dealer.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub complaints: BTreeMap<MemberIndex, Vec<MemberIndex>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bad_dealers: Vec<MemberIndex>,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_pubkey: Vec<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub share_scalar: Vec<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transcript: Vec<u8>,
}

pub struct SessionStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("beast_dkg_session_{session_id}.dat"))
    }

    pub fn save(&self, session_id: &str, state: &SessionState) -> Result<(), Error> {
        let _guard = self.lock.lock().expect("session store lock poisoned");
        let body = serde_json::to_vec(state).map_err(|_| Error::Invalid)?;
        write_framed(&self.path_for(session_id), MAGIC_SESSION, 0, &body)
    }

    /// Load a snapshot, falling back to `.bak` on framing or parse failure.
    pub fn load(&self, session_id: &str) -> Result<SessionState, Error> {
        let _guard = self.lock.lock().expect("session store lock poisoned");
        let path = self.path_for(session_id);
        if let Ok(state) = read_one(&path) {
            return Ok(state);
        }
        let mut bak = path.into_os_string();
        bak.push(".bak");
        if let Ok(state) = read_one(Path::new(&bak)) {
            tracing::warn!(session_id, "dkg session recovered from backup");
            return Ok(state);
        }
        Err(Error::NotFound)
    }
}

fn read_one(path: &Path) -> Result<SessionState, Error> {
    let (_flags, body) = read_framed(path, MAGIC_SESSION)?;
    serde_json::from_slice(&body).map_err(|_| Error::Invalid)
}
