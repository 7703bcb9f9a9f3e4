//! Atomic key-share persistence with CRC framing and `.bak` fallback.
//!
//! On-disk layout:
//!
//! `[magic u32 | version u16 | flags u16 | length u32 | crc32 u32] ‖ body`
//!
//! The body is the JSON key share, optionally sealed with AES-256-GCM
//! (flag bit 0 set, 12-byte nonce prefixed). Writes go to `path.tmp`, are
//! fsynced, the previous file is renamed to `path.bak`, and the temp file is
//! renamed into place. Readers try `path` first and fall back to `path.bak`
//! on any framing, CRC or parse failure.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::types::{Error, MemberIndex};

const MAGIC_KEYSHARE: u32 = 0x5453_534b; // 'TSSK'
const VERSION: u16 = 1;
const FLAG_ENCRYPT: u16 = 1 << 0;
const HEADER_LEN: usize = 4 + 2 + 2 + 4 + 4;
const NONCE_LEN: usize = 12;

/// A node's long-term threshold key material.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyShare {
    pub index: MemberIndex,
    /// Compressed G1 group public key (48 bytes).
    pub public_key: Vec<u8>,
    /// Shamir share scalar (32 bytes big-endian).
    pub private_key: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commitments: Option<Vec<Vec<u8>>>,
}

pub struct KeyStore {
    path: PathBuf,
    cipher: Option<Aes256Gcm>,
    lock: Mutex<()>,
}

impl KeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cipher: None,
            lock: Mutex::new(()),
        }
    }

    /// Keystore whose body is sealed under the given 32-byte key.
    /// The key buffer is zeroized before this returns.
    pub fn new_encrypted(path: impl Into<PathBuf>, key: &mut [u8]) -> Result<Self, Error> {
        if key.len() != 32 {
            key.zeroize();
            return Err(Error::Invalid);
        }
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        key.zeroize();
        Ok(Self {
            path: path.into(),
            cipher: Some(cipher),
            lock: Mutex::new(()),
        })
    }

    pub fn save(&self, share: &KeyShare) -> Result<(), Error> {
        let _guard = self.lock.lock().expect("keystore lock poisoned");
        let mut payload = serde_json::to_vec(share).map_err(|_| Error::Invalid)?;
        let (flags, body) = match &self.cipher {
            Some(cipher) => {
                let mut nonce = [0u8; NONCE_LEN];
                OsRng.fill_bytes(&mut nonce);
                let sealed = cipher
                    .encrypt(Nonce::from_slice(&nonce), payload.as_slice())
                    .map_err(|_| Error::Cipher)?;
                payload.zeroize();
                let mut body = Vec::with_capacity(NONCE_LEN + sealed.len());
                body.extend_from_slice(&nonce);
                body.extend_from_slice(&sealed);
                (FLAG_ENCRYPT, body)
            }
            None => (0, std::mem::take(&mut payload)),
        };
        let res = write_framed(&self.path, MAGIC_KEYSHARE, flags, &body);
        match &res {
            Ok(()) => tracing::debug!(path = %self.path.display(), "keyshare persisted"),
            Err(err) => tracing::error!(path = %self.path.display(), %err, "keyshare persist failed"),
        }
        res
    }

    /// Load the key share, falling back to `.bak` when the main file is
    /// truncated, corrupt or unreadable.
    pub fn load(&self) -> Result<KeyShare, Error> {
        let _guard = self.lock.lock().expect("keystore lock poisoned");
        if let Ok(share) = self.read_one(&self.path) {
            return Ok(share);
        }
        let bak = bak_path(&self.path);
        if let Ok(share) = self.read_one(&bak) {
            tracing::warn!(path = %self.path.display(), "keyshare recovered from backup");
            return Ok(share);
        }
        Err(Error::NotFound)
    }

    fn read_one(&self, path: &Path) -> Result<KeyShare, Error> {
        let (flags, body) = read_framed(path, MAGIC_KEYSHARE)?;
        let mut plain = if flags & FLAG_ENCRYPT != 0 {
            let cipher = self.cipher.as_ref().ok_or(Error::Unauthorized)?;
            if body.len() < NONCE_LEN {
                return Err(Error::Invalid);
            }
            cipher
                .decrypt(Nonce::from_slice(&body[..NONCE_LEN]), &body[NONCE_LEN..])
                .map_err(|_| Error::Cipher)?
        } else {
            body
        };
        let parsed = serde_json::from_slice(&plain).map_err(|_| Error::Invalid);
        plain.zeroize();
        parsed
    }
}

fn bak_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".bak");
    PathBuf::from(s)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".tmp");
    PathBuf::from(s)
}

/// Write `body` under the shared header framing with the atomic
/// tmp → fsync → bak → rename sequence.
pub(crate) fn write_framed(path: &Path, magic: u32, flags: u16, body: &[u8]) -> Result<(), Error> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    let tmp = tmp_path(path);
    {
        let mut f = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp)?;
        let mut hdr = [0u8; HEADER_LEN];
        hdr[0..4].copy_from_slice(&magic.to_be_bytes());
        hdr[4..6].copy_from_slice(&VERSION.to_be_bytes());
        hdr[6..8].copy_from_slice(&flags.to_be_bytes());
        hdr[8..12].copy_from_slice(&(body.len() as u32).to_be_bytes());
        hdr[12..16].copy_from_slice(&crc32fast::hash(body).to_be_bytes());
        f.write_all(&hdr)?;
        f.write_all(body)?;
        f.sync_all()?;
    }
    if path.exists() {
        fs::rename(path, bak_path(path))?;
    }
    fs::rename(&tmp, path)?;
    if let Some(dir) = path.parent() {
        if let Ok(d) = File::open(dir) {
            let _ = d.sync_all();
        }
    }
    Ok(())
}

/// Read and verify one framed file; returns the header flags and body.
pub(crate) fn read_framed(path: &Path, magic: u32) -> Result<(u16, Vec<u8>), Error> {
    let mut f = File::open(path).map_err(|_| Error::NotFound)?;
    let mut hdr = [0u8; HEADER_LEN];
    f.read_exact(&mut hdr).map_err(|_| Error::Invalid)?;
    if u32::from_be_bytes([hdr[0], hdr[1], hdr[2], hdr[3]]) != magic {
        return Err(Error::Invalid);
    }
    let flags = u16::from_be_bytes([hdr[6], hdr[7]]);
    let length = u32::from_be_bytes([hdr[8], hdr[9], hdr[10], hdr[11]]) as usize;
    let want_crc = u32::from_be_bytes([hdr[12], hdr[13], hdr[14], hdr[15]]);
    if length == 0 {
        return Err(Error::Invalid);
    }
    let mut body = vec![0u8; length];
    f.read_exact(&mut body).map_err(|_| Error::Invalid)?;
    if crc32fast::hash(&body) != want_crc {
        return Err(Error::Invalid);
    }
    Ok((flags, body))
}
