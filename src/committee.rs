//! Committee configuration for a DKG session and the public group-key file.

use serde::{Deserialize, Serialize};

use crate::types::{Error, MemberIndex};

pub const SIG_KEY_LEN: usize = 32;
pub const ENC_KEY_LEN: usize = 32;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommitteeMember {
    pub index: MemberIndex,
    /// Ed25519 verification key (32 bytes).
    pub sig_pub: Vec<u8>,
    /// X25519 public key (32 bytes).
    pub enc_pub: Vec<u8>,
}

/// Per-node DKG session configuration; immutable for the process lifetime.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommitteeConfig {
    pub session_id: String,
    #[serde(default)]
    pub epoch: u64,
    pub n: u32,
    pub threshold: u32,
    pub self_index: MemberIndex,
    /// Ed25519 signing seed (32 bytes). Never logged or gossiped.
    pub sig_priv: Vec<u8>,
    /// X25519 secret (32 bytes). Never logged or gossiped.
    pub enc_priv: Vec<u8>,
    pub members: Vec<CommitteeMember>,
}

impl CommitteeConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.session_id.is_empty() || self.n == 0 {
            return Err(Error::Invalid);
        }
        // Threshold domain is 1 < t <= n.
        if self.threshold <= 1 || self.threshold > self.n {
            return Err(Error::Invalid);
        }
        if self.self_index == 0 || self.self_index > self.n {
            return Err(Error::Invalid);
        }
        if self.sig_priv.len() != SIG_KEY_LEN || self.enc_priv.len() != ENC_KEY_LEN {
            return Err(Error::Invalid);
        }
        if self.members.len() != self.n as usize {
            return Err(Error::Invalid);
        }
        let mut seen = vec![false; self.n as usize + 1];
        for m in &self.members {
            if m.index == 0 || m.index > self.n {
                return Err(Error::Invalid);
            }
            if seen[m.index as usize] {
                return Err(Error::Invalid);
            }
            if m.sig_pub.len() != SIG_KEY_LEN || m.enc_pub.len() != ENC_KEY_LEN {
                return Err(Error::Invalid);
            }
            seen[m.index as usize] = true;
        }
        Ok(())
    }

    pub fn member(&self, index: MemberIndex) -> Option<&CommitteeMember> {
        self.members.iter().find(|m| m.index == index)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, Error> {
        let cfg: CommitteeConfig = serde_json::from_slice(bytes).map_err(|_| Error::Invalid)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Public side of a finished DKG, shared with transaction senders.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupPublicKey {
    /// Compressed G1 group public key (48 bytes).
    pub group_pubkey: Vec<u8>,
    pub threshold: u32,
    pub n: u32,
}

impl GroupPublicKey {
    pub fn validate(&self) -> Result<(), Error> {
        if self.group_pubkey.len() != 48 || self.n == 0 || self.threshold == 0 {
            return Err(Error::Invalid);
        }
        Ok(())
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, Error> {
        let pk: GroupPublicKey = serde_json::from_slice(bytes).map_err(|_| Error::Invalid)?;
        pk.validate()?;
        Ok(pk)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(|_| Error::Invalid)
    }
}
