//! Deterministic JSON codec for private transactions.
//!
//! The inner envelope is what a sender encrypts; the private envelope is the
//! encrypted-until-reveal wrapper that circulates before the target height.
//! Field order is fixed by struct declaration order and the output carries no
//! whitespace, so every node serializes signed and persisted bodies
//! identically.

use serde::{Deserialize, Serialize};

use crate::bte::{CIPHERTEXT_LEN, SHARE_LEN};
use crate::types::{BlockHeight, Error, MemberIndex};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadKind {
    #[serde(rename = "plaintext_v1")]
    PlaintextV1,
    #[serde(rename = "auction_bid_v1")]
    AuctionBidV1,
}

/// Plaintext transaction revealed after decryption.
///
/// `fee` is required for `plaintext_v1`, `bid` for `auction_bid_v1`;
/// `fee_recipient` is only meaningful for bids.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnerEnvelope {
    #[serde(rename = "type")]
    pub kind: PayloadKind,
    pub from: String,
    pub nonce: u64,
    pub gas: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_recipient: Option<String>,
}

impl InnerEnvelope {
    pub fn validate(&self) -> Result<(), Error> {
        if self.from.is_empty() {
            return Err(Error::Decode);
        }
        match self.kind {
            PayloadKind::PlaintextV1 if self.fee.is_none() => Err(Error::Decode),
            PayloadKind::AuctionBidV1 if self.bid.is_none() => Err(Error::Decode),
            _ => Ok(()),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        self.validate()?;
        serde_json::to_vec(self).map_err(|_| Error::Decode)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let env: InnerEnvelope = serde_json::from_slice(bytes).map_err(|_| Error::Decode)?;
        env.validate()?;
        Ok(env)
    }

    /// Ordering key used by payload pools: fee for plaintext, bid for bids.
    pub fn sort_key(&self) -> u64 {
        match self.kind {
            PayloadKind::PlaintextV1 => self.fee.unwrap_or(0),
            PayloadKind::AuctionBidV1 => self.bid.unwrap_or(0),
        }
    }
}

/// Encrypted-until-reveal wrapper targeted at a block height.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateEnvelope {
    pub from: String,
    pub nonce: u64,
    pub target_height: BlockHeight,
    pub batch_index: MemberIndex,
    /// `C1 ‖ C2` (96 bytes).
    pub ephemeral_key: Vec<u8>,
    /// XOR-masked inner envelope bytes.
    pub ciphertext: Vec<u8>,
    /// Sender's punctured PPRF key at `batch_index` (48 bytes).
    pub punctured_key: Vec<u8>,
}

impl PrivateEnvelope {
    /// Shape check against the batch domain `[1..n]`.
    pub fn validate_shape(&self, n: MemberIndex) -> Result<(), Error> {
        if self.target_height == 0
            || self.ciphertext.is_empty()
            || self.ephemeral_key.len() != CIPHERTEXT_LEN
            || self.punctured_key.len() != SHARE_LEN
            || self.batch_index == 0
            || self.batch_index > n
        {
            return Err(Error::Invalid);
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(|_| Error::Decode)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(bytes).map_err(|_| Error::Decode)
    }
}
