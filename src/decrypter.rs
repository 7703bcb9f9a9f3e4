//! Batched decrypt pipeline and the matching seal path.
//!
//! One [`BatchDecrypter`] is constructed per node after the DKG finishes; it
//! owns its share collector and PPRF parameters (no process-wide state) and
//! is safe to call from concurrent consumers. Opening a private envelope:
//! validate the shape, gate on the target height, contribute and publish the
//! local decrypt share, and once `t` shares are visible recover `g^k`,
//! rebuild the PRF value, strip the XOR mask and decode the inner envelope.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand_core::OsRng;

use crate::backend::{BlsBackend, BlstBackend};
use crate::bls::{g1_from_bytes, g1_to_bytes, gt_to_bytes, Fr, G1};
use crate::bte::{self, DecryptShare, KeyCiphertext};
use crate::collector::ShareCollector;
use crate::envelope::{InnerEnvelope, PrivateEnvelope};
use crate::pprf;
use crate::transport::{ShareGossip, SharePublisher};
use crate::types::{BlockHeight, Error, MemberIndex};

/// Committee-side parameters for the decrypt pipeline.
#[derive(Clone)]
pub struct DecrypterConfig {
    pub group_pubkey: G1,
    /// PPRF batch domain size; independent of the committee size.
    pub batch_n: u32,
    pub threshold: u32,
    pub self_index: MemberIndex,
    /// This node's long-term Shamir share. Never logged or gossiped.
    pub share: Fr,
}

impl DecrypterConfig {
    fn validate(&self) -> Result<(), Error> {
        if self.batch_n == 0 || self.threshold == 0 || self.self_index == 0 {
            return Err(Error::Invalid);
        }
        Ok(())
    }
}

pub struct BatchDecrypter {
    cfg: DecrypterConfig,
    backend: Box<dyn BlsBackend>,
    collector: ShareCollector,
    publisher: Option<Arc<dyn SharePublisher>>,
}

impl BatchDecrypter {
    /// Production pipeline: pairing backend with parameters derived from the
    /// group public key.
    pub fn new(
        cfg: DecrypterConfig,
        publisher: Option<Arc<dyn SharePublisher>>,
    ) -> Result<Self, Error> {
        cfg.validate()?;
        let backend = Box::new(BlstBackend::new(cfg.batch_n, &cfg.group_pubkey)?);
        Ok(Self {
            cfg,
            backend,
            collector: ShareCollector::new(),
            publisher,
        })
    }

    /// Pipeline over an explicit backend (tests use [`crate::backend::NullBackend`]).
    pub fn with_backend(
        cfg: DecrypterConfig,
        backend: Box<dyn BlsBackend>,
        publisher: Option<Arc<dyn SharePublisher>>,
    ) -> Result<Self, Error> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            backend,
            collector: ShareCollector::new(),
            publisher,
        })
    }

    pub fn config(&self) -> &DecrypterConfig {
        &self.cfg
    }

    pub fn collector(&self) -> &ShareCollector {
        &self.collector
    }

    /// Ingest a gossiped remote decrypt share; idempotent and shape-checked.
    pub fn ingest_remote_share(&self, msg: &ShareGossip) {
        self.collector.ingest_remote(msg.height, msg.index, &msg.share);
    }

    /// Attempt to open a private envelope at the current block height.
    pub fn open(
        &self,
        current_height: BlockHeight,
        env: &PrivateEnvelope,
    ) -> Result<InnerEnvelope, Error> {
        env.validate_shape(self.cfg.batch_n)?;
        if current_height < env.target_height {
            return Err(Error::Early);
        }
        let ct = KeyCiphertext::from_bytes(&env.ephemeral_key)?;

        // Contribute our own share and gossip it once per height.
        let my_share = self
            .backend
            .partial_decrypt(&ct, &self.cfg.share, self.cfg.self_index)?;
        let share_bytes = g1_to_bytes(&my_share.value);
        self.collector.record_local(
            env.target_height,
            env.batch_index,
            self.cfg.self_index,
            share_bytes,
        );
        if self.collector.mark_sent(env.target_height) {
            if let Some(publisher) = &self.publisher {
                let gossip = ShareGossip {
                    height: env.target_height,
                    index: self.cfg.self_index,
                    share: share_bytes.to_vec(),
                };
                if let Err(err) = publisher.publish(gossip) {
                    tracing::debug!(height = env.target_height, %err, "share publish failed");
                }
            }
        }

        let snapshot = self.collector.snapshot(env.target_height, env.batch_index);
        if snapshot.len() < self.cfg.threshold as usize {
            return Err(Error::NotReady);
        }
        let shares = snapshot
            .iter()
            .map(|(index, raw)| {
                Ok(DecryptShare {
                    index: *index,
                    value: g1_from_bytes(raw)?,
                })
            })
            .collect::<Result<Vec<DecryptShare>, Error>>()
            .map_err(|_| Error::Cipher)?;

        let gk = self
            .backend
            .combine(&ct, &shares, self.cfg.threshold as usize)
            .map_err(|_| Error::Cipher)?;

        let mut punctured = BTreeMap::new();
        punctured.insert(env.batch_index, g1_from_bytes(&env.punctured_key)?);
        let prf = self
            .backend
            .recover_prf(&gk, env.batch_index, &punctured)
            .map_err(|_| Error::Cipher)?;

        let plaintext = bte::xor_mask(&env.ciphertext, &prf);
        if plaintext.is_empty() {
            return Err(Error::Empty);
        }
        InnerEnvelope::decode(&plaintext).map_err(|_| Error::Decode)
    }
}

/// Seal an inner envelope into a private envelope decryptable from
/// `target_height` on: mask the plaintext with the PRF at `batch_index`,
/// encrypt the PRF key under the group public key, and attach the punctured
/// key for the batch slot.
pub fn seal_envelope(
    group_pubkey: &G1,
    n: u32,
    inner: &InnerEnvelope,
    target_height: BlockHeight,
    batch_index: MemberIndex,
) -> Result<PrivateEnvelope, Error> {
    if n == 0 || batch_index == 0 || batch_index > n || target_height == 0 {
        return Err(Error::Invalid);
    }
    let plaintext = inner.encode()?;
    let pp = pprf::setup_deterministic(n as usize, &g1_to_bytes(group_pubkey))?;
    let key = pprf::key_gen(&mut OsRng);
    let prf = pprf::eval(&pp, &key, batch_index as usize)?;
    let masked = bte::xor_mask(&plaintext, &gt_to_bytes(&prf));
    let ct = bte::encrypt_key(group_pubkey, &key, &mut OsRng);
    let punctured = pprf::puncture(&pp, &key, batch_index as usize)?;
    Ok(PrivateEnvelope {
        from: inner.from.clone(),
        nonce: inner.nonce,
        target_height,
        batch_index,
        ephemeral_key: ct.to_bytes().to_vec(),
        ciphertext: masked,
        punctured_key: g1_to_bytes(&punctured).to_vec(),
    })
}
