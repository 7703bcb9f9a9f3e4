//! Feldman DKG session state machine.
//!
//! The session is sans-io: inbound gossip goes through [`DkgSession::handle`],
//! which returns the signed messages to broadcast in response. A runner (see
//! `runner`) wires this to a transport, a retry ticker and an epoch watchdog.
//!
//! Message flow per epoch: every dealer broadcasts Feldman commitments to its
//! polynomial and sends each receiver an AES-GCM-sealed share under a
//! pair-derived key. Receivers verify shares against the commitments, ack on
//! success and complain on failure; accused dealers answer complaints by
//! opening the share in clear so the whole committee can re-check it. Dealers
//! whose material fails verification are disqualified. Once every qualified
//! dealer has a full ack set and no open complaints, the group public key is
//! the sum of the constant-term commitments over QUAL and the local long-term
//! share is the sum of the verified shares.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::{Duration, Instant};

use blake3::Hasher;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use ff::Field;
use group::Group;
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

use crate::aead;
use crate::bls::{
    g1_from_bytes, g1_to_bytes, scalar_from_bytes, scalar_from_index, scalar_random,
    scalar_to_bytes, Fr, G1,
};
use crate::committee::CommitteeConfig;
use crate::session_store::SessionState;
use crate::types::{Error, MemberIndex};

const PAIR_KEY_DST: &[u8] = b"EQS/BEAST/DKG/v1";
const TRANSCRIPT_DST: &[u8] = b"EQS/BEAST/DKG/TRANSCRIPT";

/// Default epoch watchdog timeout.
pub const DEFAULT_EPOCH_TIMEOUT: Duration = Duration::from_secs(60);
/// Default rebroadcast interval.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DkgMessageKind {
    #[serde(rename = "commitments")]
    Commitments,
    #[serde(rename = "share")]
    Share,
    #[serde(rename = "share_open")]
    ShareOpen,
    #[serde(rename = "ack")]
    Ack,
    #[serde(rename = "complaint")]
    Complaint,
}

/// Signed DKG gossip message. The Ed25519 signature covers the JSON encoding
/// with `sig` cleared; field order is fixed by declaration order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DkgGossip {
    pub session_id: String,
    pub epoch: u64,
    #[serde(rename = "type")]
    pub kind: DkgMessageKind,
    pub from_index: MemberIndex,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_index: Option<MemberIndex>,
    /// Compressed G1 commitments (48 bytes each), `commitments` only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commitments: Option<Vec<Vec<u8>>>,
    /// AES-GCM nonce, `share` only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Vec<u8>>,
    /// Sealed share scalar, `share` only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ciphertext: Option<Vec<u8>>,
    /// Cleartext share scalar, `share_open` only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sig: Vec<u8>,
}

impl DkgGossip {
    fn bare(
        cfg: &CommitteeConfig,
        epoch: u64,
        kind: DkgMessageKind,
        to_index: Option<MemberIndex>,
    ) -> Self {
        Self {
            session_id: cfg.session_id.clone(),
            epoch,
            kind,
            from_index: cfg.self_index,
            to_index,
            commitments: None,
            nonce: None,
            ciphertext: None,
            share: None,
            sig: Vec::new(),
        }
    }
}

/// Output of a finished DKG.
#[derive(Clone)]
pub struct DkgResult {
    pub index: MemberIndex,
    pub threshold: u32,
    pub group_pubkey: G1,
    /// Long-term Shamir share of the group secret. Never log or gossip.
    pub share: Fr,
    pub transcript: [u8; 32],
}

impl fmt::Debug for DkgResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DkgResult")
            .field("index", &self.index)
            .field("threshold", &self.threshold)
            .field("group_pubkey", &g1_to_bytes(&self.group_pubkey))
            .field("share", &"<redacted>")
            .field("transcript", &self.transcript)
            .finish()
    }
}

/// Per-epoch DKG session state for one committee member.
pub struct DkgSession {
    cfg: CommitteeConfig,
    signing_key: SigningKey,
    enc_secret: StaticSecret,

    epoch: u64,
    epoch_start: Instant,

    coeffs: Vec<Fr>,
    self_commitments: Vec<G1>,

    commitments: BTreeMap<MemberIndex, Vec<G1>>,
    shares: BTreeMap<MemberIndex, Fr>,
    pending_share: BTreeMap<MemberIndex, DkgGossip>,
    pending_open: BTreeMap<MemberIndex, Vec<DkgGossip>>,

    acks: BTreeMap<MemberIndex, BTreeSet<MemberIndex>>,
    complaints: BTreeMap<MemberIndex, BTreeSet<MemberIndex>>,
    bad_dealers: BTreeSet<MemberIndex>,

    done: bool,
    finalizing: bool,
    result: Option<DkgResult>,

    dropped_bad_sig: u64,
    transcript: Vec<[u8; 32]>,
}

impl DkgSession {
    pub fn new(cfg: CommitteeConfig) -> Result<Self, Error> {
        cfg.validate()?;
        let sig_seed: [u8; 32] = cfg.sig_priv.as_slice().try_into().map_err(|_| Error::Invalid)?;
        let enc_seed: [u8; 32] = cfg.enc_priv.as_slice().try_into().map_err(|_| Error::Invalid)?;
        let epoch = if cfg.epoch == 0 { 1 } else { cfg.epoch };
        let mut session = Self {
            signing_key: SigningKey::from_bytes(&sig_seed),
            enc_secret: StaticSecret::from(enc_seed),
            cfg,
            epoch,
            epoch_start: Instant::now(),
            coeffs: Vec::new(),
            self_commitments: Vec::new(),
            commitments: BTreeMap::new(),
            shares: BTreeMap::new(),
            pending_share: BTreeMap::new(),
            pending_open: BTreeMap::new(),
            acks: BTreeMap::new(),
            complaints: BTreeMap::new(),
            bad_dealers: BTreeSet::new(),
            done: false,
            finalizing: false,
            result: None,
            dropped_bad_sig: 0,
            transcript: Vec::new(),
        };
        session.regenerate_polynomial();
        Ok(session)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn result(&self) -> Option<&DkgResult> {
        self.result.as_ref()
    }

    /// Count of inbound messages dropped for bad signatures.
    pub fn dropped_bad_sig(&self) -> u64 {
        self.dropped_bad_sig
    }

    pub fn config(&self) -> &CommitteeConfig {
        &self.cfg
    }

    fn regenerate_polynomial(&mut self) {
        let t = self.cfg.threshold as usize;
        let mut coeffs = Vec::with_capacity(t);
        for _ in 0..t {
            coeffs.push(scalar_random(&mut OsRng));
        }
        self.install_polynomial(coeffs);
    }

    fn install_polynomial(&mut self, coeffs: Vec<Fr>) {
        self.self_commitments = commitments_from_poly(&coeffs);
        self.coeffs = coeffs;
        self.commitments
            .insert(self.cfg.self_index, self.self_commitments.clone());
        if let Ok(x) = scalar_from_index(self.cfg.self_index) {
            self.shares
                .insert(self.cfg.self_index, eval_poly(&self.coeffs, &x));
        }
    }

    /// Signed commitments broadcast plus one sealed share per receiver.
    pub fn initial_messages(&self) -> Result<Vec<DkgGossip>, Error> {
        let mut out = Vec::with_capacity(self.cfg.n as usize);
        out.push(self.build_commitments()?);
        for to in 1..=self.cfg.n {
            if to == self.cfg.self_index {
                continue;
            }
            out.push(self.build_share(to)?);
        }
        Ok(out)
    }

    /// Rebroadcast commitments and re-send shares to receivers whose ack has
    /// not arrived yet.
    pub fn retry_messages(&self) -> Result<Vec<DkgGossip>, Error> {
        if self.done {
            return Ok(Vec::new());
        }
        let acked = self.acks.get(&self.cfg.self_index);
        let mut out = vec![self.build_commitments()?];
        for to in 1..=self.cfg.n {
            if to == self.cfg.self_index {
                continue;
            }
            if acked.is_some_and(|set| set.contains(&to)) {
                continue;
            }
            out.push(self.build_share(to)?);
        }
        Ok(out)
    }

    /// Bump the epoch when the current one has been running longer than
    /// `timeout`. Returns the new epoch's opening messages when it fires.
    pub fn check_epoch_timeout(&mut self, timeout: Duration) -> Option<Vec<DkgGossip>> {
        if self.done || self.epoch_start.elapsed() < timeout {
            return None;
        }
        Some(self.bump_epoch(self.epoch + 1, "timeout"))
    }

    /// Handle one inbound gossip message; returns the responses to broadcast.
    /// Unauthorized or malformed traffic is dropped silently (and counted for
    /// bad signatures).
    pub fn handle(&mut self, msg: DkgGossip) -> Vec<DkgGossip> {
        if msg.session_id != self.cfg.session_id {
            return Vec::new();
        }
        if msg.from_index == 0
            || msg.from_index > self.cfg.n
            || msg.from_index == self.cfg.self_index
        {
            return Vec::new();
        }
        if !self.verify_sig(&msg) {
            self.dropped_bad_sig += 1;
            tracing::debug!(from = msg.from_index, "dkg message dropped: bad signature");
            return Vec::new();
        }
        if msg.epoch == 0 || msg.epoch < self.epoch {
            return Vec::new();
        }
        let mut out = Vec::new();
        if msg.epoch > self.epoch {
            if self.done {
                // A finished session never re-opens.
                return Vec::new();
            }
            out.extend(self.bump_epoch(msg.epoch, "remote"));
        }
        if self.done {
            return out;
        }
        if self.bad_dealers.contains(&msg.from_index)
            && matches!(
                msg.kind,
                DkgMessageKind::Commitments | DkgMessageKind::Share | DkgMessageKind::ShareOpen
            )
        {
            // Dealer material from disqualified members is ignored; their
            // acks and complaints about others still count.
            return out;
        }
        match msg.kind {
            DkgMessageKind::Commitments => out.extend(self.on_commitments(msg)),
            DkgMessageKind::Share => out.extend(self.on_share(msg)),
            DkgMessageKind::Ack => self.on_ack(&msg),
            DkgMessageKind::Complaint => out.extend(self.on_complaint(&msg)),
            DkgMessageKind::ShareOpen => out.extend(self.on_share_open(msg)),
        }
        out.extend(self.maybe_finalize());
        out
    }

    fn on_commitments(&mut self, msg: DkgGossip) -> Vec<DkgGossip> {
        let from = msg.from_index;
        if self.commitments.contains_key(&from) {
            // First accepted dealing wins; repeats are ignored.
            return Vec::new();
        }
        let decoded = msg
            .commitments
            .as_ref()
            .filter(|raw| raw.len() == self.cfg.threshold as usize)
            .map(|raw| {
                raw.iter()
                    .map(|b| g1_from_bytes(b))
                    .collect::<Result<Vec<G1>, Error>>()
            });
        let points = match decoded {
            Some(Ok(points)) => points,
            _ => {
                self.disqualify(from, "malformed commitments");
                return Vec::new();
            }
        };
        self.note_transcript(&msg);
        self.commitments.insert(from, points);
        let mut out = Vec::new();
        if let Some(pending) = self.pending_share.remove(&from) {
            out.extend(self.on_share(pending));
        }
        for pending in self.pending_open.remove(&from).unwrap_or_default() {
            out.extend(self.on_share_open(pending));
        }
        out
    }

    fn on_share(&mut self, msg: DkgGossip) -> Vec<DkgGossip> {
        let from = msg.from_index;
        if msg.to_index != Some(self.cfg.self_index) {
            return Vec::new();
        }
        if self.shares.contains_key(&from) {
            // Re-ack so a dealer that missed our first ack stops retrying;
            // session state is untouched.
            return self
                .build_signed(DkgMessageKind::Ack, Some(from))
                .into_iter()
                .collect();
        }
        if !self.commitments.contains_key(&from) {
            // Commitments must land before the share can be verified.
            self.pending_share.insert(from, msg);
            return Vec::new();
        }
        let verified = self.open_and_verify_share(&msg);
        match verified {
            Ok(share) => {
                self.note_transcript(&msg);
                self.shares.insert(from, share);
                self.acks
                    .entry(from)
                    .or_default()
                    .insert(self.cfg.self_index);
                self.build_signed(DkgMessageKind::Ack, Some(from))
                    .into_iter()
                    .collect()
            }
            Err(err) => {
                tracing::debug!(dealer = from, %err, "share verification failed; complaining");
                self.complaints
                    .entry(from)
                    .or_default()
                    .insert(self.cfg.self_index);
                self.build_signed(DkgMessageKind::Complaint, Some(from))
                    .into_iter()
                    .collect()
            }
        }
    }

    fn open_and_verify_share(&self, msg: &DkgGossip) -> Result<Fr, Error> {
        let nonce = msg.nonce.as_deref().ok_or(Error::Invalid)?;
        let sealed = msg.ciphertext.as_deref().ok_or(Error::Invalid)?;
        let key = self.pair_key(msg.from_index, self.cfg.self_index)?;
        let plain = aead::open(&key, nonce, sealed, &[])?;
        let share = scalar_from_bytes(&plain)?;
        let commitments = self
            .commitments
            .get(&msg.from_index)
            .ok_or(Error::Invalid)?;
        if !verify_feldman_share(&share, self.cfg.self_index, commitments)? {
            return Err(Error::Invalid);
        }
        Ok(share)
    }

    fn on_ack(&mut self, msg: &DkgGossip) {
        let Some(dealer) = msg.to_index else {
            return;
        };
        if dealer == 0 || dealer > self.cfg.n {
            return;
        }
        if self.acks.entry(dealer).or_default().insert(msg.from_index) {
            self.note_transcript(msg);
        }
    }

    fn on_complaint(&mut self, msg: &DkgGossip) -> Vec<DkgGossip> {
        let Some(against) = msg.to_index else {
            return Vec::new();
        };
        if against == 0 || against > self.cfg.n {
            return Vec::new();
        }
        if self
            .complaints
            .entry(against)
            .or_default()
            .insert(msg.from_index)
        {
            self.note_transcript(msg);
        }
        if against != self.cfg.self_index {
            return Vec::new();
        }
        // We are the accused dealer: open the complainant's share in clear so
        // the whole committee can re-run the Feldman check.
        match self.build_share_open(msg.from_index) {
            Ok(open) => vec![open],
            Err(err) => {
                tracing::debug!(complainant = msg.from_index, %err, "share_open build failed");
                Vec::new()
            }
        }
    }

    fn on_share_open(&mut self, msg: DkgGossip) -> Vec<DkgGossip> {
        let from = msg.from_index;
        let Some(to) = msg.to_index else {
            return Vec::new();
        };
        if to == 0 || to > self.cfg.n {
            return Vec::new();
        }
        if !self.commitments.contains_key(&from) {
            self.pending_open.entry(from).or_default().push(msg);
            return Vec::new();
        }
        let verified = msg
            .share
            .as_deref()
            .ok_or(Error::Invalid)
            .and_then(scalar_from_bytes)
            .and_then(|share| {
                let commitments = self.commitments.get(&from).ok_or(Error::Invalid)?;
                if verify_feldman_share(&share, to, commitments)? {
                    Ok(share)
                } else {
                    Err(Error::Invalid)
                }
            });
        let share = match verified {
            Ok(share) => share,
            Err(_) => {
                // An opened share that fails its own commitments is proof of
                // a bad dealing.
                self.disqualify(from, "share_open failed verification");
                return Vec::new();
            }
        };
        let mut changed = false;
        if let Some(set) = self.complaints.get_mut(&from) {
            if set.remove(&to) {
                changed = true;
            }
            if set.is_empty() {
                self.complaints.remove(&from);
            }
        }
        let mut out = Vec::new();
        if to == self.cfg.self_index && !self.shares.contains_key(&from) {
            self.shares.insert(from, share);
            self.acks
                .entry(from)
                .or_default()
                .insert(self.cfg.self_index);
            changed = true;
            out.extend(self.build_signed(DkgMessageKind::Ack, Some(from)));
        }
        if changed {
            self.note_transcript(&msg);
        }
        out
    }

    fn disqualify(&mut self, dealer: MemberIndex, reason: &str) {
        if self.bad_dealers.insert(dealer) {
            tracing::info!(dealer, reason, "dealer disqualified");
        }
        self.pending_share.remove(&dealer);
        self.pending_open.remove(&dealer);
    }

    fn maybe_finalize(&mut self) -> Vec<DkgGossip> {
        if self.done || self.finalizing {
            return Vec::new();
        }
        let n = self.cfg.n;
        let t = self.cfg.threshold as usize;
        let remaining = (1..=n).filter(|d| !self.bad_dealers.contains(d)).count();
        if remaining < t {
            tracing::warn!(
                remaining,
                threshold = t,
                "too few qualified dealers; bumping epoch"
            );
            return self.bump_epoch(self.epoch + 1, "insufficient dealers");
        }
        let qual: Vec<MemberIndex> = (1..=n)
            .filter(|d| {
                !self.bad_dealers.contains(d)
                    && self.acks.get(d).map_or(0, BTreeSet::len) >= (n - 1) as usize
                    && self.complaints.get(d).map_or(true, BTreeSet::is_empty)
                    && self.shares.contains_key(d)
                    && self.commitments.contains_key(d)
            })
            .collect();
        if qual.len() < t {
            return Vec::new();
        }
        self.finalizing = true;
        let mut group_pubkey = G1::identity();
        let mut share = Fr::ZERO;
        for d in &qual {
            group_pubkey += self.commitments[d][0];
            share += self.shares[d];
        }
        let transcript = self.transcript_digest();
        self.result = Some(DkgResult {
            index: self.cfg.self_index,
            threshold: self.cfg.threshold,
            group_pubkey,
            share,
            transcript,
        });
        self.done = true;
        self.finalizing = false;
        tracing::info!(
            epoch = self.epoch,
            qual = ?qual,
            "dkg finalized"
        );
        Vec::new()
    }

    fn bump_epoch(&mut self, new_epoch: u64, reason: &str) -> Vec<DkgGossip> {
        tracing::info!(from = self.epoch, to = new_epoch, reason, "dkg epoch bump");
        self.epoch = new_epoch;
        self.epoch_start = Instant::now();
        self.commitments.clear();
        self.shares.clear();
        self.pending_share.clear();
        self.pending_open.clear();
        self.acks.clear();
        self.complaints.clear();
        self.bad_dealers.clear();
        self.transcript.clear();
        self.regenerate_polynomial();
        self.initial_messages().unwrap_or_default()
    }

    fn build_commitments(&self) -> Result<DkgGossip, Error> {
        let mut msg = DkgGossip::bare(&self.cfg, self.epoch, DkgMessageKind::Commitments, None);
        msg.commitments = Some(
            self.self_commitments
                .iter()
                .map(|c| g1_to_bytes(c).to_vec())
                .collect(),
        );
        self.sign(msg)
    }

    fn build_share(&self, to: MemberIndex) -> Result<DkgGossip, Error> {
        let x = scalar_from_index(to)?;
        let share = eval_poly(&self.coeffs, &x);
        let key = self.pair_key(self.cfg.self_index, to)?;
        let mut nonce = [0u8; aead::NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let sealed = aead::seal(&key, &nonce, &scalar_to_bytes(&share), &[])?;
        let mut msg = DkgGossip::bare(&self.cfg, self.epoch, DkgMessageKind::Share, Some(to));
        msg.nonce = Some(nonce.to_vec());
        msg.ciphertext = Some(sealed);
        self.sign(msg)
    }

    fn build_share_open(&self, complainant: MemberIndex) -> Result<DkgGossip, Error> {
        let x = scalar_from_index(complainant)?;
        let share = eval_poly(&self.coeffs, &x);
        let mut msg = DkgGossip::bare(
            &self.cfg,
            self.epoch,
            DkgMessageKind::ShareOpen,
            Some(complainant),
        );
        msg.share = Some(scalar_to_bytes(&share).to_vec());
        self.sign(msg)
    }

    fn build_signed(&self, kind: DkgMessageKind, to: Option<MemberIndex>) -> Option<DkgGossip> {
        self.sign(DkgGossip::bare(&self.cfg, self.epoch, kind, to)).ok()
    }

    fn sign(&self, mut msg: DkgGossip) -> Result<DkgGossip, Error> {
        msg.sig = Vec::new();
        let bytes = serde_json::to_vec(&msg).map_err(|_| Error::Invalid)?;
        msg.sig = self.signing_key.sign(&bytes).to_bytes().to_vec();
        Ok(msg)
    }

    fn verify_sig(&self, msg: &DkgGossip) -> bool {
        let Some(member) = self.cfg.member(msg.from_index) else {
            return false;
        };
        let Ok(vk_bytes) = <[u8; 32]>::try_from(member.sig_pub.as_slice()) else {
            return false;
        };
        let Ok(vk) = VerifyingKey::from_bytes(&vk_bytes) else {
            return false;
        };
        let Ok(sig) = Signature::from_slice(&msg.sig) else {
            return false;
        };
        let mut unsigned = msg.clone();
        unsigned.sig = Vec::new();
        let Ok(bytes) = serde_json::to_vec(&unsigned) else {
            return false;
        };
        vk.verify(&bytes, &sig).is_ok()
    }

    /// Symmetric key for the (dealer, receiver) pair:
    /// `SHA-256(dst ‖ X25519(self, peer) ‖ session_id ‖ epoch ‖ from ‖ to)`.
    fn pair_key(&self, from: MemberIndex, to: MemberIndex) -> Result<[u8; 32], Error> {
        let me = self.cfg.self_index;
        let peer = if from == me && to != me {
            to
        } else if to == me && from != me {
            from
        } else {
            return Err(Error::Unauthorized);
        };
        let member = self.cfg.member(peer).ok_or(Error::Unauthorized)?;
        let pub_bytes: [u8; 32] = member
            .enc_pub
            .as_slice()
            .try_into()
            .map_err(|_| Error::Unauthorized)?;
        let shared = self
            .enc_secret
            .diffie_hellman(&X25519Public::from(pub_bytes));
        let mut hasher = Sha256::new();
        hasher.update(PAIR_KEY_DST);
        hasher.update(shared.as_bytes());
        hasher.update(self.cfg.session_id.as_bytes());
        hasher.update(self.epoch.to_be_bytes());
        hasher.update(from.to_be_bytes());
        hasher.update(to.to_be_bytes());
        Ok(hasher.finalize().into())
    }

    fn note_transcript(&mut self, msg: &DkgGossip) {
        if let Ok(bytes) = serde_json::to_vec(msg) {
            let mut hasher = Hasher::new();
            hasher.update(&bytes);
            self.transcript.push(*hasher.finalize().as_bytes());
        }
    }

    fn transcript_digest(&self) -> [u8; 32] {
        let mut hashes = self.transcript.clone();
        hashes.sort_unstable();
        let mut hasher = Hasher::new();
        hasher.update(TRANSCRIPT_DST);
        for h in &hashes {
            hasher.update(h);
        }
        *hasher.finalize().as_bytes()
    }

    /// Snapshot for the session store; sufficient to resume this epoch
    /// without regenerating the polynomial.
    pub fn snapshot(&self) -> SessionState {
        let mut state = SessionState {
            epoch: self.epoch,
            coeffs: self.coeffs.iter().map(|c| scalar_to_bytes(c).to_vec()).collect(),
            self_commitments: self
                .self_commitments
                .iter()
                .map(|c| g1_to_bytes(c).to_vec())
                .collect(),
            done: self.done,
            ..SessionState::default()
        };
        for (dealer, points) in &self.commitments {
            state.commitments.insert(
                *dealer,
                points.iter().map(|p| g1_to_bytes(p).to_vec()).collect(),
            );
        }
        for (dealer, share) in &self.shares {
            state.shares.insert(*dealer, scalar_to_bytes(share).to_vec());
        }
        for (dealer, set) in &self.acks {
            state.acks.insert(*dealer, set.iter().copied().collect());
        }
        for (dealer, set) in &self.complaints {
            state
                .complaints
                .insert(*dealer, set.iter().copied().collect());
        }
        state.bad_dealers = self.bad_dealers.iter().copied().collect();
        if let Some(result) = &self.result {
            state.group_pubkey = g1_to_bytes(&result.group_pubkey).to_vec();
            state.share_scalar = scalar_to_bytes(&result.share).to_vec();
            state.transcript = result.transcript.to_vec();
        }
        state
    }

    /// Mark the session done with previously persisted outputs (key-share
    /// short-circuit at startup).
    pub fn install_result(&mut self, group_pubkey: &[u8], share_scalar: &[u8]) -> Result<(), Error> {
        self.result = Some(DkgResult {
            index: self.cfg.self_index,
            threshold: self.cfg.threshold,
            group_pubkey: g1_from_bytes(group_pubkey)?,
            share: scalar_from_bytes(share_scalar)?,
            transcript: [0u8; 32],
        });
        self.done = true;
        Ok(())
    }

    /// Restore a persisted snapshot into this session.
    pub fn restore(&mut self, state: SessionState) -> Result<(), Error> {
        if state.epoch == 0 {
            return Err(Error::Invalid);
        }
        self.epoch = state.epoch;
        self.epoch_start = Instant::now();
        if state.done && state.share_scalar.len() == 32 {
            self.done = true;
            let mut transcript = [0u8; 32];
            if state.transcript.len() == 32 {
                transcript.copy_from_slice(&state.transcript);
            }
            self.result = Some(DkgResult {
                index: self.cfg.self_index,
                threshold: self.cfg.threshold,
                group_pubkey: g1_from_bytes(&state.group_pubkey)?,
                share: scalar_from_bytes(&state.share_scalar)?,
                transcript,
            });
            return Ok(());
        }
        if !state.coeffs.is_empty() {
            let coeffs = state
                .coeffs
                .iter()
                .map(|b| scalar_from_bytes(b))
                .collect::<Result<Vec<Fr>, Error>>()?;
            self.install_polynomial(coeffs);
        }
        for (dealer, raw) in &state.commitments {
            let points = raw
                .iter()
                .map(|b| g1_from_bytes(b))
                .collect::<Result<Vec<G1>, Error>>()?;
            self.commitments.insert(*dealer, points);
        }
        for (dealer, raw) in &state.shares {
            if let Ok(share) = scalar_from_bytes(raw) {
                self.shares.insert(*dealer, share);
            }
        }
        for (dealer, list) in &state.acks {
            self.acks
                .insert(*dealer, list.iter().copied().collect());
        }
        for (dealer, list) in &state.complaints {
            self.complaints
                .insert(*dealer, list.iter().copied().collect());
        }
        self.bad_dealers = state.bad_dealers.iter().copied().collect();
        Ok(())
    }
}

pub fn eval_poly(coeffs: &[Fr], x: &Fr) -> Fr {
    let mut acc = Fr::ZERO;
    for coeff in coeffs.iter().rev() {
        acc *= x;
        acc += coeff;
    }
    acc
}

pub fn commitments_from_poly(coeffs: &[Fr]) -> Vec<G1> {
    coeffs.iter().map(|c| G1::generator() * c).collect()
}

/// Feldman check: `g1^share == Σ C_m · index^m`.
pub fn verify_feldman_share(
    share: &Fr,
    index: MemberIndex,
    commitments: &[G1],
) -> Result<bool, Error> {
    if commitments.is_empty() {
        return Err(Error::Invalid);
    }
    let x = scalar_from_index(index)?;
    let lhs = G1::generator() * share;
    let mut rhs = G1::identity();
    let mut power = Fr::ONE;
    for c in commitments {
        rhs += *c * power;
        power *= x;
    }
    Ok(lhs == rhs)
}
