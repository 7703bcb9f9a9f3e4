//! Shared helpers for integration tests: deterministic committees and an
//! in-memory delivery loop for DKG gossip.
#![allow(dead_code)]

use beast_core::committee::{CommitteeConfig, CommitteeMember};
use beast_core::dkg::{DkgGossip, DkgSession};
use ed25519_dalek::SigningKey;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

fn sig_seed(index: u32) -> [u8; 32] {
    let mut seed = [0xa5u8; 32];
    seed[0] = index as u8;
    seed
}

fn enc_seed(index: u32) -> [u8; 32] {
    let mut seed = [0x5au8; 32];
    seed[0] = index as u8;
    seed
}

/// Build per-node configs for an `n`-member committee with threshold `t`.
pub fn committee(n: u32, t: u32, session_id: &str) -> Vec<CommitteeConfig> {
    let members: Vec<CommitteeMember> = (1..=n)
        .map(|i| {
            let sig = SigningKey::from_bytes(&sig_seed(i));
            let enc = StaticSecret::from(enc_seed(i));
            CommitteeMember {
                index: i,
                sig_pub: sig.verifying_key().to_bytes().to_vec(),
                enc_pub: X25519Public::from(&enc).to_bytes().to_vec(),
            }
        })
        .collect();
    (1..=n)
        .map(|i| CommitteeConfig {
            session_id: session_id.to_string(),
            epoch: 1,
            n,
            threshold: t,
            self_index: i,
            sig_priv: sig_seed(i).to_vec(),
            enc_priv: enc_seed(i).to_vec(),
            members: members.clone(),
        })
        .collect()
}

/// Deliver every queued broadcast to every session until no session emits
/// anything new. Sessions ignore their own traffic, so echoing the full
/// queue at everyone mirrors the gossip semantics.
pub fn run_to_quiescence(sessions: &mut [DkgSession], mut queue: Vec<DkgGossip>) {
    while let Some(msg) = queue.pop() {
        for session in sessions.iter_mut() {
            queue.extend(session.handle(msg.clone()));
        }
    }
}

/// All opening messages from every session, ready for delivery.
pub fn opening_messages(sessions: &[DkgSession]) -> Vec<DkgGossip> {
    let mut queue = Vec::new();
    for session in sessions {
        queue.extend(session.initial_messages().expect("initial_messages"));
    }
    queue
}
