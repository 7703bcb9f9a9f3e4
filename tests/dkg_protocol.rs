mod common;

use beast_core::bls::{g1_from_bytes, g1_to_bytes, Fr, G1};
use beast_core::bte;
use beast_core::dkg::{
    commitments_from_poly, eval_poly, verify_feldman_share, DkgMessageKind, DkgSession,
};
use common::{committee, opening_messages, run_to_quiescence};
use ff::Field;
use group::Group;
use rand_core::SeedableRng;

fn sessions_for(configs: Vec<beast_core::CommitteeConfig>) -> Vec<DkgSession> {
    configs
        .into_iter()
        .map(|cfg| DkgSession::new(cfg).expect("session"))
        .collect()
}

/// Threshold-decrypt a random scalar with the given result shares; proves the
/// shares interpolate to the secret behind the group public key.
fn assert_shares_open_group_key(pk: &G1, shares: &[(u32, Fr)], t: usize) {
    let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(99);
    let k = Fr::random(&mut rng);
    let ct = bte::encrypt_key(pk, &k, &mut rng);
    let partials: Vec<_> = shares
        .iter()
        .map(|(i, s)| bte::partial_decrypt(&ct, s, *i).expect("partial"))
        .collect();
    let got = bte::combine(&ct, &partials, t).expect("combine");
    assert_eq!(g1_to_bytes(&got), g1_to_bytes(&(G1::generator() * k)));
}

#[test]
fn four_of_four_no_faults_agree_on_group_key() {
    let mut sessions = sessions_for(committee(4, 4, "dkg-s4"));
    let queue = opening_messages(&sessions);
    run_to_quiescence(&mut sessions, queue);

    let results: Vec<_> = sessions
        .iter()
        .map(|s| s.result().expect("finalized").clone())
        .collect();
    let pk = results[0].group_pubkey;
    for r in &results {
        assert_eq!(g1_to_bytes(&r.group_pubkey), g1_to_bytes(&pk));
    }
    let shares: Vec<(u32, Fr)> = results.iter().map(|r| (r.index, r.share)).collect();
    assert_shares_open_group_key(&pk, &shares, 4);
}

#[test]
fn complaint_and_open_recover_unreadable_shares() {
    // Node 2 cannot decrypt sealed shares (its X25519 secret does not match
    // the registered public key), so every dealing involving it resolves
    // through complaint + share_open.
    let mut configs = committee(4, 4, "dkg-s5");
    configs[1].enc_priv = vec![0x77u8; 32];
    let mut sessions = sessions_for(configs);
    let queue = opening_messages(&sessions);
    run_to_quiescence(&mut sessions, queue);

    let results: Vec<_> = sessions
        .iter()
        .map(|s| s.result().expect("finalized").clone())
        .collect();
    let pk = results[0].group_pubkey;
    for r in &results {
        assert_eq!(g1_to_bytes(&r.group_pubkey), g1_to_bytes(&pk));
    }
    let shares: Vec<(u32, Fr)> = results.iter().map(|r| (r.index, r.share)).collect();
    assert_shares_open_group_key(&pk, &shares, 4);
}

#[test]
fn inconsistent_dealer_is_disqualified() {
    // Dealer 1 commits to one polynomial but deals shares from another: its
    // commitments come from a twin session over the same config.
    let configs = committee(4, 3, "dkg-s6");
    let twin = DkgSession::new(configs[0].clone()).expect("twin session");
    let mut sessions = sessions_for(configs);

    let mut queue = Vec::new();
    for (slot, session) in sessions.iter().enumerate() {
        for msg in session.initial_messages().expect("initial_messages") {
            // Replace dealer 1's commitments with the twin's.
            if slot == 0 && msg.kind == DkgMessageKind::Commitments {
                continue;
            }
            queue.push(msg);
        }
    }
    for msg in twin.initial_messages().expect("twin messages") {
        if msg.kind == DkgMessageKind::Commitments {
            queue.push(msg);
        }
    }
    run_to_quiescence(&mut sessions, queue);

    let honest: Vec<_> = sessions[1..]
        .iter()
        .map(|s| s.result().expect("finalized").clone())
        .collect();
    let pk = honest[0].group_pubkey;
    for r in &honest {
        assert_eq!(g1_to_bytes(&r.group_pubkey), g1_to_bytes(&pk));
    }
    for session in &sessions[1..] {
        assert_eq!(session.snapshot().bad_dealers, vec![1]);
    }

    // QUAL is {2,3,4}: the agreed key equals the sum of those dealers'
    // constant-term commitments.
    let snapshot = sessions[1].snapshot();
    let mut expected = G1::identity();
    for dealer in [2u32, 3, 4] {
        expected += g1_from_bytes(&snapshot.commitments[&dealer][0]).expect("commitment");
    }
    assert_eq!(g1_to_bytes(&pk), g1_to_bytes(&expected));

    let shares: Vec<(u32, Fr)> = honest.iter().map(|r| (r.index, r.share)).collect();
    assert_shares_open_group_key(&pk, &shares, 3);
}

#[test]
fn feldman_check_rejects_tampered_shares() {
    let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(42);
    let coeffs: Vec<Fr> = (0..3).map(|_| Fr::random(&mut rng)).collect();
    let commitments = commitments_from_poly(&coeffs);
    for index in 1u32..=5 {
        let share = eval_poly(&coeffs, &Fr::from(u64::from(index)));
        assert!(verify_feldman_share(&share, index, &commitments).expect("verify"));
        let tampered = share + Fr::ONE;
        assert!(!verify_feldman_share(&tampered, index, &commitments).expect("verify"));
        // A share valid for one index does not verify at another.
        assert!(!verify_feldman_share(&share, index + 1, &commitments).expect("verify"));
    }
}

#[test]
fn replayed_messages_leave_state_unchanged() {
    let mut sessions = sessions_for(committee(3, 2, "dkg-replay"));
    let queue = opening_messages(&sessions);
    let replay = queue.clone();
    run_to_quiescence(&mut sessions, queue);

    let before: Vec<String> = sessions
        .iter()
        .map(|s| serde_json::to_string(&s.snapshot()).expect("snapshot json"))
        .collect();
    run_to_quiescence(&mut sessions, replay);
    let after: Vec<String> = sessions
        .iter()
        .map(|s| serde_json::to_string(&s.snapshot()).expect("snapshot json"))
        .collect();
    assert_eq!(before, after);
}

#[test]
fn higher_remote_epoch_resets_state() {
    let mut configs = committee(3, 2, "dkg-epoch");
    configs[1].epoch = 5;
    let mut laggard = DkgSession::new(configs[0].clone()).expect("laggard");
    let remote = DkgSession::new(configs[1].clone()).expect("remote");

    assert_eq!(laggard.epoch(), 1);
    let remote_msgs = remote.initial_messages().expect("remote messages");
    let out = laggard.handle(remote_msgs[0].clone());
    assert_eq!(laggard.epoch(), 5);
    // The reset session rebroadcasts its own dealing at the adopted epoch.
    assert!(out.iter().all(|m| m.epoch == 5));
    assert!(out
        .iter()
        .any(|m| m.kind == DkgMessageKind::Commitments && m.from_index == 1));
    // Prior dealings were wiped: only the self dealing plus the remote
    // commitments that triggered the bump remain.
    let snapshot = laggard.snapshot();
    assert_eq!(snapshot.epoch, 5);
    assert!(snapshot.commitments.keys().all(|d| *d == 1 || *d == 2));

    // Lower-epoch traffic is discarded outright.
    let stale = DkgSession::new(committee(3, 2, "dkg-epoch")[2].clone()).expect("stale");
    let stale_msgs = stale.initial_messages().expect("stale messages");
    let out = laggard.handle(stale_msgs[0].clone());
    assert!(out.is_empty());
    assert_eq!(laggard.epoch(), 5);
}

#[test]
fn bad_signatures_are_dropped_and_counted() {
    let mut sessions = sessions_for(committee(3, 2, "dkg-sig"));
    let msgs = sessions[1].initial_messages().expect("messages");
    let mut forged = msgs[0].clone();
    forged.sig[0] ^= 0x01;

    let before = serde_json::to_string(&sessions[0].snapshot()).expect("snapshot");
    let out = sessions[0].handle(forged);
    assert!(out.is_empty());
    assert_eq!(sessions[0].dropped_bad_sig(), 1);
    let after = serde_json::to_string(&sessions[0].snapshot()).expect("snapshot");
    assert_eq!(before, after);
}

#[test]
fn finished_session_refuses_higher_epochs() {
    let mut sessions = sessions_for(committee(3, 2, "dkg-done"));
    let queue = opening_messages(&sessions);
    run_to_quiescence(&mut sessions, queue);
    assert!(sessions.iter().all(|s| s.is_done()));

    let pk_before = g1_to_bytes(&sessions[0].result().expect("result").group_pubkey);
    let mut late_cfg = committee(3, 2, "dkg-done")[1].clone();
    late_cfg.epoch = 9;
    let late = DkgSession::new(late_cfg).expect("late session");
    let late_msgs = late.initial_messages().expect("late messages");
    let out = sessions[0].handle(late_msgs[0].clone());
    assert!(out.is_empty());
    assert_eq!(sessions[0].epoch(), 1);
    assert_eq!(
        g1_to_bytes(&sessions[0].result().expect("result").group_pubkey),
        pk_before
    );
}
