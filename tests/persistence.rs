mod common;

use std::fs::OpenOptions;

use beast_core::dkg::DkgSession;
use beast_core::keystore::{KeyShare, KeyStore};
use beast_core::session_store::{SessionState, SessionStore};
use beast_core::types::Error;

fn truncate_to(path: &std::path::Path, len: u64) {
    let f = OpenOptions::new().write(true).open(path).expect("open");
    f.set_len(len).expect("truncate");
}

fn share(index: u32, fill: u8) -> KeyShare {
    KeyShare {
        index,
        public_key: vec![fill; 48],
        private_key: vec![fill ^ 0xff; 32],
        commitments: None,
    }
}

#[test]
fn keystore_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tss_keyshare.dat");
    let store = KeyStore::new(&path);
    store.save(&share(1, 0x11)).expect("save");
    let loaded = store.load().expect("load");
    assert_eq!(loaded.index, 1);
    assert_eq!(loaded.public_key, vec![0x11; 48]);
    assert_eq!(loaded.private_key, vec![0xee; 32]);
}

#[test]
fn keystore_missing_is_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = KeyStore::new(dir.path().join("absent.dat"));
    assert!(matches!(store.load(), Err(Error::NotFound)));
}

#[test]
fn keystore_truncation_falls_back_to_backup() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tss_keyshare.dat");
    let store = KeyStore::new(&path);
    store.save(&share(1, 0x21)).expect("save v1");
    store.save(&share(1, 0x22)).expect("save v2");

    truncate_to(&path, 8);
    let loaded = store.load().expect("load after truncation");
    // The backup holds the last-but-one successful save.
    assert_eq!(loaded.public_key, vec![0x21; 48]);
}

#[test]
fn keystore_crc_corruption_falls_back_to_backup() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tss_keyshare.dat");
    let store = KeyStore::new(&path);
    store.save(&share(2, 0x31)).expect("save v1");
    store.save(&share(2, 0x32)).expect("save v2");

    // Flip one body byte; the CRC check must reject the main file.
    let mut raw = std::fs::read(&path).expect("read");
    let last = raw.len() - 1;
    raw[last] ^= 0x01;
    std::fs::write(&path, raw).expect("write");

    let loaded = store.load().expect("load after corruption");
    assert_eq!(loaded.public_key, vec![0x31; 48]);
}

#[test]
fn keystore_seals_body_when_encrypted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tss_keyshare.dat");
    let mut key = [0x42u8; 32];
    let store = KeyStore::new_encrypted(&path, &mut key).expect("encrypted store");
    // The construction key buffer is wiped.
    assert_eq!(key, [0u8; 32]);

    let original = share(3, 0x41);
    store.save(&original).expect("save");
    let raw = std::fs::read(&path).expect("read");
    // The private scalar must not appear in the file body.
    assert!(!raw
        .windows(original.private_key.len())
        .any(|w| w == original.private_key.as_slice()));

    let loaded = store.load().expect("load");
    assert_eq!(loaded.private_key, original.private_key);

    // A keyless reader cannot open the sealed body.
    let plain = KeyStore::new(&path);
    assert!(plain.load().is_err());
}

#[test]
fn session_store_fallback_restores_previous_epoch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SessionStore::new(dir.path());

    let v1 = SessionState {
        epoch: 1,
        coeffs: vec![vec![0x01; 32]],
        ..SessionState::default()
    };
    let v2 = SessionState {
        epoch: 2,
        coeffs: vec![vec![0x02; 32]],
        ..SessionState::default()
    };
    store.save("sess", &v1).expect("save v1");
    store.save("sess", &v2).expect("save v2");

    let loaded = store.load("sess").expect("load");
    assert_eq!(loaded.epoch, 2);

    truncate_to(&dir.path().join("beast_dkg_session_sess.dat"), 8);
    let fallback = store.load("sess").expect("fallback load");
    assert_eq!(fallback.epoch, 1);
    assert_eq!(fallback.coeffs, vec![vec![0x01; 32]]);
}

#[test]
fn dkg_session_resumes_from_persisted_snapshot() {
    let configs = common::committee(3, 2, "resume");
    let mut session = DkgSession::new(configs[0].clone()).expect("session");
    let peer = DkgSession::new(configs[1].clone()).expect("peer");
    for msg in peer.initial_messages().expect("peer messages") {
        session.handle(msg);
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let store = SessionStore::new(dir.path());
    let snapshot = session.snapshot();
    store.save("resume", &snapshot).expect("save");

    let mut resumed = DkgSession::new(configs[0].clone()).expect("fresh session");
    resumed
        .restore(store.load("resume").expect("load"))
        .expect("restore");
    // The restored session kept its polynomial and the peer's dealing.
    let restored = resumed.snapshot();
    assert_eq!(restored.epoch, snapshot.epoch);
    assert_eq!(restored.coeffs, snapshot.coeffs);
    assert_eq!(restored.self_commitments, snapshot.self_commitments);
    assert_eq!(restored.commitments, snapshot.commitments);
    assert_eq!(restored.shares, snapshot.shares);
    assert_eq!(restored.acks, snapshot.acks);
}

#[test]
fn session_store_missing_is_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SessionStore::new(dir.path());
    assert!(matches!(store.load("nope"), Err(Error::NotFound)));
}
