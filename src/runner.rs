//! Threaded driver around the sans-io DKG session.
//!
//! Three concerns per node: the inbound handler (called by the embedding
//! transport), a retry ticker that rebroadcasts commitments and unacked
//! shares, and a watchdog that bumps the epoch when it stalls. All three
//! meet at the session's single mutex and release it before any network or
//! file I/O. A persisted key share short-circuits the whole protocol at
//! start; session snapshots make a restart resume mid-epoch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::bls::{g1_to_bytes, scalar_to_bytes};
use crate::committee::CommitteeConfig;
use crate::dkg::{DkgGossip, DkgResult, DkgSession, DEFAULT_EPOCH_TIMEOUT, DEFAULT_RETRY_INTERVAL};
use crate::keystore::{KeyShare, KeyStore};
use crate::session_store::SessionStore;
use crate::transport::DkgBroadcast;
use crate::types::Error;

const POLL_SLICE: Duration = Duration::from_millis(25);

pub struct DkgRunner {
    session: Arc<Mutex<DkgSession>>,
    transport: Arc<dyn DkgBroadcast>,
    keystore: Arc<KeyStore>,
    session_store: Option<Arc<SessionStore>>,
    session_id: String,
    retry_interval: Duration,
    epoch_timeout: Duration,
    cancel: Arc<AtomicBool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl DkgRunner {
    pub fn new(
        cfg: CommitteeConfig,
        transport: Arc<dyn DkgBroadcast>,
        keystore: Arc<KeyStore>,
        session_store: Option<Arc<SessionStore>>,
    ) -> Result<Self, Error> {
        let session_id = cfg.session_id.clone();
        let session = DkgSession::new(cfg)?;
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            transport,
            keystore,
            session_store,
            session_id,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            epoch_timeout: DEFAULT_EPOCH_TIMEOUT,
            cancel: Arc::new(AtomicBool::new(false)),
            handles: Mutex::new(Vec::new()),
        })
    }

    pub fn with_timing(mut self, retry_interval: Duration, epoch_timeout: Duration) -> Self {
        self.retry_interval = retry_interval;
        self.epoch_timeout = epoch_timeout;
        self
    }

    /// Begin the protocol: short-circuit on an existing key share, resume a
    /// persisted session if one exists, broadcast the opening messages and
    /// spawn the retry and watchdog loops.
    pub fn start(&self) -> Result<(), Error> {
        if let Ok(share) = self.keystore.load() {
            if share.private_key.len() == 32 {
                let restored = {
                    let mut session = self.session.lock().expect("dkg session lock poisoned");
                    session
                        .install_result(&share.public_key, &share.private_key)
                        .is_ok()
                };
                if restored {
                    tracing::info!("dkg skipped: key share already persisted");
                    return Ok(());
                }
            }
        }
        if let Some(store) = &self.session_store {
            if let Ok(state) = store.load(&self.session_id) {
                let mut session = self.session.lock().expect("dkg session lock poisoned");
                match session.restore(state) {
                    Ok(()) => tracing::info!("dkg session resumed"),
                    Err(err) => tracing::warn!(%err, "dkg session resume failed; starting fresh"),
                }
            }
        }

        let out = {
            let session = self.session.lock().expect("dkg session lock poisoned");
            if session.is_done() {
                Vec::new()
            } else {
                session.initial_messages()?
            }
        };
        self.send_all(out);
        self.persist_snapshot();

        self.spawn_retry_loop();
        self.spawn_watchdog();
        Ok(())
    }

    /// Inbound gossip entry point; the embedding transport calls this from
    /// its receive loop.
    pub fn on_message(&self, msg: DkgGossip) {
        let (out, finalized) = {
            let mut session = self.session.lock().expect("dkg session lock poisoned");
            let was_done = session.is_done();
            let out = session.handle(msg);
            let finalized = if !was_done && session.is_done() {
                session.result().cloned()
            } else {
                None
            };
            (out, finalized)
        };
        // Lock released; now do I/O.
        self.persist_snapshot();
        if let Some(result) = finalized {
            self.persist_result(&result);
        }
        self.send_all(out);
    }

    pub fn result(&self) -> Option<DkgResult> {
        self.session
            .lock()
            .expect("dkg session lock poisoned")
            .result()
            .cloned()
    }

    pub fn is_done(&self) -> bool {
        self.session
            .lock()
            .expect("dkg session lock poisoned")
            .is_done()
    }

    /// Signal all loops to unwind and wait for them.
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        let mut handles = self.handles.lock().expect("runner handles lock poisoned");
        for handle in handles.drain(..) {
            let _ = handle.join();
        }
    }

    fn spawn_retry_loop(&self) {
        let session = Arc::clone(&self.session);
        let transport = Arc::clone(&self.transport);
        let cancel = Arc::clone(&self.cancel);
        let interval = self.retry_interval;
        let handle = std::thread::spawn(move || {
            let mut last = Instant::now();
            loop {
                if cancel.load(Ordering::SeqCst) {
                    return;
                }
                std::thread::sleep(POLL_SLICE);
                if last.elapsed() < interval {
                    continue;
                }
                last = Instant::now();
                let out = {
                    let session = session.lock().expect("dkg session lock poisoned");
                    if session.is_done() {
                        return;
                    }
                    session.retry_messages().unwrap_or_default()
                };
                for msg in out {
                    if let Err(err) = transport.broadcast(msg) {
                        tracing::debug!(%err, "dkg retry broadcast failed");
                    }
                }
            }
        });
        self.handles
            .lock()
            .expect("runner handles lock poisoned")
            .push(handle);
    }

    fn spawn_watchdog(&self) {
        let session = Arc::clone(&self.session);
        let transport = Arc::clone(&self.transport);
        let cancel = Arc::clone(&self.cancel);
        let timeout = self.epoch_timeout;
        let handle = std::thread::spawn(move || loop {
            if cancel.load(Ordering::SeqCst) {
                return;
            }
            std::thread::sleep(POLL_SLICE);
            let out = {
                let mut session = session.lock().expect("dkg session lock poisoned");
                if session.is_done() {
                    return;
                }
                session.check_epoch_timeout(timeout)
            };
            if let Some(msgs) = out {
                for msg in msgs {
                    if let Err(err) = transport.broadcast(msg) {
                        tracing::debug!(%err, "dkg epoch rebroadcast failed");
                    }
                }
            }
        });
        self.handles
            .lock()
            .expect("runner handles lock poisoned")
            .push(handle);
    }

    fn send_all(&self, out: Vec<DkgGossip>) {
        for msg in out {
            if let Err(err) = self.transport.broadcast(msg) {
                tracing::debug!(%err, "dkg broadcast failed");
            }
        }
    }

    fn persist_snapshot(&self) {
        let Some(store) = &self.session_store else {
            return;
        };
        let state = {
            let session = self.session.lock().expect("dkg session lock poisoned");
            session.snapshot()
        };
        if let Err(err) = store.save(&self.session_id, &state) {
            tracing::warn!(%err, "dkg session persist failed");
        }
    }

    fn persist_result(&self, result: &DkgResult) {
        let share = KeyShare {
            index: result.index,
            public_key: g1_to_bytes(&result.group_pubkey).to_vec(),
            private_key: scalar_to_bytes(&result.share).to_vec(),
            commitments: None,
        };
        if let Err(err) = self.keystore.save(&share) {
            // Losing the key share is the one fatal persistence failure.
            tracing::error!(%err, "key share persist failed");
        }
    }
}

impl Drop for DkgRunner {
    fn drop(&mut self) {
        self.stop();
    }
}
