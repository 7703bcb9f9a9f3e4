mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use beast_core::bls::g1_to_bytes;
use beast_core::keystore::KeyStore;
use beast_core::logging;
use beast_core::runner::DkgRunner;
use beast_core::session_store::SessionStore;
use beast_core::transport::InMemoryBus;

#[test]
fn runners_finalize_over_the_bus_and_short_circuit_on_restart() {
    logging::init_tracing(None);

    let n = 3;
    let configs = common::committee(n, 2, "runner-e2e");
    let bus = InMemoryBus::new(n);
    let dir = tempfile::tempdir().expect("tempdir");

    let keystores: Vec<Arc<KeyStore>> = (1..=n)
        .map(|i| Arc::new(KeyStore::new(dir.path().join(format!("keyshare_{i}.dat")))))
        .collect();
    let session_store = Arc::new(SessionStore::new(dir.path().join("sessions")));

    let runners: Vec<DkgRunner> = configs
        .iter()
        .enumerate()
        .map(|(slot, cfg)| {
            DkgRunner::new(
                cfg.clone(),
                Arc::new(bus.endpoint((slot + 1) as u32)),
                Arc::clone(&keystores[slot]),
                Some(Arc::clone(&session_store)),
            )
            .expect("runner")
            .with_timing(Duration::from_millis(50), Duration::from_secs(60))
        })
        .collect();
    for runner in &runners {
        runner.start().expect("start");
    }

    // Pump the bus until every runner finalizes.
    let deadline = Instant::now() + Duration::from_secs(30);
    while !runners.iter().all(DkgRunner::is_done) {
        assert!(Instant::now() < deadline, "dkg did not finalize in time");
        for (slot, runner) in runners.iter().enumerate() {
            for msg in bus.endpoint((slot + 1) as u32).drain_dkg() {
                runner.on_message(msg);
            }
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    let results: Vec<_> = runners
        .iter()
        .map(|r| r.result().expect("result"))
        .collect();
    let pk = g1_to_bytes(&results[0].group_pubkey);
    for result in &results {
        assert_eq!(g1_to_bytes(&result.group_pubkey), pk);
    }
    for runner in &runners {
        runner.stop();
    }

    // A persisted key share short-circuits the next start entirely.
    let fresh_bus = InMemoryBus::new(n);
    let restarted = DkgRunner::new(
        configs[0].clone(),
        Arc::new(fresh_bus.endpoint(1)),
        Arc::clone(&keystores[0]),
        None,
    )
    .expect("restarted runner");
    restarted.start().expect("restart");
    assert!(restarted.is_done());
    let resumed = restarted.result().expect("resumed result");
    assert_eq!(g1_to_bytes(&resumed.group_pubkey), pk);
    assert!(fresh_bus.endpoint(1).drain_dkg().is_empty());
    restarted.stop();
}
