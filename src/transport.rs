//! Gossip seams for DKG messages and per-height decrypt shares.
//!
//! The core only needs an authenticated broadcast; the embedding node wires
//! its own pubsub behind these traits. An in-memory bus with per-node
//! inboxes backs the tests and examples.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::dkg::DkgGossip;
use crate::types::{BlockHeight, Error, MemberIndex};

/// Per-height decryption share. For batched flows `share` is a compressed G1
/// partial decrypt (48 bytes); 96-byte values exist on the wire only as a
/// legacy shape and are rejected by the batched collector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareGossip {
    pub height: BlockHeight,
    pub index: MemberIndex,
    pub share: Vec<u8>,
}

/// Broadcast seam for DKG messages.
pub trait DkgBroadcast: Send + Sync {
    fn broadcast(&self, msg: DkgGossip) -> Result<(), Error>;
}

/// Publish seam for decrypt shares.
pub trait SharePublisher: Send + Sync {
    fn publish(&self, msg: ShareGossip) -> Result<(), Error>;
}

struct BusInner {
    dkg: Vec<VecDeque<DkgGossip>>,
    shares: Vec<VecDeque<ShareGossip>>,
}

/// In-memory bus for tests: every broadcast lands in every node's inbox
/// (including the sender's; sessions drop their own traffic).
pub struct InMemoryBus {
    n: u32,
    inner: Mutex<BusInner>,
}

impl InMemoryBus {
    /// Create a bus for `n` nodes (indices 1..=n).
    pub fn new(n: u32) -> Arc<Self> {
        let inner = BusInner {
            dkg: (0..n).map(|_| VecDeque::new()).collect(),
            shares: (0..n).map(|_| VecDeque::new()).collect(),
        };
        Arc::new(Self {
            n,
            inner: Mutex::new(inner),
        })
    }

    /// Endpoint bound to one node's inboxes.
    pub fn endpoint(self: &Arc<Self>, node: MemberIndex) -> BusEndpoint {
        BusEndpoint {
            bus: Arc::clone(self),
            node,
        }
    }

    fn slot(&self, node: MemberIndex) -> Result<usize, Error> {
        if node == 0 || node > self.n {
            return Err(Error::Invalid);
        }
        Ok((node - 1) as usize)
    }
}

#[derive(Clone)]
pub struct BusEndpoint {
    bus: Arc<InMemoryBus>,
    node: MemberIndex,
}

impl BusEndpoint {
    /// Drain all pending DKG messages for this node.
    pub fn drain_dkg(&self) -> Vec<DkgGossip> {
        let slot = match self.bus.slot(self.node) {
            Ok(slot) => slot,
            Err(_) => return Vec::new(),
        };
        let mut inner = self.bus.inner.lock().expect("bus lock poisoned");
        inner.dkg[slot].drain(..).collect()
    }

    /// Drain all pending decrypt shares for this node.
    pub fn drain_shares(&self) -> Vec<ShareGossip> {
        let slot = match self.bus.slot(self.node) {
            Ok(slot) => slot,
            Err(_) => return Vec::new(),
        };
        let mut inner = self.bus.inner.lock().expect("bus lock poisoned");
        inner.shares[slot].drain(..).collect()
    }
}

impl DkgBroadcast for BusEndpoint {
    fn broadcast(&self, msg: DkgGossip) -> Result<(), Error> {
        let mut inner = self.bus.inner.lock().expect("bus lock poisoned");
        for inbox in inner.dkg.iter_mut() {
            inbox.push_back(msg.clone());
        }
        Ok(())
    }
}

impl SharePublisher for BusEndpoint {
    fn publish(&self, msg: ShareGossip) -> Result<(), Error> {
        let mut inner = self.bus.inner.lock().expect("bus lock poisoned");
        for inbox in inner.shares.iter_mut() {
            inbox.push_back(msg.clone());
        }
        Ok(())
    }
}
