use std::sync::Arc;

use todadot_engine::EngineError;

use crate::TestPeer;
use crate::remote::InMemoryRemoteStore;

/// Several devices sharing one remote store.
pub struct TestCloud {
    remote: Arc<InMemoryRemoteStore>,
    peers: Vec<TestPeer>,
}

impl Default for TestCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl TestCloud {
    pub fn new() -> Self {
        Self {
            remote: Arc::new(InMemoryRemoteStore::new()),
            peers: Vec::new(),
        }
    }

    pub fn remote(&self) -> &Arc<InMemoryRemoteStore> {
        &self.remote
    }

    pub fn add_peer(&mut self) -> Result<usize, EngineError> {
        let peer = TestPeer::new(Arc::clone(&self.remote))?;
        let index = self.peers.len();
        self.peers.push(peer);
        Ok(index)
    }

    pub fn peer(&self, index: usize) -> &TestPeer {
        &self.peers[index]
    }

    pub fn peer_mut(&mut self, index: usize) -> &mut TestPeer {
        &mut self.peers[index]
    }

    pub async fn drain_all(&self) {
        for peer in &self.peers {
            peer.drain().await;
        }
    }
}
