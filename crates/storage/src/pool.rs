use crate::{ClientError, ClientResult, StorageClient};
use common::ServerId;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Storage clients keyed by the server they talk to
#[derive(Clone, Default)]
pub struct ClientPool {
    clients: BTreeMap<ServerId, Arc<dyn StorageClient>>,
}

impl ClientPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client under its own server id, replacing any previous one
    pub fn insert(&mut self, client: Arc<dyn StorageClient>) {
        self.clients.insert(client.server_id(), client);
    }

    pub fn get(&self, server_id: ServerId) -> ClientResult<Arc<dyn StorageClient>> {
        self.clients
            .get(&server_id)
            .cloned()
            .ok_or(ClientError::UnknownServer(server_id))
    }

    pub fn server_ids(&self) -> Vec<ServerId> {
        self.clients.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl FromIterator<Arc<dyn StorageClient>> for ClientPool {
    fn from_iter<I: IntoIterator<Item = Arc<dyn StorageClient>>>(iter: I) -> Self {
        let mut pool = ClientPool::new();
        for client in iter {
            pool.insert(client);
        }
        pool
    }
}
