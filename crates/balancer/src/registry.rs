use crate::{BalancerError, BalancerResult};
use common::{ServerDescriptor, ServerId, ServerStatus};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use tracing::info;

/// Known storage servers and their operator-assigned status
#[derive(Debug, Default)]
pub struct ServerRegistry {
    servers: RwLock<BTreeMap<ServerId, ServerStatus>>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `ids` as active servers
    pub fn with_active(ids: impl IntoIterator<Item = ServerId>) -> Self {
        ids.into_iter().map(ServerDescriptor::active).collect()
    }

    /// Add or replace a server entry
    pub fn register(&self, descriptor: ServerDescriptor) {
        self.servers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(descriptor.server_id, descriptor.status);
    }

    pub fn set_status(&self, server_id: ServerId, status: ServerStatus) -> BalancerResult<()> {
        let mut servers = self.servers.write().unwrap_or_else(PoisonError::into_inner);
        let entry = servers
            .get_mut(&server_id)
            .ok_or(BalancerError::UnknownServer(server_id))?;
        if *entry != status {
            info!(server_id = %server_id, status = ?status, "Server status changed");
        }
        *entry = status;
        Ok(())
    }

    /// Active server ids in ascending order; may be empty
    pub fn active_servers(&self) -> Vec<ServerId> {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, status)| **status == ServerStatus::Active)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn descriptors(&self) -> Vec<ServerDescriptor> {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(&server_id, &status)| ServerDescriptor { server_id, status })
            .collect()
    }
}

impl FromIterator<ServerDescriptor> for ServerRegistry {
    fn from_iter<I: IntoIterator<Item = ServerDescriptor>>(iter: I) -> Self {
        let registry = ServerRegistry::new();
        for descriptor in iter {
            registry.register(descriptor);
        }
        registry
    }
}
