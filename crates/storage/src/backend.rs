use crate::{
    ClientError, ClientPool, ClientResult, FilesystemStorageClient, Latency, MemoryStorageClient,
    StorageClient,
};
use common::ServerId;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Storage client transport
pub enum StorageBackend {
    /// Simulated servers held in process memory
    Memory { latency: Option<Latency> },
    /// One directory per server under the given data directory
    Filesystem(PathBuf),
}

impl StorageBackend {
    /// Build one client per server id
    pub async fn initialize(self, server_ids: &[ServerId]) -> ClientResult<ClientPool> {
        let mut pool = ClientPool::new();
        match self {
            StorageBackend::Memory { latency } => {
                for &server_id in server_ids {
                    let mut client = MemoryStorageClient::new(server_id);
                    if let Some(latency) = latency {
                        client = client.with_latency(latency);
                    }
                    pool.insert(Arc::new(client) as Arc<dyn StorageClient>);
                }
                info!(servers = server_ids.len(), "In-memory storage clients initialized");
            }
            StorageBackend::Filesystem(data_dir) => {
                for &server_id in server_ids {
                    let client = FilesystemStorageClient::new(&data_dir, server_id);
                    tokio::fs::create_dir_all(client.server_dir())
                        .await
                        .map_err(|source| ClientError::Io { server_id, source })?;
                    pool.insert(Arc::new(client) as Arc<dyn StorageClient>);
                }
                info!(
                    servers = server_ids.len(),
                    data_dir = ?data_dir,
                    "Filesystem storage clients initialized"
                );
            }
        }
        Ok(pool)
    }
}
