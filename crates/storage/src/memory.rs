//! In-memory storage client that simulates a remote server

use crate::{ChunkWrite, ClientError, ClientResult, StorageClient, StoredChunk};
use async_trait::async_trait;
use common::{FileId, ServerId};
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::debug;

/// Simulated network latency, drawn uniformly from `min..=max` for every call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Latency {
    pub min: Duration,
    pub max: Duration,
}

impl Latency {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    pub fn between(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let min = self.min.as_micros() as u64;
        let max = self.max.as_micros() as u64;
        Duration::from_micros(rand::thread_rng().gen_range(min..=max))
    }
}

type FileChunks = HashMap<FileId, BTreeMap<u32, StoredChunk>>;

/// Keeps one server's chunks in a keyed map guarded by a lock.
/// Operations on different keys never interfere; the same key is last-writer-wins.
pub struct MemoryStorageClient {
    server_id: ServerId,
    chunks: RwLock<FileChunks>,
    latency: Option<Latency>,
    available: AtomicBool,
}

impl MemoryStorageClient {
    pub fn new(server_id: ServerId) -> Self {
        Self {
            server_id,
            chunks: RwLock::new(HashMap::new()),
            latency: None,
            available: AtomicBool::new(true),
        }
    }

    pub fn with_latency(mut self, latency: Latency) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Take the simulated server offline (or bring it back); while offline every call fails
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Total number of chunks held, across all files
    pub fn chunk_count(&self) -> usize {
        self.read()
            .map(|chunks| chunks.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }

    /// Chunk numbers of `file_id` held by this server, ascending
    pub fn chunk_numbers(&self, file_id: FileId) -> Vec<u32> {
        self.read()
            .ok()
            .and_then(|chunks| chunks.get(&file_id).map(|c| c.keys().copied().collect()))
            .unwrap_or_default()
    }

    async fn simulate_call(&self) -> ClientResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency.sample()).await;
        }
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ClientError::Unavailable(self.server_id))
        }
    }

    fn read(&self) -> ClientResult<RwLockReadGuard<'_, FileChunks>> {
        self.chunks
            .read()
            .map_err(|_| ClientError::Internal(format!("chunk map of server {} poisoned", self.server_id)))
    }

    fn write(&self) -> ClientResult<RwLockWriteGuard<'_, FileChunks>> {
        self.chunks
            .write()
            .map_err(|_| ClientError::Internal(format!("chunk map of server {} poisoned", self.server_id)))
    }
}

#[async_trait]
impl StorageClient for MemoryStorageClient {
    fn server_id(&self) -> ServerId {
        self.server_id
    }

    async fn store(&self, chunk: ChunkWrite<'_>) -> ClientResult<()> {
        self.simulate_call().await?;
        let stored = StoredChunk {
            payload: chunk.payload.to_vec(),
            checksum: chunk.checksum.to_string(),
        };
        self.write()?
            .entry(chunk.file_id)
            .or_default()
            .insert(chunk.chunk_number, stored);
        debug!(
            server_id = %self.server_id,
            file_id = %chunk.file_id,
            chunk_number = chunk.chunk_number,
            bytes = chunk.payload.len(),
            "Stored chunk"
        );
        Ok(())
    }

    async fn retrieve(&self, file_id: FileId, chunk_number: u32) -> ClientResult<StoredChunk> {
        self.simulate_call().await?;
        self.read()?
            .get(&file_id)
            .and_then(|chunks| chunks.get(&chunk_number))
            .cloned()
            .ok_or(ClientError::ChunkNotFound {
                server_id: self.server_id,
                file_id,
                chunk_number,
            })
    }

    async fn delete(&self, file_id: FileId, chunk_number: u32) -> ClientResult<()> {
        self.simulate_call().await?;
        let mut chunks = self.write()?;
        let removed = chunks
            .get_mut(&file_id)
            .and_then(|file_chunks| file_chunks.remove(&chunk_number));
        if chunks.get(&file_id).is_some_and(BTreeMap::is_empty) {
            chunks.remove(&file_id);
        }
        match removed {
            Some(_) => Ok(()),
            None => Err(ClientError::ChunkNotFound {
                server_id: self.server_id,
                file_id,
                chunk_number,
            }),
        }
    }

    async fn clear_file(&self, file_id: FileId) -> ClientResult<()> {
        self.simulate_call().await?;
        match self.write()?.remove(&file_id) {
            Some(removed) => {
                debug!(
                    server_id = %self.server_id,
                    file_id = %file_id,
                    chunks = removed.len(),
                    "Cleared file chunks"
                );
                Ok(())
            }
            None => Err(ClientError::FileNotFound {
                server_id: self.server_id,
                file_id,
            }),
        }
    }
}
