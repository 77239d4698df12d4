pub mod backend;
pub mod error;
pub mod filesystem;
pub mod memory;
pub mod pool;

use async_trait::async_trait;
use common::{FileId, ServerId};

pub use backend::StorageBackend;
pub use error::{ClientError, ClientResult};
pub use filesystem::FilesystemStorageClient;
pub use memory::{Latency, MemoryStorageClient};
pub use pool::ClientPool;

/// A chunk on its way to a server
#[derive(Clone, Copy, Debug)]
pub struct ChunkWrite<'a> {
    pub file_id: FileId,
    pub chunk_number: u32,
    pub server_id: ServerId,
    pub payload: &'a [u8],
    pub checksum: &'a str,
}

/// A chunk as held by a server: the payload and the checksum it was stored with
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredChunk {
    pub payload: Vec<u8>,
    pub checksum: String,
}

/// Handle to one storage server.
///
/// Chunks are addressed by `(file_id, chunk_number)` alone, so a repeated
/// `store` for the same key overwrites (last writer wins) and retries stay
/// safe even when an earlier attempt partially succeeded. Implementations may
/// be slow or fail transiently; callers decide whether to retry.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Server this client talks to
    fn server_id(&self) -> ServerId;

    /// Store (or overwrite) one chunk
    async fn store(&self, chunk: ChunkWrite<'_>) -> ClientResult<()>;

    /// Fetch one chunk; `ChunkNotFound` if absent
    async fn retrieve(&self, file_id: FileId, chunk_number: u32) -> ClientResult<StoredChunk>;

    /// Remove one chunk; `ChunkNotFound` if absent
    async fn delete(&self, file_id: FileId, chunk_number: u32) -> ClientResult<()>;

    /// Remove every chunk of a file held by this server; `FileNotFound` if it holds none
    async fn clear_file(&self, file_id: FileId) -> ClientResult<()>;
}
