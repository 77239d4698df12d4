//! Storage client error types.

use common::{FileId, ServerId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("chunk {chunk_number} of file {file_id} not found on server {server_id}")]
    ChunkNotFound {
        server_id: ServerId,
        file_id: FileId,
        chunk_number: u32,
    },

    #[error("no chunks of file {file_id} held by server {server_id}")]
    FileNotFound { server_id: ServerId, file_id: FileId },

    #[error("server {0} is unavailable")]
    Unavailable(ServerId),

    #[error("no storage client configured for server {0}")]
    UnknownServer(ServerId),

    #[error("I/O error on server {server_id}: {source}")]
    Io {
        server_id: ServerId,
        #[source]
        source: std::io::Error,
    },

    #[error("internal storage error: {0}")]
    Internal(String),
}

impl ClientError {
    /// The addressed chunk or file is simply not there
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ClientError::ChunkNotFound { .. } | ClientError::FileNotFound { .. }
        )
    }
}

/// Result type for storage client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;
