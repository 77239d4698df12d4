//! Orchestrator error types.

use balancer::BalancerError;
use chunk_codec::CodecError;
use common::{FileId, ServerId, UserId};
use metadata::MetadataError;
use storage::ClientError;
use thiserror::Error;

/// Terminal failure of an orchestrator operation
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("metadata store error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("no active storage server available")]
    NoServerAvailable,

    #[error("failed to store chunk {chunk_number} on server {server_id}: {source}")]
    ChunkStore {
        chunk_number: u32,
        server_id: ServerId,
        #[source]
        source: ClientError,
    },

    #[error("failed to retrieve chunk {chunk_number} from server {server_id}: {source}")]
    ChunkRetrieval {
        chunk_number: u32,
        server_id: ServerId,
        #[source]
        source: ClientError,
    },

    #[error("failed to delete chunks of file {file_id} on server {server_id}: {source}")]
    ChunkDelete {
        file_id: FileId,
        server_id: ServerId,
        #[source]
        source: ClientError,
    },

    #[error("integrity check failed for file {file_id}: {reason}")]
    Integrity { file_id: FileId, reason: String },

    #[error("user {requester} is not allowed to share file {file_id}")]
    PermissionDenied { file_id: FileId, requester: UserId },

    #[error("user {0} does not exist")]
    UnknownUser(UserId),

    #[error("file {file_id} is already shared with user {user_id}")]
    DuplicateShare { file_id: FileId, user_id: UserId },

    #[error("no chunks found for file {0}")]
    NoChunksFound(FileId),

    #[error("file of {size_bytes} bytes needs more than {max_chunks} chunks")]
    FileTooLarge { size_bytes: u64, max_chunks: u64 },

    #[error("failed to read upload source: {0}")]
    SourceRead(#[source] CodecError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BalancerError> for OrchestratorError {
    fn from(_: BalancerError) -> Self {
        // Selection only fails when the active set is empty
        OrchestratorError::NoServerAvailable
    }
}

/// Result type for orchestrator operations.
pub type OrchestratorResult<T> = std::result::Result<T, OrchestratorError>;
