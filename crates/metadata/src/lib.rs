pub mod audit;
pub mod backend;
pub mod database;
pub mod error;
pub mod json;
pub mod memory;
pub mod retry;
mod state;

use async_trait::async_trait;
use common::{
    ChunkRecord, FileId, FileRecord, NewChunk, NewFile, PermissionRecord, PermissionType,
    ServerId, UserId, UserRecord,
};
use std::collections::BTreeMap;

pub use audit::{AuditLog, JsonlAuditLog};
pub use backend::{Metadata, MetadataBackend};
pub use database::DatabaseMetadataStore;
pub use error::{MetadataError, MetadataResult};
pub use json::JsonMetadataStore;
pub use memory::MemoryMetadataStore;
pub use retry::DatabaseRetryConfig;

/// Durable record of users, files, chunk locations and permissions
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Create or rename a user
    async fn register_user(&self, user: UserRecord) -> MetadataResult<()>;

    async fn user_exists(&self, user_id: UserId) -> MetadataResult<bool>;

    /// Insert a file record; the store assigns `file_id` and `created_at`.
    /// Fails with `Constraint` when the owner is unknown.
    async fn insert_file(&self, file: NewFile) -> MetadataResult<FileRecord>;

    async fn get_file(&self, file_id: FileId) -> MetadataResult<Option<FileRecord>>;

    /// Remove a file record together with any permissions on it.
    /// Fails with `NotFound` when there is no such file.
    async fn delete_file(&self, file_id: FileId) -> MetadataResult<()>;

    /// Record a stored chunk. A second record for the same
    /// `(file_id, chunk_number)` is a `Conflict`.
    async fn insert_chunk(&self, chunk: NewChunk) -> MetadataResult<ChunkRecord>;

    /// All chunk records of a file ordered by chunk number
    async fn list_chunks(&self, file_id: FileId) -> MetadataResult<Vec<ChunkRecord>>;

    /// Remove all chunk records of a file, returning how many were removed
    async fn delete_chunks(&self, file_id: FileId) -> MetadataResult<u64>;

    /// Number of chunk records per server across all files.
    /// Servers holding no chunks are absent.
    async fn chunk_counts(&self) -> MetadataResult<BTreeMap<ServerId, u64>>;

    async fn get_owner(&self, file_id: FileId) -> MetadataResult<Option<UserId>>;

    async fn permission_exists(&self, file_id: FileId, user_id: UserId) -> MetadataResult<bool>;

    /// At most one permission per `(file_id, user_id)`; a second one is a `Conflict`
    async fn insert_permission(&self, permission: PermissionRecord) -> MetadataResult<()>;

    async fn list_permissions(&self, file_id: FileId) -> MetadataResult<Vec<PermissionRecord>>;

    async fn list_owned_files(&self, owner_id: UserId) -> MetadataResult<Vec<FileRecord>>;

    /// Files shared with `user_id` and the permission granted on each
    async fn list_shared_files(
        &self,
        user_id: UserId,
    ) -> MetadataResult<Vec<(FileRecord, PermissionType)>>;
}
