//! PostgreSQL metadata store

pub mod queries;
pub mod schema;

use crate::{DatabaseRetryConfig, MetadataError, MetadataResult, MetadataStore};
use async_trait::async_trait;
use common::{
    ChunkRecord, FileId, FileRecord, NewChunk, NewFile, PermissionRecord, PermissionType,
    ServerId, UserId, UserRecord,
};
use queries::Queries;
use std::collections::BTreeMap;
use schema::Schema;
use sqlx::PgPool;
use tracing::info;

/// Metadata kept in PostgreSQL tables
pub struct DatabaseMetadataStore {
    pool: PgPool,
}

impl DatabaseMetadataStore {
    /// Connect with the given retry policy and create the schema if needed
    pub async fn connect(database_url: &str, retry: DatabaseRetryConfig) -> MetadataResult<Self> {
        info!(
            max_attempts = retry.max_attempts,
            initial_delay_seconds = retry.initial_delay_seconds,
            "Connecting to metadata database"
        );
        let pool = retry.connect(database_url).await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and create the schema if needed
    pub async fn from_pool(pool: PgPool) -> MetadataResult<Self> {
        Schema::initialize(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for DatabaseMetadataStore {
    async fn register_user(&self, user: UserRecord) -> MetadataResult<()> {
        Queries::upsert_user(&self.pool, &user).await
    }

    async fn user_exists(&self, user_id: UserId) -> MetadataResult<bool> {
        Queries::user_exists(&self.pool, user_id).await
    }

    async fn insert_file(&self, file: NewFile) -> MetadataResult<FileRecord> {
        Queries::insert_file(&self.pool, &file).await
    }

    async fn get_file(&self, file_id: FileId) -> MetadataResult<Option<FileRecord>> {
        Queries::get_file(&self.pool, file_id).await
    }

    async fn delete_file(&self, file_id: FileId) -> MetadataResult<()> {
        match Queries::delete_file(&self.pool, file_id).await? {
            0 => Err(MetadataError::NotFound(format!("file {}", file_id))),
            _ => Ok(()),
        }
    }

    async fn insert_chunk(&self, chunk: NewChunk) -> MetadataResult<ChunkRecord> {
        Queries::insert_chunk(&self.pool, &chunk).await
    }

    async fn list_chunks(&self, file_id: FileId) -> MetadataResult<Vec<ChunkRecord>> {
        Queries::list_chunks(&self.pool, file_id).await
    }

    async fn delete_chunks(&self, file_id: FileId) -> MetadataResult<u64> {
        Queries::delete_chunks(&self.pool, file_id).await
    }

    async fn chunk_counts(&self) -> MetadataResult<BTreeMap<ServerId, u64>> {
        Queries::chunk_counts(&self.pool).await
    }

    async fn get_owner(&self, file_id: FileId) -> MetadataResult<Option<UserId>> {
        Queries::get_owner(&self.pool, file_id).await
    }

    async fn permission_exists(&self, file_id: FileId, user_id: UserId) -> MetadataResult<bool> {
        Queries::permission_exists(&self.pool, file_id, user_id).await
    }

    async fn insert_permission(&self, permission: PermissionRecord) -> MetadataResult<()> {
        Queries::insert_permission(&self.pool, &permission).await
    }

    async fn list_permissions(&self, file_id: FileId) -> MetadataResult<Vec<PermissionRecord>> {
        Queries::list_permissions(&self.pool, file_id).await
    }

    async fn list_owned_files(&self, owner_id: UserId) -> MetadataResult<Vec<FileRecord>> {
        Queries::list_owned_files(&self.pool, owner_id).await
    }

    async fn list_shared_files(
        &self,
        user_id: UserId,
    ) -> MetadataResult<Vec<(FileRecord, PermissionType)>> {
        Queries::list_shared_files(&self.pool, user_id).await
    }
}
