use crate::state::MetadataState;
use crate::{MetadataError, MetadataResult, MetadataStore};
use async_trait::async_trait;
use common::{
    ChunkRecord, FileId, FileRecord, NewChunk, NewFile, PermissionRecord, PermissionType,
    ServerId, UserId, UserRecord,
};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Metadata kept in process memory, lost on exit
#[derive(Default)]
pub struct MemoryMetadataStore {
    state: Mutex<MetadataState>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MetadataResult<MutexGuard<'_, MetadataState>> {
        self.state
            .lock()
            .map_err(|_| MetadataError::Internal("metadata lock poisoned".to_string()))
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn register_user(&self, user: UserRecord) -> MetadataResult<()> {
        self.lock()?.register_user(user);
        Ok(())
    }

    async fn user_exists(&self, user_id: UserId) -> MetadataResult<bool> {
        Ok(self.lock()?.user_exists(user_id))
    }

    async fn insert_file(&self, file: NewFile) -> MetadataResult<FileRecord> {
        self.lock()?.insert_file(file)
    }

    async fn get_file(&self, file_id: FileId) -> MetadataResult<Option<FileRecord>> {
        Ok(self.lock()?.get_file(file_id))
    }

    async fn delete_file(&self, file_id: FileId) -> MetadataResult<()> {
        self.lock()?.delete_file(file_id)
    }

    async fn insert_chunk(&self, chunk: NewChunk) -> MetadataResult<ChunkRecord> {
        self.lock()?.insert_chunk(chunk)
    }

    async fn list_chunks(&self, file_id: FileId) -> MetadataResult<Vec<ChunkRecord>> {
        Ok(self.lock()?.list_chunks(file_id))
    }

    async fn delete_chunks(&self, file_id: FileId) -> MetadataResult<u64> {
        Ok(self.lock()?.delete_chunks(file_id))
    }

    async fn chunk_counts(&self) -> MetadataResult<BTreeMap<ServerId, u64>> {
        Ok(self.lock()?.chunk_counts())
    }

    async fn get_owner(&self, file_id: FileId) -> MetadataResult<Option<UserId>> {
        Ok(self.lock()?.get_owner(file_id))
    }

    async fn permission_exists(&self, file_id: FileId, user_id: UserId) -> MetadataResult<bool> {
        Ok(self.lock()?.permission_exists(file_id, user_id))
    }

    async fn insert_permission(&self, permission: PermissionRecord) -> MetadataResult<()> {
        self.lock()?.insert_permission(permission)
    }

    async fn list_permissions(&self, file_id: FileId) -> MetadataResult<Vec<PermissionRecord>> {
        Ok(self.lock()?.list_permissions(file_id))
    }

    async fn list_owned_files(&self, owner_id: UserId) -> MetadataResult<Vec<FileRecord>> {
        Ok(self.lock()?.list_owned_files(owner_id))
    }

    async fn list_shared_files(
        &self,
        user_id: UserId,
    ) -> MetadataResult<Vec<(FileRecord, PermissionType)>> {
        Ok(self.lock()?.list_shared_files(user_id))
    }
}
