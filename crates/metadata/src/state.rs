//! Relational state shared by the in-memory and JSON stores

use crate::{MetadataError, MetadataResult};
use chrono::Utc;
use common::{
    ChunkId, ChunkRecord, FileId, FileRecord, NewChunk, NewFile, PermissionRecord,
    PermissionType, ServerId, UserId, UserRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct MetadataState {
    last_file_id: i64,
    last_chunk_id: i64,
    users: BTreeMap<UserId, UserRecord>,
    files: BTreeMap<FileId, FileRecord>,
    chunks: BTreeMap<FileId, BTreeMap<u32, ChunkRecord>>,
    permissions: BTreeMap<FileId, BTreeMap<UserId, PermissionType>>,
}

impl MetadataState {
    pub fn register_user(&mut self, user: UserRecord) {
        self.users.insert(user.user_id, user);
    }

    pub fn user_exists(&self, user_id: UserId) -> bool {
        self.users.contains_key(&user_id)
    }

    pub fn insert_file(&mut self, file: NewFile) -> MetadataResult<FileRecord> {
        if !self.user_exists(file.owner_id) {
            return Err(MetadataError::Constraint(format!(
                "owner {} does not exist",
                file.owner_id
            )));
        }
        if self
            .files
            .values()
            .any(|existing| existing.storage_path == file.storage_path)
        {
            return Err(MetadataError::Conflict(format!(
                "storage path {}",
                file.storage_path
            )));
        }

        self.last_file_id += 1;
        let record = FileRecord {
            file_id: FileId(self.last_file_id),
            original_name: file.original_name,
            storage_path: file.storage_path,
            size_bytes: file.size_bytes,
            owner_id: file.owner_id,
            file_type: file.file_type,
            created_at: Utc::now(),
            is_encrypted: file.is_encrypted,
        };
        self.files.insert(record.file_id, record.clone());
        Ok(record)
    }

    pub fn get_file(&self, file_id: FileId) -> Option<FileRecord> {
        self.files.get(&file_id).cloned()
    }

    pub fn delete_file(&mut self, file_id: FileId) -> MetadataResult<()> {
        if self.files.remove(&file_id).is_none() {
            return Err(MetadataError::NotFound(format!("file {}", file_id)));
        }
        self.chunks.remove(&file_id);
        self.permissions.remove(&file_id);
        Ok(())
    }

    pub fn insert_chunk(&mut self, chunk: NewChunk) -> MetadataResult<ChunkRecord> {
        if !self.files.contains_key(&chunk.file_id) {
            return Err(MetadataError::Constraint(format!(
                "file {} does not exist",
                chunk.file_id
            )));
        }
        let file_chunks = self.chunks.entry(chunk.file_id).or_default();
        if file_chunks.contains_key(&chunk.chunk_number) {
            return Err(MetadataError::Conflict(format!(
                "chunk {} of file {}",
                chunk.chunk_number, chunk.file_id
            )));
        }

        self.last_chunk_id += 1;
        let record = ChunkRecord {
            chunk_id: ChunkId(self.last_chunk_id),
            file_id: chunk.file_id,
            chunk_number: chunk.chunk_number,
            server_id: chunk.server_id,
            checksum: chunk.checksum,
        };
        file_chunks.insert(record.chunk_number, record.clone());
        Ok(record)
    }

    pub fn list_chunks(&self, file_id: FileId) -> Vec<ChunkRecord> {
        self.chunks
            .get(&file_id)
            .map(|chunks| chunks.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn delete_chunks(&mut self, file_id: FileId) -> u64 {
        self.chunks
            .remove(&file_id)
            .map(|chunks| chunks.len() as u64)
            .unwrap_or(0)
    }

    pub fn chunk_counts(&self) -> BTreeMap<ServerId, u64> {
        let mut counts = BTreeMap::new();
        for record in self.chunks.values().flat_map(|chunks| chunks.values()) {
            *counts.entry(record.server_id).or_insert(0) += 1;
        }
        counts
    }

    pub fn get_owner(&self, file_id: FileId) -> Option<UserId> {
        self.files.get(&file_id).map(|file| file.owner_id)
    }

    pub fn permission_exists(&self, file_id: FileId, user_id: UserId) -> bool {
        self.permissions
            .get(&file_id)
            .is_some_and(|grants| grants.contains_key(&user_id))
    }

    pub fn insert_permission(&mut self, permission: PermissionRecord) -> MetadataResult<()> {
        if !self.files.contains_key(&permission.file_id) {
            return Err(MetadataError::Constraint(format!(
                "file {} does not exist",
                permission.file_id
            )));
        }
        if !self.user_exists(permission.user_id) {
            return Err(MetadataError::Constraint(format!(
                "user {} does not exist",
                permission.user_id
            )));
        }
        let grants = self.permissions.entry(permission.file_id).or_default();
        if grants.contains_key(&permission.user_id) {
            return Err(MetadataError::Conflict(format!(
                "permission on file {} for user {}",
                permission.file_id, permission.user_id
            )));
        }
        grants.insert(permission.user_id, permission.permission_type);
        Ok(())
    }

    pub fn list_permissions(&self, file_id: FileId) -> Vec<PermissionRecord> {
        self.permissions
            .get(&file_id)
            .map(|grants| {
                grants
                    .iter()
                    .map(|(&user_id, &permission_type)| PermissionRecord {
                        file_id,
                        user_id,
                        permission_type,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn list_owned_files(&self, owner_id: UserId) -> Vec<FileRecord> {
        self.files
            .values()
            .filter(|file| file.owner_id == owner_id)
            .cloned()
            .collect()
    }

    pub fn list_shared_files(&self, user_id: UserId) -> Vec<(FileRecord, PermissionType)> {
        self.permissions
            .iter()
            .filter_map(|(file_id, grants)| {
                let permission = grants.get(&user_id)?;
                let file = self.files.get(file_id)?;
                Some((file.clone(), *permission))
            })
            .collect()
    }
}
