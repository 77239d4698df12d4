use crate::state::MetadataState;
use crate::{MetadataResult, MetadataStore};
use async_trait::async_trait;
use common::{
    ChunkRecord, FileId, FileRecord, NewChunk, NewFile, PermissionRecord, PermissionType,
    ServerId, UserId, UserRecord,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Metadata persisted as a single JSON document.
///
/// Every mutation is applied to a copy of the state, written to disk,
/// and only then made visible. A failed write leaves both the file and
/// the in-memory view unchanged.
pub struct JsonMetadataStore {
    path: PathBuf,
    state: Mutex<MetadataState>,
}

impl JsonMetadataStore {
    /// Open the document at `path`, starting empty if it does not exist yet
    pub async fn open(path: impl Into<PathBuf>) -> MetadataResult<Self> {
        let path = path.into();
        let state = if tokio::fs::try_exists(&path).await? {
            Self::load(&path).await?
        } else {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            MetadataState::default()
        };
        info!(path = ?path, "JSON metadata store opened");
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(path: &Path) -> MetadataResult<MetadataState> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write to a sibling temp file, fsync, then rename over the document
    async fn save_atomic(&self, state: &MetadataState) -> MetadataResult<()> {
        let json = serde_json::to_string_pretty(state)?;
        let tmp_path = self
            .path
            .with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4()));

        let result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(json.as_bytes()).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp_path, &self.path).await
        }
        .await;

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        debug!(path = ?self.path, "Metadata saved");
        Ok(())
    }

    /// Apply `op` to a copy of the state and commit it once persisted
    async fn mutate<T>(
        &self,
        op: impl FnOnce(&mut MetadataState) -> MetadataResult<T>,
    ) -> MetadataResult<T> {
        let mut guard = self.state.lock().await;
        let mut next = guard.clone();
        let value = op(&mut next)?;
        self.save_atomic(&next).await?;
        *guard = next;
        Ok(value)
    }
}

#[async_trait]
impl MetadataStore for JsonMetadataStore {
    async fn register_user(&self, user: UserRecord) -> MetadataResult<()> {
        self.mutate(|state| {
            state.register_user(user);
            Ok(())
        })
        .await
    }

    async fn user_exists(&self, user_id: UserId) -> MetadataResult<bool> {
        Ok(self.state.lock().await.user_exists(user_id))
    }

    async fn insert_file(&self, file: NewFile) -> MetadataResult<FileRecord> {
        self.mutate(|state| state.insert_file(file)).await
    }

    async fn get_file(&self, file_id: FileId) -> MetadataResult<Option<FileRecord>> {
        Ok(self.state.lock().await.get_file(file_id))
    }

    async fn delete_file(&self, file_id: FileId) -> MetadataResult<()> {
        self.mutate(|state| state.delete_file(file_id)).await
    }

    async fn insert_chunk(&self, chunk: NewChunk) -> MetadataResult<ChunkRecord> {
        self.mutate(|state| state.insert_chunk(chunk)).await
    }

    async fn list_chunks(&self, file_id: FileId) -> MetadataResult<Vec<ChunkRecord>> {
        Ok(self.state.lock().await.list_chunks(file_id))
    }

    async fn delete_chunks(&self, file_id: FileId) -> MetadataResult<u64> {
        self.mutate(|state| Ok(state.delete_chunks(file_id))).await
    }

    async fn chunk_counts(&self) -> MetadataResult<BTreeMap<ServerId, u64>> {
        Ok(self.state.lock().await.chunk_counts())
    }

    async fn get_owner(&self, file_id: FileId) -> MetadataResult<Option<UserId>> {
        Ok(self.state.lock().await.get_owner(file_id))
    }

    async fn permission_exists(&self, file_id: FileId, user_id: UserId) -> MetadataResult<bool> {
        Ok(self.state.lock().await.permission_exists(file_id, user_id))
    }

    async fn insert_permission(&self, permission: PermissionRecord) -> MetadataResult<()> {
        self.mutate(|state| state.insert_permission(permission))
            .await
    }

    async fn list_permissions(&self, file_id: FileId) -> MetadataResult<Vec<PermissionRecord>> {
        Ok(self.state.lock().await.list_permissions(file_id))
    }

    async fn list_owned_files(&self, owner_id: UserId) -> MetadataResult<Vec<FileRecord>> {
        Ok(self.state.lock().await.list_owned_files(owner_id))
    }

    async fn list_shared_files(
        &self,
        user_id: UserId,
    ) -> MetadataResult<Vec<(FileRecord, PermissionType)>> {
        Ok(self.state.lock().await.list_shared_files(user_id))
    }
}
