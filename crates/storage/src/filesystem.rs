//! Filesystem-backed storage client
//!
//! Layout: `<root>/server-<id>/<file_id>/<chunk_number>.chunk` with the
//! checksum in a `<chunk_number>.checksum` sidecar.

use crate::{ChunkWrite, ClientError, ClientResult, StorageClient, StoredChunk};
use async_trait::async_trait;
use common::{FileId, ServerId};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

const CHUNK_EXTENSION: &str = "chunk";
const CHECKSUM_EXTENSION: &str = "checksum";

/// One server's chunks kept as files under its own directory
pub struct FilesystemStorageClient {
    server_id: ServerId,
    server_dir: PathBuf,
}

impl FilesystemStorageClient {
    pub fn new(data_dir: impl Into<PathBuf>, server_id: ServerId) -> Self {
        let server_dir = Self::server_dir_in(&data_dir.into(), server_id);
        Self {
            server_id,
            server_dir,
        }
    }

    /// Directory holding the chunks of `server_id` under `data_dir`
    pub fn server_dir_in(data_dir: &Path, server_id: ServerId) -> PathBuf {
        data_dir.join(format!("server-{}", server_id))
    }

    pub fn server_dir(&self) -> &Path {
        &self.server_dir
    }

    fn file_dir(&self, file_id: FileId) -> PathBuf {
        self.server_dir.join(file_id.to_string())
    }

    fn chunk_path(&self, file_id: FileId, chunk_number: u32) -> PathBuf {
        self.file_dir(file_id)
            .join(format!("{}.{}", chunk_number, CHUNK_EXTENSION))
    }

    fn checksum_path(&self, file_id: FileId, chunk_number: u32) -> PathBuf {
        self.file_dir(file_id)
            .join(format!("{}.{}", chunk_number, CHECKSUM_EXTENSION))
    }

    fn io_error(&self, source: std::io::Error) -> ClientError {
        ClientError::Io {
            server_id: self.server_id,
            source,
        }
    }

    fn chunk_not_found(&self, file_id: FileId, chunk_number: u32) -> ClientError {
        ClientError::ChunkNotFound {
            server_id: self.server_id,
            file_id,
            chunk_number,
        }
    }

    /// Write via a uniquely named temp file, fsync, then rename over the target
    async fn write_atomic(&self, path: &Path, content: &[u8]) -> ClientResult<()> {
        let temp_path = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));

        let result = async {
            let mut file = tokio::fs::File::create(&temp_path).await?;
            file.write_all(content).await?;
            file.sync_all().await?;
            tokio::fs::rename(&temp_path, path).await
        }
        .await;

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(self.io_error(e));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageClient for FilesystemStorageClient {
    fn server_id(&self) -> ServerId {
        self.server_id
    }

    async fn store(&self, chunk: ChunkWrite<'_>) -> ClientResult<()> {
        let file_dir = self.file_dir(chunk.file_id);
        tokio::fs::create_dir_all(&file_dir)
            .await
            .map_err(|e| self.io_error(e))?;

        // Checksum first: a chunk file is only visible once its checksum exists.
        self.write_atomic(
            &self.checksum_path(chunk.file_id, chunk.chunk_number),
            chunk.checksum.as_bytes(),
        )
        .await?;
        self.write_atomic(
            &self.chunk_path(chunk.file_id, chunk.chunk_number),
            chunk.payload,
        )
        .await?;

        debug!(
            server_id = %self.server_id,
            file_id = %chunk.file_id,
            chunk_number = chunk.chunk_number,
            bytes = chunk.payload.len(),
            "Stored chunk on disk"
        );
        Ok(())
    }

    async fn retrieve(&self, file_id: FileId, chunk_number: u32) -> ClientResult<StoredChunk> {
        let payload = match tokio::fs::read(self.chunk_path(file_id, chunk_number)).await {
            Ok(payload) => payload,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(self.chunk_not_found(file_id, chunk_number))
            }
            Err(e) => return Err(self.io_error(e)),
        };
        let checksum = match tokio::fs::read_to_string(self.checksum_path(file_id, chunk_number)).await {
            Ok(checksum) => checksum.trim().to_string(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(self.chunk_not_found(file_id, chunk_number))
            }
            Err(e) => return Err(self.io_error(e)),
        };
        Ok(StoredChunk { payload, checksum })
    }

    async fn delete(&self, file_id: FileId, chunk_number: u32) -> ClientResult<()> {
        match tokio::fs::remove_file(self.chunk_path(file_id, chunk_number)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(self.chunk_not_found(file_id, chunk_number))
            }
            Err(e) => return Err(self.io_error(e)),
        }
        match tokio::fs::remove_file(self.checksum_path(file_id, chunk_number)).await {
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(self.io_error(e)),
            _ => {}
        }

        // Drop the file directory once it is empty; failure here is harmless.
        let _ = tokio::fs::remove_dir(self.file_dir(file_id)).await;
        Ok(())
    }

    async fn clear_file(&self, file_id: FileId) -> ClientResult<()> {
        match tokio::fs::remove_dir_all(self.file_dir(file_id)).await {
            Ok(()) => {
                debug!(server_id = %self.server_id, file_id = %file_id, "Cleared file directory");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ClientError::FileNotFound {
                server_id: self.server_id,
                file_id,
            }),
            Err(e) => Err(self.io_error(e)),
        }
    }
}
