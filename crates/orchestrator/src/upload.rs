use crate::audit::{AuditAction, AuditOutcome};
use crate::{OrchestratorError, OrchestratorResult, StorageOrchestrator};
use chunk_codec::MAX_CHUNKS;
use common::{FileId, NewChunk, NewFile, ServerId, UserId};
use metadata::MetadataError;
use std::collections::BTreeSet;
use storage::ChunkWrite;
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

impl StorageOrchestrator {
    /// Store `size_bytes` bytes read from `reader` as a new file owned by `owner_id`.
    ///
    /// Chunks are written one at a time. If any step fails, everything
    /// written for the file is cleared again and the original error is
    /// returned; the caller never observes a partially stored file.
    pub async fn upload<R>(
        &self,
        owner_id: UserId,
        original_name: &str,
        reader: R,
        size_bytes: u64,
        file_type: &str,
    ) -> OrchestratorResult<FileId>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.audit(AuditAction::Upload, Some(owner_id), None, AuditOutcome::Attempted);

        if self.codec.check_size(size_bytes).is_err() {
            let result = Err(OrchestratorError::FileTooLarge {
                size_bytes,
                max_chunks: MAX_CHUNKS,
            });
            return self.audit_result(AuditAction::Upload, Some(owner_id), None, result);
        }

        let new_file = NewFile {
            original_name: original_name.to_string(),
            storage_path: uuid::Uuid::new_v4().to_string(),
            size_bytes,
            owner_id,
            file_type: file_type.to_string(),
            is_encrypted: false,
        };
        let file = match self.metadata.insert_file(new_file).await {
            Ok(file) => file,
            Err(e) => {
                let result = Err(OrchestratorError::from(e));
                return self.audit_result(AuditAction::Upload, Some(owner_id), None, result);
            }
        };
        let file_id = file.file_id;

        let mut touched = BTreeSet::new();
        let result = match self.store_chunks(file_id, reader, size_bytes, &mut touched).await {
            Ok(chunks) => {
                info!(
                    file_id = %file_id,
                    owner_id = %owner_id,
                    size_bytes,
                    chunks,
                    "Upload complete"
                );
                Ok(file_id)
            }
            Err(e) => {
                warn!(file_id = %file_id, error = %e, "Upload failed, rolling back");
                self.rollback(owner_id, file_id, &touched).await;
                Err(e)
            }
        };
        self.audit_result(AuditAction::Upload, Some(owner_id), Some(file_id), result)
    }

    /// Split, place and record every chunk. `touched` collects each server a
    /// store was attempted on, including one that failed mid-write.
    async fn store_chunks<R>(
        &self,
        file_id: FileId,
        reader: R,
        size_bytes: u64,
        touched: &mut BTreeSet<ServerId>,
    ) -> OrchestratorResult<u32>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut splitter = self.codec.splitter(reader, size_bytes);
        let mut stored = 0;

        while let Some(chunk) = splitter
            .next_chunk()
            .await
            .map_err(OrchestratorError::SourceRead)?
        {
            let server_id = self.balancer.select_server()?;
            let chunk_error = |source| OrchestratorError::ChunkStore {
                chunk_number: chunk.number,
                server_id,
                source,
            };
            let client = self.clients.get(server_id).map_err(chunk_error)?;

            touched.insert(server_id);
            client
                .store(ChunkWrite {
                    file_id,
                    chunk_number: chunk.number,
                    server_id,
                    payload: &chunk.payload,
                    checksum: &chunk.checksum,
                })
                .await
                .map_err(chunk_error)?;

            self.metadata
                .insert_chunk(NewChunk {
                    file_id,
                    chunk_number: chunk.number,
                    server_id,
                    checksum: chunk.checksum.clone(),
                })
                .await?;
            self.balancer.record_placement(server_id, 1);

            debug!(
                file_id = %file_id,
                chunk_number = chunk.number,
                server_id = %server_id,
                bytes = chunk.payload.len(),
                "Chunk stored"
            );
            stored += 1;
        }
        Ok(stored)
    }

    /// Best-effort removal of everything an aborted upload left behind.
    /// Failures are logged and audited, never returned.
    async fn rollback(&self, owner_id: UserId, file_id: FileId, touched: &BTreeSet<ServerId>) {
        for &server_id in touched {
            let result = match self.clients.get(server_id) {
                Ok(client) => client.clear_file(file_id).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => debug!(file_id = %file_id, server_id = %server_id, "Rolled back chunks"),
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(file_id = %file_id, server_id = %server_id, error = %e, "Rollback of chunks failed");
                    self.audit_cleanup_failure(owner_id, file_id, e.to_string());
                }
            }
        }

        let recorded = self.metadata.list_chunks(file_id).await.unwrap_or_default();
        match self.metadata.delete_chunks(file_id).await {
            Ok(_) => self.release_placements(&recorded),
            Err(e) => {
                warn!(file_id = %file_id, error = %e, "Rollback of chunk records failed");
                self.audit_cleanup_failure(owner_id, file_id, e.to_string());
            }
        }

        match self.metadata.delete_file(file_id).await {
            Ok(()) | Err(MetadataError::NotFound(_)) => {}
            Err(e) => {
                warn!(file_id = %file_id, error = %e, "Rollback of file record failed");
                self.audit_cleanup_failure(owner_id, file_id, e.to_string());
            }
        }
    }

    fn audit_cleanup_failure(&self, owner_id: UserId, file_id: FileId, reason: String) {
        self.audit(
            AuditAction::Upload,
            Some(owner_id),
            Some(file_id),
            AuditOutcome::CleanupFailed { reason },
        );
    }
}
