use crate::audit::{AuditAction, AuditOutcome};
use crate::{OrchestratorError, OrchestratorResult, StorageOrchestrator};
use common::{FileId, UserId};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

impl StorageOrchestrator {
    /// Reassemble a file from its chunks, verifying every checksum.
    /// Either the complete, verified content is returned or nothing is.
    ///
    /// `actor` only attributes the audit events; it grants nothing.
    pub async fn download(
        &self,
        file_id: FileId,
        actor: Option<UserId>,
    ) -> OrchestratorResult<Vec<u8>> {
        self.audit(AuditAction::Download, actor, Some(file_id), AuditOutcome::Attempted);
        let result = self.fetch(file_id).await;
        self.audit_result(AuditAction::Download, actor, Some(file_id), result)
    }

    /// Download into `destination`, returning the number of bytes written.
    ///
    /// Content lands in a temporary sibling first and is renamed into place,
    /// so a failed download never leaves a partial file behind.
    pub async fn download_to(
        &self,
        file_id: FileId,
        destination: &Path,
        actor: Option<UserId>,
    ) -> OrchestratorResult<u64> {
        let data = self.download(file_id, actor).await?;
        let tmp_path = temp_sibling(destination);

        let written = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp_path, destination).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        info!(file_id = %file_id, destination = ?destination, bytes = data.len(), "File written");
        Ok(data.len() as u64)
    }

    async fn fetch(&self, file_id: FileId) -> OrchestratorResult<Vec<u8>> {
        let records = self.metadata.list_chunks(file_id).await?;
        if records.is_empty() {
            return Err(OrchestratorError::NoChunksFound(file_id));
        }
        for (position, record) in records.iter().enumerate() {
            if record.chunk_number as usize != position {
                return Err(OrchestratorError::Integrity {
                    file_id,
                    reason: format!(
                        "chunk records are not contiguous: expected chunk {}, found {}",
                        position, record.chunk_number
                    ),
                });
            }
        }

        let file = self.metadata.get_file(file_id).await?;
        let capacity = records.len().saturating_mul(self.codec.chunk_size());
        let capacity = file
            .as_ref()
            .and_then(|f| usize::try_from(f.size_bytes).ok())
            .map_or(capacity, |size| size.min(capacity));
        let mut reassembler = self.codec.reassembler().with_capacity(capacity);

        for record in &records {
            let retrieval_error = |source| OrchestratorError::ChunkRetrieval {
                chunk_number: record.chunk_number,
                server_id: record.server_id,
                source,
            };
            let client = self.clients.get(record.server_id).map_err(retrieval_error)?;
            let stored = client
                .retrieve(file_id, record.chunk_number)
                .await
                .map_err(retrieval_error)?;

            reassembler
                .push(record.chunk_number, &stored.payload, &record.checksum)
                .map_err(|e| OrchestratorError::Integrity {
                    file_id,
                    reason: e.to_string(),
                })?;
            debug!(
                file_id = %file_id,
                chunk_number = record.chunk_number,
                server_id = %record.server_id,
                "Chunk verified"
            );
        }

        let data = reassembler.finish();
        if let Some(file) = file {
            if data.len() as u64 != file.size_bytes {
                return Err(OrchestratorError::Integrity {
                    file_id,
                    reason: format!(
                        "reassembled {} bytes, file record declares {}",
                        data.len(),
                        file.size_bytes
                    ),
                });
            }
        }
        Ok(data)
    }
}

fn temp_sibling(destination: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(destination.file_name().unwrap_or_default());
    name.push(format!(".{}.part", uuid::Uuid::new_v4()));
    destination.with_file_name(name)
}
