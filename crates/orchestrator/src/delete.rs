use crate::audit::{AuditAction, AuditOutcome};
use crate::{OrchestratorError, OrchestratorResult, StorageOrchestrator};
use common::{FileId, ServerId, UserId};
use std::collections::BTreeSet;
use tracing::{debug, info};

impl StorageOrchestrator {
    /// Remove a file's chunks from every server holding them, then its records.
    ///
    /// A server failure aborts before any metadata is touched, so the file
    /// stays fully described and the delete can be retried.
    pub async fn delete(&self, file_id: FileId, actor: Option<UserId>) -> OrchestratorResult<()> {
        self.audit(AuditAction::Delete, actor, Some(file_id), AuditOutcome::Attempted);
        let result = self.remove(file_id).await;
        self.audit_result(AuditAction::Delete, actor, Some(file_id), result)
    }

    async fn remove(&self, file_id: FileId) -> OrchestratorResult<()> {
        let records = self.metadata.list_chunks(file_id).await?;
        let servers: BTreeSet<ServerId> = records.iter().map(|r| r.server_id).collect();

        for server_id in servers {
            let delete_error = |source| OrchestratorError::ChunkDelete {
                file_id,
                server_id,
                source,
            };
            let client = self.clients.get(server_id).map_err(delete_error)?;
            match client.clear_file(file_id).await {
                Ok(()) => debug!(file_id = %file_id, server_id = %server_id, "Chunks cleared"),
                Err(e) if e.is_not_found() => {
                    debug!(file_id = %file_id, server_id = %server_id, "Chunks already gone")
                }
                Err(e) => return Err(delete_error(e)),
            }
        }

        let removed = self.metadata.delete_chunks(file_id).await?;
        self.release_placements(&records);
        self.metadata.delete_file(file_id).await?;
        info!(file_id = %file_id, chunks = removed, "File deleted");
        Ok(())
    }
}
