use crate::audit::{AuditAction, AuditOutcome};
use crate::{OrchestratorError, OrchestratorResult, StorageOrchestrator};
use common::{FileId, PermissionRecord, PermissionType, UserId};
use metadata::MetadataError;
use tracing::info;

impl StorageOrchestrator {
    /// Grant `grantee` access to a file. Only the owner may share.
    pub async fn share(
        &self,
        file_id: FileId,
        grantee: UserId,
        permission_type: PermissionType,
        requester: UserId,
    ) -> OrchestratorResult<()> {
        self.audit(AuditAction::Share, Some(requester), Some(file_id), AuditOutcome::Attempted);
        let result = self.grant(file_id, grantee, permission_type, requester).await;
        self.audit_result(AuditAction::Share, Some(requester), Some(file_id), result)
    }

    async fn grant(
        &self,
        file_id: FileId,
        grantee: UserId,
        permission_type: PermissionType,
        requester: UserId,
    ) -> OrchestratorResult<()> {
        // A missing file has no owner, so nobody may share it
        if self.metadata.get_owner(file_id).await? != Some(requester) {
            return Err(OrchestratorError::PermissionDenied { file_id, requester });
        }
        if !self.metadata.user_exists(grantee).await? {
            return Err(OrchestratorError::UnknownUser(grantee));
        }
        let duplicate = OrchestratorError::DuplicateShare {
            file_id,
            user_id: grantee,
        };
        // The owner implicitly holds every right
        if grantee == requester || self.metadata.permission_exists(file_id, grantee).await? {
            return Err(duplicate);
        }

        let permission = PermissionRecord {
            file_id,
            user_id: grantee,
            permission_type,
        };
        match self.metadata.insert_permission(permission).await {
            Ok(()) => {}
            // Lost a race with a concurrent identical share
            Err(MetadataError::Conflict(_)) => return Err(duplicate),
            Err(e) => return Err(e.into()),
        }
        info!(
            file_id = %file_id,
            grantee = %grantee,
            permission = %permission_type,
            "File shared"
        );
        Ok(())
    }
}
