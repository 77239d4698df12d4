//! Chunked file storage across a pool of storage servers
//!
//! [`StorageOrchestrator`] ties the pieces together: files are split by the
//! [`ChunkCodec`], each chunk is placed on a server picked by the
//! [`LoadBalancer`], written through that server's [`StorageClient`], and
//! recorded in the [`MetadataStore`]. Uploads are all-or-nothing: any
//! failure rolls back the chunks and records written so far.
//!
//! [`StorageClient`]: storage::StorageClient

pub mod audit;
mod delete;
mod download;
pub mod error;
mod share;
mod upload;

use audit::{AuditAction, AuditEvent, AuditOutcome, AuditSink, TracingAuditSink};
use balancer::LoadBalancer;
use chunk_codec::ChunkCodec;
use common::{ChunkRecord, FileId, FileRecord, PermissionType, UserId};
use metadata::MetadataStore;
use serde::Serialize;
use std::sync::Arc;
use storage::ClientPool;

pub use error::{OrchestratorError, OrchestratorResult};

/// A file visible to a user and the access they hold on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileListing {
    pub file: FileRecord,
    pub access: PermissionType,
}

/// Coordinates upload, download, delete and share.
///
/// Cheap to share behind an `Arc`; every operation takes `&self` and may run
/// concurrently with any other.
pub struct StorageOrchestrator {
    metadata: Arc<dyn MetadataStore>,
    balancer: Arc<LoadBalancer>,
    clients: ClientPool,
    codec: ChunkCodec,
    audit: Arc<dyn AuditSink>,
}

impl StorageOrchestrator {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        balancer: Arc<LoadBalancer>,
        clients: ClientPool,
        codec: ChunkCodec,
    ) -> Self {
        Self {
            metadata,
            balancer,
            clients,
            codec,
            audit: Arc::new(TracingAuditSink),
        }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    pub fn balancer(&self) -> &Arc<LoadBalancer> {
        &self.balancer
    }

    pub fn clients(&self) -> &ClientPool {
        &self.clients
    }

    pub fn codec(&self) -> ChunkCodec {
        self.codec
    }

    /// Chunk layout of a file, ordered by chunk number
    pub async fn file_chunks(&self, file_id: FileId) -> OrchestratorResult<Vec<ChunkRecord>> {
        Ok(self.metadata.list_chunks(file_id).await?)
    }

    /// Files owned by `user_id` followed by files shared with them
    pub async fn list_files(&self, user_id: UserId) -> OrchestratorResult<Vec<FileListing>> {
        let owned = self.metadata.list_owned_files(user_id).await?;
        let shared = self.metadata.list_shared_files(user_id).await?;

        let listings = owned
            .into_iter()
            .map(|file| FileListing {
                file,
                access: PermissionType::Owner,
            })
            .chain(
                shared
                    .into_iter()
                    .map(|(file, access)| FileListing { file, access }),
            )
            .collect();
        Ok(listings)
    }

    /// Return the chunks of removed records to the balancer's load accounting
    fn release_placements(&self, records: &[ChunkRecord]) {
        for record in records {
            self.balancer.record_placement(record.server_id, -1);
        }
    }

    fn audit(
        &self,
        action: AuditAction,
        user_id: Option<UserId>,
        file_id: Option<FileId>,
        outcome: AuditOutcome,
    ) {
        self.audit
            .record(AuditEvent::new(action, user_id, file_id, outcome));
    }

    /// Report the outcome of an operation and hand its result back
    fn audit_result<T>(
        &self,
        action: AuditAction,
        user_id: Option<UserId>,
        file_id: Option<FileId>,
        result: OrchestratorResult<T>,
    ) -> OrchestratorResult<T> {
        let outcome = match &result {
            Ok(_) => AuditOutcome::Succeeded,
            Err(e) => AuditOutcome::Failed {
                reason: e.to_string(),
            },
        };
        self.audit(action, user_id, file_id, outcome);
        result
    }
}
