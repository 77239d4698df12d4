//! Durable audit trail storage

use crate::database::queries::Queries;
use crate::{DatabaseMetadataStore, MetadataResult};
use async_trait::async_trait;
use common::{AuditEvent, FileId};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Append-only record of audit events
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, event: &AuditEvent) -> MetadataResult<()>;

    /// Recorded events in append order, restricted to `file_id` when given
    async fn list(&self, file_id: Option<FileId>) -> MetadataResult<Vec<AuditEvent>>;
}

/// One JSON object per line, appended to a file next to the metadata document.
///
/// Every append is flushed to disk before it returns. Lines that fail to
/// parse on read (e.g. a torn final line after a crash) are skipped.
pub struct JsonlAuditLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlAuditLog {
    pub async fn open(path: impl Into<PathBuf>) -> MetadataResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        info!(path = ?path, "JSONL audit log opened");
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditLog for JsonlAuditLog {
    async fn append(&self, event: &AuditEvent) -> MetadataResult<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.sync_data().await?;
        Ok(())
    }

    async fn list(&self, file_id: Option<FileId>) -> MetadataResult<Vec<AuditEvent>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEvent>(line) {
                Ok(event) if file_id.is_none() || event.file_id == file_id => events.push(event),
                Ok(_) => {}
                Err(e) => {
                    warn!(path = ?self.path, line = index + 1, error = %e, "Skipping malformed audit line")
                }
            }
        }
        Ok(events)
    }
}

#[async_trait]
impl AuditLog for DatabaseMetadataStore {
    async fn append(&self, event: &AuditEvent) -> MetadataResult<()> {
        Queries::insert_audit_event(self.pool(), event).await
    }

    async fn list(&self, file_id: Option<FileId>) -> MetadataResult<Vec<AuditEvent>> {
        Queries::list_audit_events(self.pool(), file_id).await
    }
}
