use crate::{
    AuditLog, DatabaseMetadataStore, DatabaseRetryConfig, JsonMetadataStore, JsonlAuditLog,
    MemoryMetadataStore, MetadataResult, MetadataStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Metadata backend type
pub enum MetadataBackend {
    /// Process memory, nothing persisted
    Memory,
    /// Single JSON document at the given path
    Json(PathBuf),
    /// PostgreSQL database
    Database {
        database_url: String,
        retry_config: DatabaseRetryConfig,
    },
}

/// An opened backend: the metadata store and, for persistent backends,
/// the audit log stored alongside it
pub struct Metadata {
    pub store: Arc<dyn MetadataStore>,
    pub audit_log: Option<Arc<dyn AuditLog>>,
}

impl MetadataBackend {
    /// Initialize the metadata store based on type
    pub async fn initialize(self) -> MetadataResult<Arc<dyn MetadataStore>> {
        Ok(self.open().await?.store)
    }

    /// Initialize the metadata store together with its audit log
    pub async fn open(self) -> MetadataResult<Metadata> {
        match self {
            MetadataBackend::Memory => {
                info!("Using in-memory metadata store");
                Ok(Metadata {
                    store: Arc::new(MemoryMetadataStore::new()),
                    audit_log: None,
                })
            }
            MetadataBackend::Json(path) => {
                let audit_log = JsonlAuditLog::open(audit_log_path(&path)).await?;
                let store = JsonMetadataStore::open(path).await?;
                Ok(Metadata {
                    store: Arc::new(store),
                    audit_log: Some(Arc::new(audit_log)),
                })
            }
            MetadataBackend::Database {
                database_url,
                retry_config,
            } => {
                let store =
                    Arc::new(DatabaseMetadataStore::connect(&database_url, retry_config).await?);
                Ok(Metadata {
                    store: store.clone(),
                    audit_log: Some(store),
                })
            }
        }
    }
}

/// `metadata.json` keeps its audit trail in `metadata.audit.jsonl`
pub fn audit_log_path(metadata_path: &Path) -> PathBuf {
    metadata_path.with_extension("audit.jsonl")
}
