use crate::config::{CliConfig, MetadataKind, StorageKind};
use anyhow::{Context, Result};
use balancer::{LoadBalancer, ServerRegistry, StaticLoadMetrics};
use chunk_codec::ChunkCodec;
use common::ServerStatus;
use metadata::{AuditLog, MetadataStore};
use orchestrator::audit::{
    AuditLogSink, AuditLogWriter, AuditSink, FanoutAuditSink, TracingAuditSink,
};
use orchestrator::StorageOrchestrator;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A wired orchestrator plus the handles needed to shut it down cleanly
pub struct App {
    pub orchestrator: StorageOrchestrator,
    pub audit_log: Option<Arc<dyn AuditLog>>,
    audit_writer: Option<AuditLogWriter>,
}

impl App {
    /// Drop the orchestrator and wait for pending audit events to be persisted
    pub async fn shutdown(self) {
        drop(self.orchestrator);
        if let Some(writer) = self.audit_writer {
            let written = writer.finish().await;
            debug!(written, "Audit events persisted");
        }
    }
}

/// Wire metadata store, registry, balancer, clients and codec from configuration
pub async fn build(config: &CliConfig) -> Result<App> {
    if config.storage == StorageKind::Memory || config.metadata == MetadataKind::Memory {
        warn!("Memory backends do not persist between invocations");
    }

    let metadata = config
        .metadata_backend()?
        .open()
        .await
        .context("Failed to initialize metadata store")?;

    let registry = Arc::new(ServerRegistry::with_active(config.servers.iter().copied()));
    for &server_id in &config.inactive_servers {
        registry.set_status(server_id, ServerStatus::Inactive)?;
    }
    let metrics = load_metrics(config, metadata.store.as_ref()).await?;
    let balancer = Arc::new(LoadBalancer::new(registry, config.policy).with_metrics(metrics));

    let clients = config
        .storage_backend()
        .initialize(&config.servers)
        .await
        .context("Failed to initialize storage clients")?;

    let codec = ChunkCodec::new(config.chunk_size, config.checksum)?;

    let (audit, audit_writer) = match &metadata.audit_log {
        Some(log) => {
            let (sink, writer) = AuditLogSink::spawn(log.clone());
            let fanout = FanoutAuditSink::new(vec![
                Arc::new(TracingAuditSink) as Arc<dyn AuditSink>,
                Arc::new(sink),
            ]);
            (Arc::new(fanout) as Arc<dyn AuditSink>, Some(writer))
        }
        None => (Arc::new(TracingAuditSink) as Arc<dyn AuditSink>, None),
    };

    info!(
        chunk_size = config.chunk_size,
        checksum = %config.checksum,
        policy = %config.policy,
        servers = config.servers.len(),
        inactive = config.inactive_servers.len(),
        audit_log = metadata.audit_log.is_some(),
        "Storage orchestrator ready"
    );

    let orchestrator = StorageOrchestrator::new(metadata.store, balancer, clients, codec)
        .with_audit_sink(audit);
    Ok(App {
        orchestrator,
        audit_log: metadata.audit_log,
        audit_writer,
    })
}

/// Seed per-server load with the chunk counts recorded in metadata.
/// Every configured server gets a reading, starting at zero.
async fn load_metrics(
    config: &CliConfig,
    metadata: &dyn MetadataStore,
) -> Result<Arc<StaticLoadMetrics>> {
    let counts = metadata
        .chunk_counts()
        .await
        .context("Failed to read chunk counts")?;
    let metrics: StaticLoadMetrics = config
        .servers
        .iter()
        .map(|&server_id| (server_id, counts.get(&server_id).copied().unwrap_or(0)))
        .collect();
    debug!(?counts, "Load metrics seeded from chunk records");
    Ok(Arc::new(metrics))
}
