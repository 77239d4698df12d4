//! Shared fixtures and fault-injecting collaborators

#![allow(dead_code)]

use async_trait::async_trait;
use balancer::{LoadBalancer, LoadBalancingPolicy, ServerRegistry, StaticLoadMetrics};
use chunk_codec::{ChecksumAlgorithm, ChunkCodec};
use ::common::{
    ChunkRecord, FileId, FileRecord, NewChunk, NewFile, PermissionRecord, PermissionType,
    ServerId, UserId, UserRecord,
};
use metadata::{MemoryMetadataStore, MetadataError, MetadataResult, MetadataStore};
use orchestrator::audit::{AuditSink, FanoutAuditSink, MemoryAuditSink};
use orchestrator::StorageOrchestrator;
use rand::RngCore;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use storage::{
    ChunkWrite, ClientError, ClientPool, ClientResult, MemoryStorageClient, StorageClient,
    StoredChunk,
};

pub const MIB: usize = 1024 * 1024;

pub const ALICE: UserId = UserId(1);
pub const BOB: UserId = UserId(2);
pub const CAROL: UserId = UserId(3);

pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut data);
    data
}

/// A fully wired orchestrator over in-memory collaborators, with handles
/// kept for inspecting what landed where
pub struct Harness {
    pub orchestrator: Arc<StorageOrchestrator>,
    pub metadata: Arc<dyn MetadataStore>,
    pub servers: Vec<Arc<MemoryStorageClient>>,
    pub registry: Arc<ServerRegistry>,
    pub audit: Arc<MemoryAuditSink>,
}

pub struct HarnessBuilder {
    server_count: i32,
    chunk_size: usize,
    policy: LoadBalancingPolicy,
    metadata: Option<Arc<dyn MetadataStore>>,
    metrics: Option<Arc<StaticLoadMetrics>>,
    extra_audit: Option<Arc<dyn AuditSink>>,
    wrap_client: Option<Box<dyn Fn(Arc<MemoryStorageClient>) -> Arc<dyn StorageClient>>>,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            server_count: 3,
            chunk_size: MIB,
            policy: LoadBalancingPolicy::RoundRobin,
            metadata: None,
            metrics: None,
            extra_audit: None,
            wrap_client: None,
        }
    }
}

impl HarnessBuilder {
    pub fn servers(mut self, count: i32) -> Self {
        self.server_count = count;
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn policy(mut self, policy: LoadBalancingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn metadata(mut self, metadata: Arc<dyn MetadataStore>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn metrics(mut self, metrics: Arc<StaticLoadMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Report audit events to `sink` as well as the inspectable memory sink
    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.extra_audit = Some(sink);
        self
    }

    /// Wrap every server's client before it goes into the pool
    pub fn wrap_clients(
        mut self,
        wrap: impl Fn(Arc<MemoryStorageClient>) -> Arc<dyn StorageClient> + 'static,
    ) -> Self {
        self.wrap_client = Some(Box::new(wrap));
        self
    }

    pub async fn build(self) -> Harness {
        let metadata = self
            .metadata
            .unwrap_or_else(|| Arc::new(MemoryMetadataStore::new()));
        for (user_id, username) in [(ALICE, "alice"), (BOB, "bob"), (CAROL, "carol")] {
            metadata
                .register_user(UserRecord {
                    user_id,
                    username: username.to_string(),
                })
                .await
                .unwrap();
        }

        let servers: Vec<Arc<MemoryStorageClient>> = (1..=self.server_count)
            .map(|id| Arc::new(MemoryStorageClient::new(ServerId(id))))
            .collect();
        let pool: ClientPool = servers
            .iter()
            .map(|server| match &self.wrap_client {
                Some(wrap) => wrap(server.clone()),
                None => server.clone() as Arc<dyn StorageClient>,
            })
            .collect();

        let registry = Arc::new(ServerRegistry::with_active(
            (1..=self.server_count).map(ServerId),
        ));
        let mut balancer = LoadBalancer::new(registry.clone(), self.policy);
        if let Some(metrics) = self.metrics {
            balancer = balancer.with_metrics(metrics);
        }
        let balancer = Arc::new(balancer);
        let codec = ChunkCodec::new(self.chunk_size, ChecksumAlgorithm::Sha256).unwrap();
        let audit = Arc::new(MemoryAuditSink::new());
        let sink: Arc<dyn AuditSink> = match self.extra_audit {
            Some(extra) => Arc::new(FanoutAuditSink::new(vec![
                audit.clone() as Arc<dyn AuditSink>,
                extra,
            ])),
            None => audit.clone(),
        };

        let orchestrator = StorageOrchestrator::new(metadata.clone(), balancer, pool, codec)
            .with_audit_sink(sink);

        Harness {
            orchestrator: Arc::new(orchestrator),
            metadata,
            servers,
            registry,
            audit,
        }
    }
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    pub async fn upload(&self, owner: UserId, data: &[u8]) -> orchestrator::OrchestratorResult<FileId> {
        self.orchestrator
            .upload(owner, "file.bin", data, data.len() as u64, "application/octet-stream")
            .await
    }

    pub fn server(&self, server_id: ServerId) -> &Arc<MemoryStorageClient> {
        &self.servers[(server_id.get() - 1) as usize]
    }

    /// Chunks of `file_id` across every server
    pub fn stored_chunk_count(&self, file_id: FileId) -> usize {
        self.servers
            .iter()
            .map(|server| server.chunk_numbers(file_id).len())
            .sum()
    }

    pub fn total_stored_chunks(&self) -> usize {
        self.servers.iter().map(|server| server.chunk_count()).sum()
    }
}

/// Passes through to an inner client but fails `store` for one chunk number
pub struct FailingStoreClient {
    inner: Arc<MemoryStorageClient>,
    fail_on_chunk: u32,
    partial_write: bool,
}

impl FailingStoreClient {
    pub fn new(inner: Arc<MemoryStorageClient>, fail_on_chunk: u32) -> Self {
        Self {
            inner,
            fail_on_chunk,
            partial_write: false,
        }
    }

    /// Write the chunk before reporting failure, like a lost acknowledgement
    pub fn with_partial_write(mut self) -> Self {
        self.partial_write = true;
        self
    }
}

#[async_trait]
impl StorageClient for FailingStoreClient {
    fn server_id(&self) -> ServerId {
        self.inner.server_id()
    }

    async fn store(&self, chunk: ChunkWrite<'_>) -> ClientResult<()> {
        if chunk.chunk_number == self.fail_on_chunk {
            if self.partial_write {
                self.inner.store(chunk).await?;
            }
            return Err(ClientError::Unavailable(self.server_id()));
        }
        self.inner.store(chunk).await
    }

    async fn retrieve(&self, file_id: FileId, chunk_number: u32) -> ClientResult<StoredChunk> {
        self.inner.retrieve(file_id, chunk_number).await
    }

    async fn delete(&self, file_id: FileId, chunk_number: u32) -> ClientResult<()> {
        self.inner.delete(file_id, chunk_number).await
    }

    async fn clear_file(&self, file_id: FileId) -> ClientResult<()> {
        self.inner.clear_file(file_id).await
    }
}

/// Passes through to an in-memory store but fails selected operations
#[derive(Default)]
pub struct FailingMetadataStore {
    inner: MemoryMetadataStore,
    fail_insert_chunk_at: Option<u32>,
    fail_delete_file: bool,
    delete_file_calls: AtomicUsize,
}

impl FailingMetadataStore {
    pub fn failing_insert_chunk(chunk_number: u32) -> Self {
        Self {
            fail_insert_chunk_at: Some(chunk_number),
            ..Self::default()
        }
    }

    pub fn failing_delete_file() -> Self {
        Self {
            fail_delete_file: true,
            ..Self::default()
        }
    }

    pub fn delete_file_calls(&self) -> usize {
        self.delete_file_calls.load(Ordering::SeqCst)
    }
}

fn injected() -> MetadataError {
    MetadataError::Internal("injected failure".to_string())
}

#[async_trait]
impl MetadataStore for FailingMetadataStore {
    async fn register_user(&self, user: UserRecord) -> MetadataResult<()> {
        self.inner.register_user(user).await
    }

    async fn user_exists(&self, user_id: UserId) -> MetadataResult<bool> {
        self.inner.user_exists(user_id).await
    }

    async fn insert_file(&self, file: NewFile) -> MetadataResult<FileRecord> {
        self.inner.insert_file(file).await
    }

    async fn get_file(&self, file_id: FileId) -> MetadataResult<Option<FileRecord>> {
        self.inner.get_file(file_id).await
    }

    async fn delete_file(&self, file_id: FileId) -> MetadataResult<()> {
        self.delete_file_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete_file {
            return Err(injected());
        }
        self.inner.delete_file(file_id).await
    }

    async fn insert_chunk(&self, chunk: NewChunk) -> MetadataResult<ChunkRecord> {
        if self.fail_insert_chunk_at == Some(chunk.chunk_number) {
            return Err(injected());
        }
        self.inner.insert_chunk(chunk).await
    }

    async fn list_chunks(&self, file_id: FileId) -> MetadataResult<Vec<ChunkRecord>> {
        self.inner.list_chunks(file_id).await
    }

    async fn delete_chunks(&self, file_id: FileId) -> MetadataResult<u64> {
        self.inner.delete_chunks(file_id).await
    }

    async fn chunk_counts(&self) -> MetadataResult<BTreeMap<ServerId, u64>> {
        self.inner.chunk_counts().await
    }

    async fn get_owner(&self, file_id: FileId) -> MetadataResult<Option<UserId>> {
        self.inner.get_owner(file_id).await
    }

    async fn permission_exists(&self, file_id: FileId, user_id: UserId) -> MetadataResult<bool> {
        self.inner.permission_exists(file_id, user_id).await
    }

    async fn insert_permission(&self, permission: PermissionRecord) -> MetadataResult<()> {
        self.inner.insert_permission(permission).await
    }

    async fn list_permissions(&self, file_id: FileId) -> MetadataResult<Vec<PermissionRecord>> {
        self.inner.list_permissions(file_id).await
    }

    async fn list_owned_files(&self, owner_id: UserId) -> MetadataResult<Vec<FileRecord>> {
        self.inner.list_owned_files(owner_id).await
    }

    async fn list_shared_files(
        &self,
        user_id: UserId,
    ) -> MetadataResult<Vec<(FileRecord, PermissionType)>> {
        self.inner.list_shared_files(user_id).await
    }
}
