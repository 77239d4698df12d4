use crate::constants::{
    DEFAULT_CHECKSUM, DEFAULT_CHUNK_SIZE, DEFAULT_DATA_DIR, DEFAULT_LB_POLICY, DEFAULT_SERVERS,
    METADATA_FILE, METADATA_TYPE_DATABASE, METADATA_TYPE_JSON, METADATA_TYPE_MEMORY,
    STORAGE_TYPE_FILESYSTEM, STORAGE_TYPE_MEMORY,
};
use anyhow::{anyhow, bail, Context, Result};
use balancer::LoadBalancingPolicy;
use chunk_codec::ChecksumAlgorithm;
use clap::Args;
use common::ServerId;
use metadata::{DatabaseRetryConfig, MetadataBackend};
use std::path::PathBuf;
use std::time::Duration;
use storage::{Latency, StorageBackend};

/// Options shared by every subcommand
#[derive(Args, Debug, Default, Clone)]
pub struct GlobalArgs {
    /// Chunk size in bytes [env: CHUNK_SIZE]
    #[arg(long, global = true)]
    pub chunk_size: Option<String>,

    /// Checksum algorithm: sha256 or sha512 [env: CHECKSUM]
    #[arg(long, global = true)]
    pub checksum: Option<String>,

    /// Load balancing policy: round_robin, random or least_loaded [env: LB_POLICY]
    #[arg(long, global = true)]
    pub lb_policy: Option<String>,

    /// Comma separated storage server ids [env: STORAGE_SERVERS]
    #[arg(long, global = true)]
    pub servers: Option<String>,

    /// Comma separated server ids registered as inactive [env: INACTIVE_SERVERS]
    #[arg(long, global = true)]
    pub inactive_servers: Option<String>,

    /// Storage backend: fs or memory [env: STORAGE_BACKEND]
    #[arg(long, global = true)]
    pub storage: Option<String>,

    /// Simulated latency for the memory backend, `MS` or `MIN-MAX` [env: STORAGE_LATENCY_MS]
    #[arg(long, global = true)]
    pub latency_ms: Option<String>,

    /// Metadata backend: json, db or memory [env: METADATA_BACKEND]
    #[arg(long, global = true)]
    pub metadata: Option<String>,

    /// Data directory for chunks and the JSON metadata document [env: DATA_DIR]
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// PostgreSQL connection string for the db backend [env: DATABASE_URL]
    #[arg(long, global = true)]
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Filesystem,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    Json,
    Database,
    Memory,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub chunk_size: usize,
    pub checksum: ChecksumAlgorithm,
    pub policy: LoadBalancingPolicy,
    pub servers: Vec<ServerId>,
    pub inactive_servers: Vec<ServerId>,
    pub storage: StorageKind,
    pub latency: Option<Latency>,
    pub metadata: MetadataKind,
    pub data_dir: PathBuf,
    pub database_url: Option<String>,
}

impl CliConfig {
    /// Resolve every value with priority flag > environment > default
    pub fn load(args: &GlobalArgs) -> Result<Self> {
        Self::load_with(args, |key| std::env::var(key).ok())
    }

    pub(crate) fn load_with(args: &GlobalArgs, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let resolve = |flag: &Option<String>, key: &str, default: &str| -> String {
            flag.clone()
                .or_else(|| env(key))
                .unwrap_or_else(|| default.to_string())
        };

        let chunk_size = resolve(&args.chunk_size, "CHUNK_SIZE", DEFAULT_CHUNK_SIZE);
        let chunk_size: usize = chunk_size
            .trim()
            .parse()
            .with_context(|| format!("Invalid chunk size: {}", chunk_size))?;
        if chunk_size == 0 {
            bail!("Chunk size must be greater than zero");
        }

        let checksum: ChecksumAlgorithm = resolve(&args.checksum, "CHECKSUM", DEFAULT_CHECKSUM)
            .parse()
            .context("Invalid checksum algorithm")?;

        let policy =
            LoadBalancingPolicy::from_config(&resolve(&args.lb_policy, "LB_POLICY", DEFAULT_LB_POLICY));

        let servers = parse_server_list(&resolve(&args.servers, "STORAGE_SERVERS", DEFAULT_SERVERS))?;
        if servers.is_empty() {
            bail!("At least one storage server is required");
        }
        let inactive_servers =
            parse_server_list(&resolve(&args.inactive_servers, "INACTIVE_SERVERS", ""))?;
        if let Some(unknown) = inactive_servers.iter().find(|id| !servers.contains(id)) {
            bail!("Inactive server {} is not in the server list", unknown);
        }

        let storage = match resolve(&args.storage, "STORAGE_BACKEND", STORAGE_TYPE_FILESYSTEM)
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            STORAGE_TYPE_FILESYSTEM | "filesystem" => StorageKind::Filesystem,
            STORAGE_TYPE_MEMORY => StorageKind::Memory,
            other => bail!("Invalid storage backend: {}", other),
        };

        let latency = args
            .latency_ms
            .clone()
            .or_else(|| env("STORAGE_LATENCY_MS"))
            .map(|value| parse_latency(&value))
            .transpose()?;

        let metadata = match resolve(&args.metadata, "METADATA_BACKEND", METADATA_TYPE_JSON)
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            METADATA_TYPE_JSON => MetadataKind::Json,
            METADATA_TYPE_DATABASE | "database" => MetadataKind::Database,
            METADATA_TYPE_MEMORY => MetadataKind::Memory,
            other => bail!("Invalid metadata backend: {}", other),
        };

        let data_dir = args
            .data_dir
            .clone()
            .or_else(|| env("DATA_DIR").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let database_url = args.database_url.clone().or_else(|| env("DATABASE_URL"));
        if metadata == MetadataKind::Database && database_url.is_none() {
            bail!("DATABASE_URL is required for the db metadata backend");
        }

        Ok(Self {
            chunk_size,
            checksum,
            policy,
            servers,
            inactive_servers,
            storage,
            latency,
            metadata,
            data_dir,
            database_url,
        })
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join(METADATA_FILE)
    }

    pub fn storage_backend(&self) -> StorageBackend {
        match self.storage {
            StorageKind::Filesystem => StorageBackend::Filesystem(self.data_dir.clone()),
            StorageKind::Memory => StorageBackend::Memory {
                latency: self.latency,
            },
        }
    }

    pub fn metadata_backend(&self) -> Result<MetadataBackend> {
        Ok(match self.metadata {
            MetadataKind::Json => MetadataBackend::Json(self.metadata_path()),
            MetadataKind::Memory => MetadataBackend::Memory,
            MetadataKind::Database => MetadataBackend::Database {
                database_url: self
                    .database_url
                    .clone()
                    .ok_or_else(|| anyhow!("DATABASE_URL is not set"))?,
                retry_config: DatabaseRetryConfig::from_env(),
            },
        })
    }
}

fn parse_server_list(value: &str) -> Result<Vec<ServerId>> {
    let mut servers = Vec::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id: i32 = part
            .parse()
            .with_context(|| format!("Invalid server id: {}", part))?;
        let id = ServerId(id);
        if !servers.contains(&id) {
            servers.push(id);
        }
    }
    Ok(servers)
}

fn parse_latency(value: &str) -> Result<Latency> {
    let parse_ms = |s: &str| -> Result<Duration> {
        let ms: u64 = s
            .trim()
            .parse()
            .with_context(|| format!("Invalid latency: {}", value))?;
        Ok(Duration::from_millis(ms))
    };
    match value.split_once('-') {
        Some((min, max)) => Ok(Latency::between(parse_ms(min)?, parse_ms(max)?)),
        None => Ok(Latency::fixed(parse_ms(value)?)),
    }
}
