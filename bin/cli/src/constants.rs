/// Default chunk size in bytes (1 MiB)
pub const DEFAULT_CHUNK_SIZE: &str = "1048576";

/// Default checksum algorithm
pub const DEFAULT_CHECKSUM: &str = "sha256";

/// Default load balancing policy
pub const DEFAULT_LB_POLICY: &str = "round_robin";

/// Default storage server ids
pub const DEFAULT_SERVERS: &str = "1,2,3";

/// Default data directory for filesystem chunks and the JSON metadata document
pub const DEFAULT_DATA_DIR: &str = "chunk_data";

/// JSON metadata document name inside the data directory
pub const METADATA_FILE: &str = "metadata.json";

/// Storage backend identifiers
pub const STORAGE_TYPE_FILESYSTEM: &str = "fs";
pub const STORAGE_TYPE_MEMORY: &str = "memory";

/// Metadata backend identifiers
pub const METADATA_TYPE_JSON: &str = "json";
pub const METADATA_TYPE_DATABASE: &str = "db";
pub const METADATA_TYPE_MEMORY: &str = "memory";

/// File type used when detection finds nothing
pub const FALLBACK_FILE_TYPE: &str = "application/octet-stream";
