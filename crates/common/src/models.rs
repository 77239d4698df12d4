use crate::ids::{ChunkId, FileId, ServerId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A stored file as recorded by the metadata store
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    pub file_id: FileId,
    pub original_name: String,
    pub storage_path: String, // opaque unique token, never interpreted
    pub size_bytes: u64,
    pub owner_id: UserId,
    pub file_type: String,
    pub created_at: DateTime<Utc>,
    pub is_encrypted: bool,
}

/// Fields supplied when a file record is created; the store assigns the id and timestamp
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NewFile {
    pub original_name: String,
    pub storage_path: String,
    pub size_bytes: u64,
    pub owner_id: UserId,
    pub file_type: String,
    pub is_encrypted: bool,
}

/// Location and checksum of one chunk of a file
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChunkRecord {
    pub chunk_id: ChunkId,
    pub file_id: FileId,
    pub chunk_number: u32, // 0-based, contiguous within a file
    pub server_id: ServerId,
    pub checksum: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NewChunk {
    pub file_id: FileId,
    pub chunk_number: u32,
    pub server_id: ServerId,
    pub checksum: String,
}

/// Access right granted to a non-owner
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PermissionType {
    Read,
    Write,
    Download,
    Owner,
}

impl PermissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionType::Read => "read",
            PermissionType::Write => "write",
            PermissionType::Download => "download",
            PermissionType::Owner => "owner",
        }
    }
}

impl fmt::Display for PermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown permission type: {0}")]
pub struct UnknownPermissionType(pub String);

impl FromStr for PermissionType {
    type Err = UnknownPermissionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(PermissionType::Read),
            "write" => Ok(PermissionType::Write),
            "download" => Ok(PermissionType::Download),
            "owner" => Ok(PermissionType::Owner),
            _ => Err(UnknownPermissionType(s.to_string())),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PermissionRecord {
    pub file_id: FileId,
    pub user_id: UserId,
    pub permission_type: PermissionType,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Active,
    Inactive,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerDescriptor {
    pub server_id: ServerId,
    pub status: ServerStatus,
}

impl ServerDescriptor {
    pub fn active(server_id: ServerId) -> Self {
        Self {
            server_id,
            status: ServerStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ServerStatus::Active
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: UserId,
    pub username: String,
}
