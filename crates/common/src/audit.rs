//! Audit trail records shared by the orchestrator and the metadata stores

use crate::ids::{FileId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Upload,
    Download,
    Delete,
    Share,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Upload => "upload",
            AuditAction::Download => "download",
            AuditAction::Delete => "delete",
            AuditAction::Share => "share",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An audit column held a value no variant maps to
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown audit {field}: {value}")]
pub struct UnknownAuditValue {
    pub field: &'static str,
    pub value: String,
}

impl FromStr for AuditAction {
    type Err = UnknownAuditValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(AuditAction::Upload),
            "download" => Ok(AuditAction::Download),
            "delete" => Ok(AuditAction::Delete),
            "share" => Ok(AuditAction::Share),
            _ => Err(UnknownAuditValue {
                field: "action",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuditOutcome {
    Attempted,
    Succeeded,
    Failed { reason: String },
    /// A compensating step failed after the operation itself had already failed
    CleanupFailed { reason: String },
}

impl AuditOutcome {
    /// Tag used in serialized events and the `outcome` column
    pub fn kind(&self) -> &'static str {
        match self {
            AuditOutcome::Attempted => "attempted",
            AuditOutcome::Succeeded => "succeeded",
            AuditOutcome::Failed { .. } => "failed",
            AuditOutcome::CleanupFailed { .. } => "cleanup_failed",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            AuditOutcome::Failed { reason } | AuditOutcome::CleanupFailed { reason } => {
                Some(reason)
            }
            AuditOutcome::Attempted | AuditOutcome::Succeeded => None,
        }
    }

    /// Rebuild an outcome from its `kind` tag and optional reason
    pub fn from_parts(kind: &str, reason: Option<String>) -> Result<Self, UnknownAuditValue> {
        match kind {
            "attempted" => Ok(AuditOutcome::Attempted),
            "succeeded" => Ok(AuditOutcome::Succeeded),
            "failed" => Ok(AuditOutcome::Failed {
                reason: reason.unwrap_or_default(),
            }),
            "cleanup_failed" => Ok(AuditOutcome::CleanupFailed {
                reason: reason.unwrap_or_default(),
            }),
            _ => Err(UnknownAuditValue {
                field: "outcome",
                value: kind.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub user_id: Option<UserId>,
    pub file_id: Option<FileId>,
    #[serde(flatten)]
    pub outcome: AuditOutcome,
}

impl AuditEvent {
    pub fn new(
        action: AuditAction,
        user_id: Option<UserId>,
        file_id: Option<FileId>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            user_id,
            file_id,
            outcome,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self.outcome,
            AuditOutcome::Failed { .. } | AuditOutcome::CleanupFailed { .. }
        )
    }
}
