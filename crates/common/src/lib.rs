pub mod audit;
pub mod ids;
pub mod models;

pub use audit::{AuditAction, AuditEvent, AuditOutcome, UnknownAuditValue};
pub use ids::{ChunkId, FileId, ServerId, UserId};
pub use models::*;
