use crate::{MetadataError, MetadataResult};
use chrono::{DateTime, Utc};
use common::{
    AuditEvent, AuditOutcome, ChunkId, ChunkRecord, FileId, FileRecord, NewChunk, NewFile,
    PermissionRecord, PermissionType, ServerId, UserId, UserRecord,
};
use sqlx::{PgPool, Postgres};
use std::collections::BTreeMap;

type FileRow = (i64, String, String, i64, i64, String, DateTime<Utc>, bool);
type SharedFileRow = (i64, String, String, i64, i64, String, DateTime<Utc>, bool, String);
type ChunkRow = (i64, i64, i64, i32, String);
type AuditRow = (DateTime<Utc>, String, Option<i64>, Option<i64>, String, Option<String>);

const FILE_COLUMNS: &str =
    "file_id, original_name, storage_path, size_bytes, owner_id, file_type, created_at, is_encrypted";

/// Query operations for the metadata tables
pub struct Queries;

impl Queries {
    pub async fn upsert_user(
        executor: impl sqlx::Executor<'_, Database = Postgres>,
        user: &UserRecord,
    ) -> MetadataResult<()> {
        sqlx::query(
            "INSERT INTO users (user_id, username) VALUES ($1, $2)
             ON CONFLICT (user_id) DO UPDATE SET username = EXCLUDED.username",
        )
        .bind(user.user_id.get())
        .bind(&user.username)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn user_exists(pool: &PgPool, user_id: UserId) -> MetadataResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE user_id = $1)")
                .bind(user_id.get())
                .fetch_one(pool)
                .await?;
        Ok(exists)
    }

    pub async fn insert_file(pool: &PgPool, file: &NewFile) -> MetadataResult<FileRecord> {
        let size_bytes = i64::try_from(file.size_bytes)
            .map_err(|_| MetadataError::Constraint(format!("size {} too large", file.size_bytes)))?;
        let sql = format!(
            "INSERT INTO files (original_name, storage_path, size_bytes, owner_id, file_type, is_encrypted)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            FILE_COLUMNS
        );
        let row = sqlx::query_as::<_, FileRow>(&sql)
            .bind(&file.original_name)
            .bind(&file.storage_path)
            .bind(size_bytes)
            .bind(file.owner_id.get())
            .bind(&file.file_type)
            .bind(file.is_encrypted)
            .fetch_one(pool)
            .await
            .map_err(|e| classify(e, format!("file {}", file.storage_path)))?;
        file_from_row(row)
    }

    pub async fn get_file(pool: &PgPool, file_id: FileId) -> MetadataResult<Option<FileRecord>> {
        let sql = format!("SELECT {} FROM files WHERE file_id = $1", FILE_COLUMNS);
        let row = sqlx::query_as::<_, FileRow>(&sql)
            .bind(file_id.get())
            .fetch_optional(pool)
            .await?;
        row.map(file_from_row).transpose()
    }

    /// Delete a file row; chunk and permission rows cascade
    pub async fn delete_file(pool: &PgPool, file_id: FileId) -> MetadataResult<u64> {
        let result = sqlx::query("DELETE FROM files WHERE file_id = $1")
            .bind(file_id.get())
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn insert_chunk(pool: &PgPool, chunk: &NewChunk) -> MetadataResult<ChunkRecord> {
        let row = sqlx::query_as::<_, ChunkRow>(
            "INSERT INTO file_chunks (file_id, chunk_number, server_id, checksum)
             VALUES ($1, $2, $3, $4)
             RETURNING chunk_id, file_id, chunk_number, server_id, checksum",
        )
        .bind(chunk.file_id.get())
        .bind(i64::from(chunk.chunk_number))
        .bind(chunk.server_id.get())
        .bind(&chunk.checksum)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            classify(
                e,
                format!("chunk {} of file {}", chunk.chunk_number, chunk.file_id),
            )
        })?;
        chunk_from_row(row)
    }

    pub async fn list_chunks(pool: &PgPool, file_id: FileId) -> MetadataResult<Vec<ChunkRecord>> {
        let rows = sqlx::query_as::<_, ChunkRow>(
            "SELECT chunk_id, file_id, chunk_number, server_id, checksum
             FROM file_chunks WHERE file_id = $1 ORDER BY chunk_number",
        )
        .bind(file_id.get())
        .fetch_all(pool)
        .await?;
        rows.into_iter().map(chunk_from_row).collect()
    }

    pub async fn delete_chunks(pool: &PgPool, file_id: FileId) -> MetadataResult<u64> {
        let result = sqlx::query("DELETE FROM file_chunks WHERE file_id = $1")
            .bind(file_id.get())
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn chunk_counts(pool: &PgPool) -> MetadataResult<BTreeMap<ServerId, u64>> {
        let rows = sqlx::query_as::<_, (i32, i64)>(
            "SELECT server_id, COUNT(*) FROM file_chunks GROUP BY server_id ORDER BY server_id",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(server_id, count)| (ServerId(server_id), count.max(0) as u64))
            .collect())
    }

    pub async fn get_owner(pool: &PgPool, file_id: FileId) -> MetadataResult<Option<UserId>> {
        let owner: Option<i64> = sqlx::query_scalar("SELECT owner_id FROM files WHERE file_id = $1")
            .bind(file_id.get())
            .fetch_optional(pool)
            .await?;
        Ok(owner.map(UserId))
    }

    pub async fn permission_exists(
        pool: &PgPool,
        file_id: FileId,
        user_id: UserId,
    ) -> MetadataResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM file_permissions WHERE file_id = $1 AND user_id = $2)",
        )
        .bind(file_id.get())
        .bind(user_id.get())
        .fetch_one(pool)
        .await?;
        Ok(exists)
    }

    pub async fn insert_permission(
        pool: &PgPool,
        permission: &PermissionRecord,
    ) -> MetadataResult<()> {
        sqlx::query(
            "INSERT INTO file_permissions (file_id, user_id, permission_type) VALUES ($1, $2, $3)",
        )
        .bind(permission.file_id.get())
        .bind(permission.user_id.get())
        .bind(permission.permission_type.as_str())
        .execute(pool)
        .await
        .map_err(|e| {
            classify(
                e,
                format!(
                    "permission on file {} for user {}",
                    permission.file_id, permission.user_id
                ),
            )
        })?;
        Ok(())
    }

    pub async fn list_permissions(
        pool: &PgPool,
        file_id: FileId,
    ) -> MetadataResult<Vec<PermissionRecord>> {
        let rows = sqlx::query_as::<_, (i64, i64, String)>(
            "SELECT file_id, user_id, permission_type FROM file_permissions
             WHERE file_id = $1 ORDER BY user_id",
        )
        .bind(file_id.get())
        .fetch_all(pool)
        .await?;

        rows.into_iter()
            .map(|(file_id, user_id, permission_type)| {
                Ok(PermissionRecord {
                    file_id: FileId(file_id),
                    user_id: UserId(user_id),
                    permission_type: parse_permission(&permission_type)?,
                })
            })
            .collect()
    }

    pub async fn list_owned_files(
        pool: &PgPool,
        owner_id: UserId,
    ) -> MetadataResult<Vec<FileRecord>> {
        let sql = format!(
            "SELECT {} FROM files WHERE owner_id = $1 ORDER BY file_id",
            FILE_COLUMNS
        );
        let rows = sqlx::query_as::<_, FileRow>(&sql)
            .bind(owner_id.get())
            .fetch_all(pool)
            .await?;
        rows.into_iter().map(file_from_row).collect()
    }

    pub async fn list_shared_files(
        pool: &PgPool,
        user_id: UserId,
    ) -> MetadataResult<Vec<(FileRecord, PermissionType)>> {
        let rows = sqlx::query_as::<_, SharedFileRow>(
            "SELECT f.file_id, f.original_name, f.storage_path, f.size_bytes, f.owner_id,
                    f.file_type, f.created_at, f.is_encrypted, p.permission_type
             FROM file_permissions p
             JOIN files f ON f.file_id = p.file_id
             WHERE p.user_id = $1
             ORDER BY f.file_id",
        )
        .bind(user_id.get())
        .fetch_all(pool)
        .await?;

        rows.into_iter()
            .map(|(id, name, path, size, owner, file_type, created_at, encrypted, permission)| {
                let file =
                    file_from_row((id, name, path, size, owner, file_type, created_at, encrypted))?;
                Ok((file, parse_permission(&permission)?))
            })
            .collect()
    }

    pub async fn insert_audit_event(pool: &PgPool, event: &AuditEvent) -> MetadataResult<()> {
        sqlx::query(
            "INSERT INTO audit_log (recorded_at, action, user_id, file_id, outcome, reason)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(event.timestamp)
        .bind(event.action.as_str())
        .bind(event.user_id.map(|id| id.get()))
        .bind(event.file_id.map(|id| id.get()))
        .bind(event.outcome.kind())
        .bind(event.outcome.reason())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Audit events in the order they were recorded, optionally for one file
    pub async fn list_audit_events(
        pool: &PgPool,
        file_id: Option<FileId>,
    ) -> MetadataResult<Vec<AuditEvent>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            "SELECT recorded_at, action, user_id, file_id, outcome, reason
             FROM audit_log
             WHERE $1::BIGINT IS NULL OR file_id = $1
             ORDER BY event_id",
        )
        .bind(file_id.map(|id| id.get()))
        .fetch_all(pool)
        .await?;
        rows.into_iter().map(audit_event_from_row).collect()
    }
}

/// Map constraint violations onto the store's error kinds
fn classify(error: sqlx::Error, what: String) -> MetadataError {
    if let sqlx::Error::Database(db) = &error {
        if db.is_unique_violation() {
            return MetadataError::Conflict(what);
        }
        if db.is_foreign_key_violation() {
            return MetadataError::Constraint(format!("{}: {}", what, db.message()));
        }
    }
    MetadataError::Database(error)
}

fn parse_permission(value: &str) -> MetadataResult<PermissionType> {
    value
        .parse()
        .map_err(|e: common::UnknownPermissionType| MetadataError::Internal(e.to_string()))
}

fn file_from_row(row: FileRow) -> MetadataResult<FileRecord> {
    let (file_id, original_name, storage_path, size_bytes, owner_id, file_type, created_at, is_encrypted) =
        row;
    let size_bytes = u64::try_from(size_bytes)
        .map_err(|_| MetadataError::Internal(format!("negative size for file {}", file_id)))?;
    Ok(FileRecord {
        file_id: FileId(file_id),
        original_name,
        storage_path,
        size_bytes,
        owner_id: UserId(owner_id),
        file_type,
        created_at,
        is_encrypted,
    })
}

fn chunk_from_row(row: ChunkRow) -> MetadataResult<ChunkRecord> {
    let (chunk_id, file_id, chunk_number, server_id, checksum) = row;
    let chunk_number = u32::try_from(chunk_number).map_err(|_| {
        MetadataError::Internal(format!(
            "chunk number {} of file {} out of range",
            chunk_number, file_id
        ))
    })?;
    Ok(ChunkRecord {
        chunk_id: ChunkId(chunk_id),
        file_id: FileId(file_id),
        chunk_number,
        server_id: ServerId(server_id),
        checksum,
    })
}

fn audit_event_from_row(row: AuditRow) -> MetadataResult<AuditEvent> {
    let (timestamp, action, user_id, file_id, outcome, reason) = row;
    let unknown = |e: common::UnknownAuditValue| MetadataError::Internal(e.to_string());
    Ok(AuditEvent {
        timestamp,
        action: action.parse().map_err(unknown)?,
        user_id: user_id.map(UserId),
        file_id: file_id.map(FileId),
        outcome: AuditOutcome::from_parts(&outcome, reason).map_err(unknown)?,
    })
}
