use crate::MetadataResult;
use sqlx::PgPool;
use tracing::info;

/// Database schema manager
pub struct Schema;

impl Schema {
    /// Create all tables and indexes if they do not exist
    pub async fn initialize(pool: &PgPool) -> MetadataResult<()> {
        Self::create_users_table(pool).await?;
        Self::create_files_table(pool).await?;
        Self::create_file_chunks_table(pool).await?;
        Self::create_file_permissions_table(pool).await?;
        Self::create_audit_log_table(pool).await?;
        Self::create_indexes(pool).await?;
        info!("PostgreSQL metadata schema initialized");
        Ok(())
    }

    async fn create_users_table(pool: &PgPool) -> MetadataResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id BIGINT PRIMARY KEY,
                username VARCHAR(255) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    async fn create_files_table(pool: &PgPool) -> MetadataResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                file_id BIGSERIAL PRIMARY KEY,
                original_name VARCHAR(255) NOT NULL,
                storage_path VARCHAR(255) NOT NULL UNIQUE,
                size_bytes BIGINT NOT NULL CHECK (size_bytes >= 0),
                owner_id BIGINT NOT NULL REFERENCES users(user_id),
                file_type VARCHAR(255) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                is_encrypted BOOLEAN NOT NULL DEFAULT FALSE
            )
            "#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    async fn create_file_chunks_table(pool: &PgPool) -> MetadataResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS file_chunks (
                chunk_id BIGSERIAL PRIMARY KEY,
                file_id BIGINT NOT NULL REFERENCES files(file_id) ON DELETE CASCADE,
                chunk_number BIGINT NOT NULL CHECK (chunk_number >= 0),
                server_id INTEGER NOT NULL,
                checksum VARCHAR(128) NOT NULL,
                UNIQUE (file_id, chunk_number)
            )
            "#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    async fn create_file_permissions_table(pool: &PgPool) -> MetadataResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS file_permissions (
                file_id BIGINT NOT NULL REFERENCES files(file_id) ON DELETE CASCADE,
                user_id BIGINT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
                permission_type VARCHAR(16) NOT NULL,
                granted_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (file_id, user_id)
            )
            "#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Audit rows outlive the users and files they mention, so no foreign keys
    async fn create_audit_log_table(pool: &PgPool) -> MetadataResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_log (
                event_id BIGSERIAL PRIMARY KEY,
                recorded_at TIMESTAMPTZ NOT NULL,
                action VARCHAR(16) NOT NULL,
                user_id BIGINT,
                file_id BIGINT,
                outcome VARCHAR(32) NOT NULL,
                reason TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    async fn create_indexes(pool: &PgPool) -> MetadataResult<()> {
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_owner ON files(owner_id)")
            .execute(pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_file_permissions_user ON file_permissions(user_id)",
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_log_file ON audit_log(file_id)")
            .execute(pool)
            .await?;
        Ok(())
    }
}
