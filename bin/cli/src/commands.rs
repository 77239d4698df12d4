use crate::app::App;
use crate::constants::FALLBACK_FILE_TYPE;
use anyhow::{anyhow, Context, Result};
use common::{FileId, PermissionType, UserId, UserRecord};
use metadata::AuditLog;
use orchestrator::StorageOrchestrator;
use std::path::Path;
use tokio::io::BufReader;
use tracing::info;

pub async fn add_user(orchestrator: &StorageOrchestrator, user_id: UserId, username: String) -> Result<()> {
    orchestrator
        .metadata()
        .register_user(UserRecord { user_id, username })
        .await
        .context("Failed to register user")?;
    println!("User {} registered", user_id);
    Ok(())
}

pub async fn upload(
    orchestrator: &StorageOrchestrator,
    path: &Path,
    owner: UserId,
    name: Option<String>,
    file_type: Option<String>,
) -> Result<FileId> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {:?}", path))?;
    let size = file
        .metadata()
        .await
        .with_context(|| format!("Failed to stat {:?}", path))?
        .len();

    let name = match name {
        Some(name) => name,
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("Cannot derive a file name from {:?}", path))?,
    };
    let file_type = file_type.unwrap_or_else(|| detect_file_type(path));

    info!(path = ?path, size, file_type = %file_type, "Uploading file");
    let file_id = orchestrator
        .upload(owner, &name, BufReader::new(file), size, &file_type)
        .await
        .context("Upload failed")?;

    println!("{}", file_id);
    Ok(file_id)
}

pub async fn download(
    orchestrator: &StorageOrchestrator,
    file_id: FileId,
    output: &Path,
    actor: Option<UserId>,
) -> Result<()> {
    let written = orchestrator
        .download_to(file_id, output, actor)
        .await
        .with_context(|| format!("Download of file {} failed", file_id))?;
    println!("Wrote {} bytes to {}", written, output.display());
    Ok(())
}

pub async fn delete(
    orchestrator: &StorageOrchestrator,
    file_id: FileId,
    actor: Option<UserId>,
) -> Result<()> {
    orchestrator
        .delete(file_id, actor)
        .await
        .with_context(|| format!("Delete of file {} failed", file_id))?;
    println!("File {} deleted", file_id);
    Ok(())
}

pub async fn share(
    orchestrator: &StorageOrchestrator,
    file_id: FileId,
    grantee: UserId,
    permission: PermissionType,
    requester: UserId,
) -> Result<()> {
    orchestrator
        .share(file_id, grantee, permission, requester)
        .await
        .context("Share failed")?;
    println!("Granted {} on file {} to user {}", permission, file_id, grantee);
    Ok(())
}

pub async fn list(orchestrator: &StorageOrchestrator, user_id: UserId, json: bool) -> Result<()> {
    let listings = orchestrator.list_files(user_id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }
    for listing in listings {
        let file = listing.file;
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            file.file_id,
            listing.access,
            file.size_bytes,
            file.file_type,
            file.created_at.to_rfc3339(),
            file.original_name
        );
    }
    Ok(())
}

pub async fn chunks(orchestrator: &StorageOrchestrator, file_id: FileId, json: bool) -> Result<()> {
    let chunks = orchestrator.file_chunks(file_id).await?;
    if chunks.is_empty() {
        return Err(anyhow!("No chunks recorded for file {}", file_id));
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
        return Ok(());
    }
    for chunk in chunks {
        println!("{}\tserver-{}\t{}", chunk.chunk_number, chunk.server_id, chunk.checksum);
    }
    Ok(())
}

pub fn servers(orchestrator: &StorageOrchestrator, json: bool) -> Result<()> {
    let descriptors = orchestrator.balancer().registry().descriptors();
    if json {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }
    println!("policy: {}", orchestrator.balancer().policy());
    for descriptor in descriptors {
        let status = if descriptor.is_active() { "active" } else { "inactive" };
        println!("{}\t{}", descriptor.server_id, status);
    }
    Ok(())
}

pub async fn audit(app: &App, file_id: Option<FileId>, json: bool) -> Result<()> {
    let log = app
        .audit_log
        .as_ref()
        .ok_or_else(|| anyhow!("The memory metadata backend keeps no audit log"))?;
    let events = log.list(file_id).await.context("Failed to read audit log")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }
    for event in events {
        let id = |id: Option<i64>| id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "{}\t{}\t{}\tuser={}\tfile={}\t{}",
            event.timestamp.to_rfc3339(),
            event.action,
            event.outcome.kind(),
            id(event.user_id.map(|u| u.get())),
            id(event.file_id.map(|f| f.get())),
            event.outcome.reason().unwrap_or_default()
        );
    }
    Ok(())
}

/// MIME type sniffed from the file's leading bytes
fn detect_file_type(path: &Path) -> String {
    match infer::get_from_path(path) {
        Ok(Some(kind)) => kind.mime_type().to_string(),
        _ => FALLBACK_FILE_TYPE.to_string(),
    }
}
