use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

fn file_dir(data_dir: &Path, server_id: i32, file_id: i64) -> PathBuf {
    data_dir
        .join(format!("server-{}", server_id))
        .join(file_id.to_string())
}

/// Check `server-<id>/<file_id>/<n>.chunk` files and return chunk number -> server id
pub fn validate_chunk_layout(
    data_dir: &Path,
    servers: &[i32],
    file_id: i64,
    expected_chunks: usize,
) -> Result<BTreeMap<u32, i32>> {
    let mut placement = BTreeMap::new();
    for &server_id in servers {
        let dir = file_dir(data_dir, server_id, file_id);
        if !dir.exists() {
            continue;
        }
        for entry in fs::read_dir(&dir).with_context(|| format!("Failed to list {:?}", dir))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("chunk") {
                continue;
            }
            let chunk_number: u32 = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse().ok())
                .with_context(|| format!("Unexpected chunk file name: {:?}", path))?;
            if !path.with_extension("checksum").exists() {
                anyhow::bail!("Chunk {:?} has no checksum sidecar", path);
            }
            if let Some(other) = placement.insert(chunk_number, server_id) {
                anyhow::bail!(
                    "Chunk {} of file {} stored on both server {} and server {}",
                    chunk_number,
                    file_id,
                    other,
                    server_id
                );
            }
        }
    }

    if placement.len() != expected_chunks {
        anyhow::bail!(
            "Expected {} chunks for file {}, found {} on disk",
            expected_chunks,
            file_id,
            placement.len()
        );
    }
    if placement.keys().copied().ne(0..expected_chunks as u32) {
        anyhow::bail!("Chunk numbers of file {} are not contiguous", file_id);
    }

    println!(
        "  ✓ File {} has {} chunks on disk across {} servers",
        file_id,
        placement.len(),
        placement.values().collect::<std::collections::BTreeSet<_>>().len()
    );
    Ok(placement)
}

/// No server directory holds anything for `file_id`
pub fn validate_chunks_removed(data_dir: &Path, servers: &[i32], file_id: i64) -> Result<()> {
    for &server_id in servers {
        let dir = file_dir(data_dir, server_id, file_id);
        if dir.exists() && fs::read_dir(&dir)?.next().is_some() {
            anyhow::bail!("Chunks of file {} still present in {:?}", file_id, dir);
        }
    }
    println!("  ✓ No chunks of file {} left on disk", file_id);
    Ok(())
}

fn read_metadata(data_dir: &Path) -> Result<serde_json::Value> {
    let metadata_file = data_dir.join("metadata.json");
    let content = fs::read_to_string(&metadata_file)
        .with_context(|| format!("Failed to read metadata file {:?}", metadata_file))?;
    serde_json::from_str(&content).context("Failed to parse metadata JSON")
}

/// The JSON metadata document records the file and agrees with the on-disk placement
pub fn validate_metadata_document(
    data_dir: &Path,
    file_id: i64,
    expected_size: usize,
    placement: &BTreeMap<u32, i32>,
) -> Result<()> {
    let metadata = read_metadata(data_dir)?;
    let key = file_id.to_string();

    let file = metadata
        .get("files")
        .and_then(|files| files.get(&key))
        .with_context(|| format!("File {} missing from metadata.json", file_id))?;
    let size = file.get("size_bytes").and_then(|v| v.as_u64());
    if size != Some(expected_size as u64) {
        anyhow::bail!(
            "metadata.json records size {:?} for file {}, expected {}",
            size,
            file_id,
            expected_size
        );
    }
    if file.get("is_encrypted").and_then(|v| v.as_bool()) != Some(false) {
        anyhow::bail!("File {} is not recorded as unencrypted", file_id);
    }

    let chunks = metadata
        .get("chunks")
        .and_then(|chunks| chunks.get(&key))
        .and_then(|chunks| chunks.as_object())
        .with_context(|| format!("Chunks of file {} missing from metadata.json", file_id))?;
    if chunks.len() != placement.len() {
        anyhow::bail!(
            "metadata.json records {} chunks for file {}, {} found on disk",
            chunks.len(),
            file_id,
            placement.len()
        );
    }
    for chunk in chunks.values() {
        let number = chunk
            .get("chunk_number")
            .and_then(|v| v.as_u64())
            .context("Chunk record without chunk_number")? as u32;
        let server = chunk.get("server_id").and_then(|v| v.as_i64());
        if server != placement.get(&number).map(|&s| s as i64) {
            anyhow::bail!(
                "Chunk {} of file {} recorded on server {:?} but stored elsewhere",
                number,
                file_id,
                server
            );
        }
    }

    println!("  ✓ metadata.json agrees with the chunk layout of file {}", file_id);
    Ok(())
}

pub fn validate_metadata_removed(data_dir: &Path, file_id: i64) -> Result<()> {
    let metadata = read_metadata(data_dir)?;
    let key = file_id.to_string();
    for table in ["files", "chunks", "permissions"] {
        if metadata
            .get(table)
            .and_then(|t| t.get(&key))
            .is_some()
        {
            anyhow::bail!("File {} still present in metadata.json {}", file_id, table);
        }
    }
    println!("  ✓ File {} removed from metadata.json", file_id);
    Ok(())
}

pub fn validate_permission(data_dir: &Path, file_id: i64, user_id: i64, permission: &str) -> Result<()> {
    let metadata = read_metadata(data_dir)?;
    let recorded = metadata
        .get("permissions")
        .and_then(|p| p.get(file_id.to_string()))
        .and_then(|p| p.get(user_id.to_string()))
        .and_then(|p| p.as_str());
    if recorded != Some(permission) {
        anyhow::bail!(
            "Expected {} permission for user {} on file {}, found {:?}",
            permission,
            user_id,
            file_id,
            recorded
        );
    }
    println!("  ✓ User {} holds {} on file {}", user_id, permission, file_id);
    Ok(())
}
