use anyhow::{Context, Result};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// A test input written to disk together with its digest
pub struct TestFile {
    pub path: PathBuf,
    pub name: String,
    pub size: usize,
    pub sha256: String,
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Write one file per entry of `sizes` filled with random bytes
pub fn create_test_files(dir: &Path, sizes: &[usize]) -> Result<Vec<TestFile>> {
    let mut rng = rand::thread_rng();
    let mut files = Vec::with_capacity(sizes.len());
    for (i, &size) in sizes.iter().enumerate() {
        let name = format!("file{}.bin", i);
        let mut content = vec![0u8; size];
        rng.fill_bytes(&mut content);
        let path = dir.join(&name);
        fs::write(&path, &content)
            .with_context(|| format!("Failed to create test file: {:?}", path))?;
        files.push(TestFile {
            path,
            name,
            size,
            sha256: sha256_hex(&content),
        });
    }
    Ok(files)
}

/// Runs `chunkctl` with a fixed environment
#[derive(Clone)]
pub struct Chunkctl {
    binary: PathBuf,
    env: Vec<(String, String)>,
}

impl Chunkctl {
    pub fn new(binary: PathBuf) -> Self {
        Self {
            binary,
            env: Vec::new(),
        }
    }

    pub fn env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.push((key.to_string(), value.into()));
        self
    }

    /// Run a subcommand and return its trimmed stdout
    pub fn run(&self, args: &[&str]) -> Result<String> {
        debug!(?args, "Running chunkctl");
        let output = Command::new(&self.binary)
            .args(args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()
            .with_context(|| format!("Failed to run chunkctl binary: {:?}", self.binary))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "chunkctl {} failed:\nSTDOUT: {}\nSTDERR: {}",
                args.join(" "),
                stdout,
                stderr
            );
        }
        Ok(stdout)
    }

    /// Run a subcommand that is expected to fail
    pub fn run_expect_failure(&self, args: &[&str]) -> Result<()> {
        match self.run(args) {
            Ok(stdout) => anyhow::bail!(
                "chunkctl {} unexpectedly succeeded: {}",
                args.join(" "),
                stdout
            ),
            Err(_) => Ok(()),
        }
    }

    pub fn add_user(&self, user_id: i64, name: &str) -> Result<()> {
        self.run(&["add-user", "--id", &user_id.to_string(), "--name", name])?;
        Ok(())
    }

    pub fn upload(&self, file: &TestFile, owner: i64) -> Result<i64> {
        let path = file.path.to_string_lossy();
        let stdout = self.run(&["upload", &path, "--owner", &owner.to_string()])?;
        stdout
            .lines()
            .last()
            .and_then(|line| line.trim().parse().ok())
            .with_context(|| format!("Upload did not print a file id: {:?}", stdout))
    }

    pub fn download(&self, file_id: i64, output: &Path) -> Result<()> {
        let output = output.to_string_lossy();
        self.run(&["download", &file_id.to_string(), "--output", &output])?;
        Ok(())
    }
}

/// Download `file_id` and compare it byte for byte with the source
pub fn verify_round_trip(chunkctl: &Chunkctl, file_id: i64, file: &TestFile, out_dir: &Path) -> Result<()> {
    let output = out_dir.join(format!("{}.out", file.name));
    chunkctl.download(file_id, &output)?;
    let content = fs::read(&output).with_context(|| format!("Failed to read {:?}", output))?;
    if content.len() != file.size {
        anyhow::bail!(
            "Downloaded {} bytes for {}, expected {}",
            content.len(),
            file.name,
            file.size
        );
    }
    if sha256_hex(&content) != file.sha256 {
        anyhow::bail!("Downloaded content of {} does not match", file.name);
    }
    println!("  ✓ {} round-trips ({} bytes)", file.name, file.size);
    Ok(())
}

pub fn cleanup_test_data(test_data_dir: &Path) -> Result<()> {
    let keep_data = std::env::var("KEEP_TEST_DATA").unwrap_or_else(|_| "false".to_string());
    if keep_data == "true" {
        println!(
            "\n⚠️  Keeping test data (KEEP_TEST_DATA=true): {:?}",
            test_data_dir
        );
        return Ok(());
    }

    println!("\n🧹 Cleaning up test data: {:?}", test_data_dir);
    if test_data_dir.exists() {
        fs::remove_dir_all(test_data_dir).with_context(|| {
            format!("Failed to remove test data directory: {:?}", test_data_dir)
        })?;
        println!("✅ Test data cleaned up");
    }
    Ok(())
}
