use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tokio::io::AsyncRead;

pub mod reassemble;
pub mod split;

pub use reassemble::Reassembler;
pub use split::ChunkSplitter;

/// Reference chunk size: 1 MiB
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Upper bound on the chunks of one file. Chunk numbers stay below `u32::MAX`.
pub const MAX_CHUNKS: u64 = u32::MAX as u64;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    #[error("unknown checksum algorithm: {0}")]
    UnknownAlgorithm(String),
    #[error("stream ended after {actual} of {expected} bytes")]
    UnexpectedEof { expected: u64, actual: u64 },
    #[error("failed to read chunk data: {0}")]
    Io(#[from] std::io::Error),
    #[error("file needs more chunks than can be numbered")]
    TooManyChunks,
    #[error("received chunk {found} where chunk {expected} was expected")]
    OutOfOrder { expected: u32, found: u32 },
    #[error("checksum mismatch on chunk {chunk_number}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        chunk_number: u32,
        expected: String,
        actual: String,
    },
}

/// Content digest used for chunk checksums.
/// Both ends of a deployment must agree on the algorithm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl ChecksumAlgorithm {
    /// Hex-encoded digest of `data`
    pub fn digest(&self, data: &[u8]) -> String {
        match self {
            ChecksumAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
            ChecksumAlgorithm::Sha512 => hex::encode(Sha512::digest(data)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(ChecksumAlgorithm::Sha256),
            "sha512" | "sha-512" => Ok(ChecksumAlgorithm::Sha512),
            _ => Err(CodecError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// One numbered slice of a file together with the checksum of its payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub number: u32,
    pub payload: Vec<u8>,
    pub checksum: String,
}

/// Splits byte streams into fixed-size checksummed chunks and puts them back together.
///
/// The codec is a small `Copy` value; the same instance (same chunk size and
/// algorithm) must be used on the upload and download paths of a deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkCodec {
    chunk_size: usize,
    algorithm: ChecksumAlgorithm,
}

impl Default for ChunkCodec {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            algorithm: ChecksumAlgorithm::default(),
        }
    }
}

impl ChunkCodec {
    pub fn new(chunk_size: usize, algorithm: ChecksumAlgorithm) -> Result<Self, CodecError> {
        if chunk_size == 0 {
            return Err(CodecError::InvalidChunkSize);
        }
        Ok(Self {
            chunk_size,
            algorithm,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    pub fn checksum(&self, data: &[u8]) -> String {
        self.algorithm.digest(data)
    }

    /// Recompute the checksum of `payload` and compare it with `expected`.
    pub fn verify(&self, chunk_number: u32, payload: &[u8], expected: &str) -> Result<(), CodecError> {
        let actual = self.checksum(payload);
        if actual.eq_ignore_ascii_case(expected) {
            Ok(())
        } else {
            Err(CodecError::ChecksumMismatch {
                chunk_number,
                expected: expected.to_string(),
                actual,
            })
        }
    }

    /// Number of chunks a file of `total_size` bytes splits into.
    /// An empty file still occupies one (empty) chunk.
    pub fn chunk_count(&self, total_size: u64) -> u64 {
        if total_size == 0 {
            1
        } else {
            total_size.div_ceil(self.chunk_size as u64)
        }
    }

    /// Reject sizes whose chunks could not all be numbered, before any are written.
    pub fn check_size(&self, total_size: u64) -> Result<u64, CodecError> {
        let count = self.chunk_count(total_size);
        if count > MAX_CHUNKS {
            return Err(CodecError::TooManyChunks);
        }
        Ok(count)
    }

    /// Lazily split exactly `total_size` bytes of `reader` into chunks.
    pub fn splitter<R: AsyncRead + Unpin>(&self, reader: R, total_size: u64) -> ChunkSplitter<R> {
        ChunkSplitter::new(*self, reader, total_size)
    }

    pub fn reassembler(&self) -> Reassembler {
        Reassembler::new(*self)
    }

    /// Concatenate already ordered chunks, verifying every checksum.
    pub fn reassemble<I>(&self, chunks: I) -> Result<Vec<u8>, CodecError>
    where
        I: IntoIterator<Item = Chunk>,
    {
        let mut reassembler = self.reassembler();
        for chunk in chunks {
            reassembler.push(chunk.number, &chunk.payload, &chunk.checksum)?;
        }
        Ok(reassembler.finish())
    }
}
