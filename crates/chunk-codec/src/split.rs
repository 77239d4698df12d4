use crate::{Chunk, ChunkCodec, CodecError, MAX_CHUNKS};
use tokio::io::{AsyncRead, AsyncReadExt, Take};

/// Forward-only, finite sequence of chunks read from an async byte stream.
///
/// Holds at most one chunk buffer at a time. Exactly `total_size` bytes are
/// consumed; anything after that is left unread in the source.
pub struct ChunkSplitter<R> {
    reader: Take<R>,
    codec: ChunkCodec,
    total_size: u64,
    consumed: u64,
    next_number: u32,
    finished: bool,
}

impl<R: AsyncRead + Unpin> ChunkSplitter<R> {
    pub(crate) fn new(codec: ChunkCodec, reader: R, total_size: u64) -> Self {
        Self {
            reader: reader.take(total_size),
            codec,
            total_size,
            consumed: 0,
            next_number: 0,
            finished: false,
        }
    }

    /// Bytes consumed from the source so far
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Read the next chunk, or `None` once the declared size has been consumed.
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>, CodecError> {
        if self.finished {
            return Ok(None);
        }

        let remaining = self.total_size - self.consumed;
        if remaining == 0 {
            // Only reachable for an empty file: emit a single empty chunk.
            self.finished = true;
            return self.emit(Vec::new()).map(Some);
        }

        let want = remaining.min(self.codec.chunk_size() as u64) as usize;
        let mut buffer = vec![0u8; want];
        let mut filled = 0;
        while filled < want {
            let read = match self.reader.read(&mut buffer[filled..]).await {
                Ok(read) => read,
                Err(e) => {
                    self.finished = true;
                    return Err(CodecError::Io(e));
                }
            };
            if read == 0 {
                self.finished = true;
                return Err(CodecError::UnexpectedEof {
                    expected: self.total_size,
                    actual: self.consumed + filled as u64,
                });
            }
            filled += read;
        }

        self.consumed += want as u64;
        if self.consumed == self.total_size {
            self.finished = true;
        }
        self.emit(buffer).map(Some)
    }

    fn emit(&mut self, payload: Vec<u8>) -> Result<Chunk, CodecError> {
        let number = self.next_number;
        if u64::from(number) >= MAX_CHUNKS {
            self.finished = true;
            return Err(CodecError::TooManyChunks);
        }
        self.next_number = number + 1;
        let checksum = self.codec.checksum(&payload);
        Ok(Chunk {
            number,
            payload,
            checksum,
        })
    }
}
