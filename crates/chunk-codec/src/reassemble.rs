use crate::{ChunkCodec, CodecError};

/// Accumulates chunk payloads in strict ascending order, verifying each checksum on arrival.
///
/// The assembled bytes are only released by [`Reassembler::finish`]; a caller
/// that gets an error from [`Reassembler::push`] drops the reassembler and
/// never sees partial output.
pub struct Reassembler {
    codec: ChunkCodec,
    next_number: u32,
    buffer: Vec<u8>,
}

impl Reassembler {
    pub(crate) fn new(codec: ChunkCodec) -> Self {
        Self {
            codec,
            next_number: 0,
            buffer: Vec::new(),
        }
    }

    /// Pre-size the output buffer when the final length is known
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.buffer.reserve(capacity);
        self
    }

    pub fn push(
        &mut self,
        chunk_number: u32,
        payload: &[u8],
        expected_checksum: &str,
    ) -> Result<(), CodecError> {
        if chunk_number != self.next_number {
            return Err(CodecError::OutOfOrder {
                expected: self.next_number,
                found: chunk_number,
            });
        }
        self.codec.verify(chunk_number, payload, expected_checksum)?;

        self.buffer.extend_from_slice(payload);
        self.next_number = self
            .next_number
            .checked_add(1)
            .ok_or(CodecError::TooManyChunks)?;
        Ok(())
    }

    /// Number of chunks accepted so far
    pub fn chunks_accepted(&self) -> u32 {
        self.next_number
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }
}
