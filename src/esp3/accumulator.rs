//! # ESP3 Byte Accumulator
//!
//! Interrupt-side half of the receiver. Stores one byte per call and decides
//! when a frame, or a maximal chunk of an oversized frame, is complete.
//! Nothing is validated here; sync and CRC checks belong to the parser.
//!
//! Completed chunks are frozen into an immutable [`RawChunk`] and the
//! accumulator carries on in a fresh buffer, so bytes handed to the parser
//! are never overwritten by the next reception.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use super::protocol::{HEADER_SIZE, MAX_CHUNK, RX_BUFFER_SIZE, SYNC_BYTE};

/// Position of the last header byte before the header crc
const LAST_LENGTH_BYTE: usize = 3;

/// Whether a chunk starts with an ESP3 header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// Sync byte, header and payload
    Header,
    /// Payload bytes continuing an oversized frame
    Continuation,
}

/// A completed chunk handed from the accumulator to the parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    pub kind: ChunkKind,
    pub bytes: Bytes,
}

/// Counters of the frame currently being received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveState {
    /// Position the next byte is written to
    pub byte_index: usize,

    /// Payload bytes still expected for the current logical frame
    pub declared_total_size: usize,

    /// `true` while waiting for a header chunk
    pub first_chunk: bool,
}

impl Default for ReceiveState {
    fn default() -> Self {
        Self {
            byte_index: 0,
            declared_total_size: 0,
            first_chunk: true,
        }
    }
}

/// Accumulates raw bytes into ESP3 chunks
#[derive(Debug)]
pub struct FrameAccumulator {
    buffer: BytesMut,
    state: ReceiveState,
}

impl Default for FrameAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAccumulator {
    /// Create an accumulator waiting for a header chunk
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(RX_BUFFER_SIZE),
            state: ReceiveState::default(),
        }
    }

    /// Current receive counters
    pub fn state(&self) -> ReceiveState {
        self.state
    }

    /// Consume one received byte
    ///
    /// Returns the completed chunk when this byte finishes one.
    pub fn push_byte(&mut self, byte: u8) -> Option<RawChunk> {
        let index = self.state.byte_index;

        self.buffer.truncate(index);
        self.buffer.put_u8(byte);

        if self.state.first_chunk {
            match index {
                0 => self.state.declared_total_size = 0,
                // A second sync byte in a row is a stray; keep waiting for the length
                1 if byte == SYNC_BYTE => return None,
                1 => self.state.declared_total_size = (byte as usize) << 8,
                2 => self.state.declared_total_size |= byte as usize,
                LAST_LENGTH_BYTE => self.state.declared_total_size += byte as usize,
                _ => {}
            }
        }

        let size = self.state.declared_total_size;
        let oversized = size > MAX_CHUNK;

        let complete = match (self.state.first_chunk, oversized) {
            (true, true) => index == MAX_CHUNK + HEADER_SIZE - 1,
            (true, false) => index > LAST_LENGTH_BYTE && index == size + HEADER_SIZE,
            (false, true) => index == MAX_CHUNK - 1,
            (false, false) => index == size,
        };

        if !complete {
            self.state.byte_index += 1;
            return None;
        }

        let kind = if self.state.first_chunk {
            ChunkKind::Header
        } else {
            ChunkKind::Continuation
        };

        if oversized {
            self.state.declared_total_size -= MAX_CHUNK;
            self.state.first_chunk = false;
        } else {
            self.state.declared_total_size = 0;
            self.state.first_chunk = true;
        }
        self.state.byte_index = 0;

        let bytes = self.buffer.split().freeze();
        self.buffer.reserve(RX_BUFFER_SIZE);

        trace!(
            "Chunk complete ({:?}, {} bytes, {} payload bytes outstanding)",
            kind,
            bytes.len(),
            self.state.declared_total_size
        );

        Some(RawChunk { kind, bytes })
    }

    /// Drop any partially received frame and wait for a new header
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = ReceiveState::default();
    }
}
