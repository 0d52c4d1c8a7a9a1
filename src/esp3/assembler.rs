//! # Chunk Reassembly
//!
//! Joins the chunks of an oversized logical frame back into one packet.

use tracing::warn;

use super::protocol::{EspPacket, MAX_CHUNK};

/// Collects chunk deliveries until a logical frame is complete
#[derive(Debug, Default)]
pub struct FrameAssembler {
    pending: Option<EspPacket>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether part of a logical frame has been collected
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Add one delivered chunk
    ///
    /// A chunk whose `remaining_chunks` matches the first chunk of its
    /// declared size starts a new frame, dropping anything pending. A
    /// continuation that does not line up with the pending frame drops both.
    ///
    /// # Returns
    ///
    /// * `Option<EspPacket>` - The full logical packet once `remaining_chunks` reaches 0
    pub fn push(&mut self, packet: &EspPacket, remaining_chunks: usize) -> Option<EspPacket> {
        let pending = self.pending.take();

        let assembled = if remaining_chunks + 1 == Self::chunk_count(packet) {
            if let Some(stale) = pending {
                Self::drop_stale(&stale);
            }
            packet.clone()
        } else {
            match pending {
                Some(mut pending) if Self::continues(&pending, packet, remaining_chunks) => {
                    pending.payload.extend_from_slice(&packet.payload);
                    pending
                }
                Some(stale) => {
                    Self::drop_stale(&stale);
                    return None;
                }
                None => {
                    warn!(
                        "Dropping continuation chunk of type 0x{:02X} without its first chunk",
                        packet.packet_type
                    );
                    return None;
                }
            }
        };

        if remaining_chunks > 0 {
            self.pending = Some(assembled);
            return None;
        }

        if assembled.payload.len() != assembled.total_length() {
            warn!(
                "Dropping reassembled frame with {} bytes, header declared {}",
                assembled.payload.len(),
                assembled.total_length()
            );
            return None;
        }

        Some(assembled)
    }

    /// Number of chunks a frame of this declared size is delivered in
    fn chunk_count(packet: &EspPacket) -> usize {
        packet.total_length().div_ceil(MAX_CHUNK).max(1)
    }

    /// Header fields repeat those of the first chunk and the offset lines up
    fn continues(pending: &EspPacket, next: &EspPacket, remaining_chunks: usize) -> bool {
        let index = Self::chunk_count(pending).checked_sub(remaining_chunks + 1);

        pending.packet_type == next.packet_type
            && pending.data_length == next.data_length
            && pending.optional_length == next.optional_length
            && index.is_some_and(|index| pending.payload.len() == index * MAX_CHUNK)
    }

    fn drop_stale(stale: &EspPacket) {
        warn!(
            "Dropping incomplete frame of type 0x{:02X} ({} of {} bytes)",
            stale.packet_type,
            stale.payload.len(),
            stale.total_length()
        );
    }
}
