//! # ESP3 Packet Parser
//!
//! Task-side half of the receiver. Turns chunks produced by the
//! [`FrameAccumulator`](super::accumulator::FrameAccumulator) into
//! [`EspPacket`]s, validates both checksums and dispatches the result to a
//! [`PacketHandler`].
//!
//! Logical frames larger than [`MAX_CHUNK`] arrive as one header chunk
//! followed by continuation chunks. Each chunk is delivered separately; the
//! handler is told how many chunks are still outstanding.

use tracing::{debug, warn};

use super::accumulator::{ChunkKind, RawChunk};
use super::crc::crc8;
use super::protocol::*;
use crate::error::{Esp3Error, Result};

/// Receiver of decoded packets
///
/// Called synchronously from [`PacketParser::process`]. The packet is only
/// borrowed for the duration of the call; copy it to keep it.
#[cfg_attr(test, mockall::automock)]
pub trait PacketHandler {
    /// Handle a decoded packet
    ///
    /// `remaining_chunks` is 0 for the final (or only) chunk of a logical frame.
    fn on_packet(&mut self, packet: &EspPacket, remaining_chunks: usize);
}

impl<F> PacketHandler for F
where
    F: FnMut(&EspPacket, usize),
{
    fn on_packet(&mut self, packet: &EspPacket, remaining_chunks: usize) {
        self(packet, remaining_chunks)
    }
}

/// Reassembly state kept between chunks of one logical frame
#[derive(Debug)]
pub struct PacketParser {
    is_first_chunk: bool,
    remaining: usize,
    packet: EspPacket,
}

impl Default for PacketParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketParser {
    /// Create a parser expecting a header chunk
    pub fn new() -> Self {
        Self {
            is_first_chunk: true,
            remaining: 0,
            packet: EspPacket {
                payload: Vec::with_capacity(MAX_CHUNK),
                ..EspPacket::default()
            },
        }
    }

    /// Whether the next chunk is expected to carry a header
    pub fn expects_header(&self) -> bool {
        self.is_first_chunk
    }

    /// Decode one chunk and hand the packet to `handler`
    ///
    /// # Errors
    ///
    /// - `SyncByte` if a header chunk does not start with the sync byte
    /// - `HeaderCrc` if the header checksum does not match
    /// - `PayloadCrc` if the payload checksum of a final chunk does not match
    /// - `TruncatedChunk` if the chunk is shorter than the header announced
    /// - `UnexpectedContinuation` for a continuation chunk with no frame in progress
    ///
    /// On error the handler is not called and the logical frame is dropped.
    pub fn process<H>(&mut self, chunk: &RawChunk, handler: &mut H) -> Result<()>
    where
        H: PacketHandler + ?Sized,
    {
        let result = self.decode(chunk);

        match result {
            Ok(remaining_chunks) => {
                handler.on_packet(&self.packet, remaining_chunks);
                Ok(())
            }
            Err(e) => {
                self.is_first_chunk = true;
                self.remaining = 0;
                Err(e)
            }
        }
    }

    /// Fill `self.packet` from `chunk`, returning the outstanding chunk count
    fn decode(&mut self, chunk: &RawChunk) -> Result<usize> {
        let bytes = &chunk.bytes[..];

        match (self.is_first_chunk, chunk.kind) {
            (true, ChunkKind::Continuation) => return Err(Esp3Error::UnexpectedContinuation),
            (false, ChunkKind::Header) => {
                warn!(
                    "Header chunk received with {} bytes of the previous frame outstanding",
                    self.remaining
                );
                self.is_first_chunk = true;
            }
            _ => {}
        }

        let offset = if self.is_first_chunk {
            self.read_header(bytes)?;
            HEADER_SIZE
        } else {
            0
        };

        // Only the last chunk of a logical frame carries the payload crc
        let (deliver, check_crc) = if self.remaining > MAX_CHUNK {
            (MAX_CHUNK, false)
        } else {
            (self.remaining, true)
        };

        let payload = bytes
            .get(offset..offset + deliver)
            .ok_or(Esp3Error::TruncatedChunk(bytes.len()))?;

        if check_crc {
            let received = *bytes
                .get(offset + deliver)
                .ok_or(Esp3Error::TruncatedChunk(bytes.len()))?;
            let expected = crc8(payload);

            if expected != received {
                return Err(Esp3Error::PayloadCrc { expected, received });
            }
        }

        self.packet.payload.clear();
        self.packet.payload.extend_from_slice(payload);

        self.remaining -= deliver;
        self.is_first_chunk = self.remaining == 0;

        let remaining_chunks = self.remaining.div_ceil(MAX_CHUNK);
        debug!(
            "Decoded packet type 0x{:02X} ({} bytes, {} chunks pending)",
            self.packet.packet_type, deliver, remaining_chunks
        );

        Ok(remaining_chunks)
    }

    /// Validate the header and latch its fields into `self.packet`
    fn read_header(&mut self, bytes: &[u8]) -> Result<()> {
        let header = bytes
            .get(..HEADER_SIZE)
            .ok_or(Esp3Error::TruncatedChunk(bytes.len()))?;

        if header[0] != SYNC_BYTE {
            return Err(Esp3Error::SyncByte(header[0]));
        }

        let expected = crc8(&header[1..5]);
        let received = header[5];
        if expected != received {
            return Err(Esp3Error::HeaderCrc { expected, received });
        }

        self.packet.data_length = u16::from_be_bytes([header[1], header[2]]);
        self.packet.optional_length = header[3];
        self.packet.packet_type = header[4];
        self.remaining = self.packet.total_length();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::esp3::accumulator::FrameAccumulator;
    use crate::esp3::encoder::encode_packet;
    use bytes::Bytes;

    fn chunks_of(frame: &[u8]) -> Vec<RawChunk> {
        let mut acc = FrameAccumulator::new();
        frame.iter().filter_map(|&b| acc.push_byte(b)).collect()
    }

    fn oversized_frame(data: &[u8], optional: &[u8]) -> Vec<u8> {
        let [hi, lo] = (data.len() as u16).to_be_bytes();
        let fields = [hi, lo, optional.len() as u8, 0x01];
        let mut frame = vec![SYNC_BYTE];
        frame.extend_from_slice(&fields);
        frame.push(crc8(&fields));
        frame.extend_from_slice(data);
        frame.extend_from_slice(optional);
        // Trailing crc covers the bytes of the final chunk
        let total = data.len() + optional.len();
        let tail_start = HEADER_SIZE + (total - 1) / MAX_CHUNK * MAX_CHUNK;
        let crc = crc8(&frame[tail_start..]);
        frame.push(crc);
        frame
    }

    #[test]
    fn test_read_version_scenario() {
        let frame = [0x55, 0x00, 0x01, 0x00, 0x05, 0x70, 0x03, 0x09];
        let mut parser = PacketParser::new();
        let mut delivered = Vec::new();

        for chunk in chunks_of(&frame) {
            parser
                .process(&chunk, &mut |p: &EspPacket, n: usize| delivered.push((p.clone(), n)))
                .unwrap();
        }

        assert_eq!(
            delivered,
            vec![(
                EspPacket {
                    data_length: 1,
                    optional_length: 0,
                    packet_type: 5,
                    payload: vec![3],
                },
                0
            )]
        );
    }

    #[test]
    fn test_handler_called_once_with_mock() {
        let packet = EspPacket::new(PacketType::RadioErp1, &[0xF6, 0x30, 1, 2, 3, 4, 0x30], &[0x01]).unwrap();
        let frame = encode_packet(&packet).unwrap();
        let expected = packet.clone();

        let mut handler = MockPacketHandler::new();
        handler
            .expect_on_packet()
            .withf(move |p, n| *p == expected && *n == 0)
            .times(1)
            .return_const(());

        let mut parser = PacketParser::new();
        for chunk in chunks_of(&frame) {
            parser.process(&chunk, &mut handler).unwrap();
        }
    }

    #[test]
    fn test_two_chunk_delivery() {
        let data: Vec<u8> = (0..280).map(|i| (i % 251) as u8).collect();
        let optional = [0xAA, 0xBB, 0xCC];
        let frame = oversized_frame(&data, &optional);

        let mut parser = PacketParser::new();
        let mut delivered: Vec<(EspPacket, usize)> = Vec::new();
        for chunk in chunks_of(&frame) {
            parser
                .process(&chunk, &mut |p: &EspPacket, n: usize| delivered.push((p.clone(), n)))
                .unwrap();
        }

        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].0.payload.len(), MAX_CHUNK);
        assert!(delivered[0].1 > 0);
        assert_eq!(delivered[1].1, 0);
        assert_eq!(delivered[1].0.data_length, 280);
        assert_eq!(delivered[1].0.optional_length, 3);

        let joined: Vec<u8> = delivered.iter().flat_map(|(p, _)| p.payload.clone()).collect();
        let mut expected = data.clone();
        expected.extend_from_slice(&optional);
        assert_eq!(joined, expected);
        assert!(parser.expects_header());
    }

    #[test]
    fn test_three_chunk_delivery() {
        let data: Vec<u8> = (0..700).map(|i| (i * 7) as u8).collect();
        let frame = oversized_frame(&data, &[]);

        let mut parser = PacketParser::new();
        let mut counts = Vec::new();
        let mut joined = Vec::new();
        for chunk in chunks_of(&frame) {
            parser
                .process(&chunk, &mut |p: &EspPacket, n: usize| {
                    counts.push(n);
                    joined.extend_from_slice(&p.payload);
                })
                .unwrap();
        }

        assert_eq!(counts, vec![2, 1, 0]);
        assert_eq!(joined, data);
    }

    #[test]
    fn test_header_crc_error() {
        let mut frame = vec![0x55, 0x00, 0x01, 0x00, 0x05, 0x70, 0x03, 0x09];
        frame[5] ^= 0x10;

        let mut parser = PacketParser::new();
        let mut calls = 0;
        for chunk in chunks_of(&frame) {
            let result = parser.process(&chunk, &mut |_: &EspPacket, _: usize| calls += 1);
            assert!(matches!(
                result,
                Err(Esp3Error::HeaderCrc { expected: 0x70, received: 0x60 })
            ));
        }
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_payload_crc_error() {
        let packet = EspPacket::new(PacketType::CommonCommand, &[0x03, 0x10, 0x20], &[0x07]).unwrap();
        let frame = encode_packet(&packet).unwrap();

        for index in HEADER_SIZE..frame.len() {
            let mut corrupted = frame.clone();
            corrupted[index] ^= 0x01;

            let mut parser = PacketParser::new();
            let mut calls = 0;
            for chunk in chunks_of(&corrupted) {
                let result = parser.process(&chunk, &mut |_: &EspPacket, _: usize| calls += 1);
                assert!(matches!(result, Err(Esp3Error::PayloadCrc { .. })), "byte {}", index);
            }
            assert_eq!(calls, 0);
        }
    }

    #[test]
    fn test_sync_byte_error() {
        let chunk = RawChunk {
            kind: ChunkKind::Header,
            bytes: Bytes::from_static(&[0xAA, 0x00, 0x01, 0x00, 0x05, 0x70, 0x03, 0x09]),
        };

        let mut parser = PacketParser::new();
        let result = parser.process(&chunk, &mut |_: &EspPacket, _: usize| {
            panic!("handler must not run")
        });
        assert!(matches!(result, Err(Esp3Error::SyncByte(0xAA))));
    }

    #[test]
    fn test_orphan_continuation_rejected() {
        let chunk = RawChunk {
            kind: ChunkKind::Continuation,
            bytes: Bytes::from_static(&[0x01, 0x02, 0x03]),
        };

        let mut parser = PacketParser::new();
        let result = parser.process(&chunk, &mut |_: &EspPacket, _: usize| {});
        assert!(matches!(result, Err(Esp3Error::UnexpectedContinuation)));
        assert!(parser.expects_header());
    }

    #[test]
    fn test_short_continuation_rejected() {
        let first = chunks_of(&oversized_frame(&[0x33; 700], &[])).remove(0);
        let short = RawChunk {
            kind: ChunkKind::Continuation,
            bytes: Bytes::from_static(&[0x33; 10]),
        };

        let mut parser = PacketParser::new();
        parser.process(&first, &mut |_: &EspPacket, _: usize| {}).unwrap();
        let result = parser.process(&short, &mut |_: &EspPacket, _: usize| {});

        assert!(matches!(result, Err(Esp3Error::TruncatedChunk(10))));
        assert!(result.unwrap_err().is_framing());
        assert!(parser.expects_header());
    }

    #[test]
    fn test_header_chunk_abandons_pending_frame() {
        let data = vec![0x11; 300];
        let first = chunks_of(&oversized_frame(&data, &[])).remove(0);
        let next = chunks_of(&[0x55, 0x00, 0x01, 0x00, 0x05, 0x70, 0x03, 0x09]).remove(0);

        let mut parser = PacketParser::new();
        let mut seen = Vec::new();
        parser
            .process(&first, &mut |_: &EspPacket, n: usize| seen.push(n))
            .unwrap();
        assert!(!parser.expects_header());

        parser
            .process(&next, &mut |p: &EspPacket, n: usize| seen.push(n + p.payload.len()))
            .unwrap();
        assert_eq!(seen, vec![1, 1]);
        assert!(parser.expects_header());
    }

    #[test]
    fn test_error_resets_to_header_mode() {
        let data = vec![0x22; 300];
        let mut frame = oversized_frame(&data, &[]);
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;

        let mut parser = PacketParser::new();
        let chunks = chunks_of(&frame);
        parser.process(&chunks[0], &mut |_: &EspPacket, _: usize| {}).unwrap();
        let result = parser.process(&chunks[1], &mut |_: &EspPacket, _: usize| {});

        assert!(matches!(result, Err(Esp3Error::PayloadCrc { .. })));
        assert!(parser.expects_header());
    }
}
