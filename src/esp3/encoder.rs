//! # ESP3 Packet Encoder
//!
//! Serializes packets into ESP3 frames for transmission to the gateway.
//!
//! Outbound frames are never split: only the receive path handles logical
//! frames larger than [`MAX_CHUNK`]. Anything bigger is rejected here.

use super::crc::crc8;
use super::protocol::*;
use crate::error::{Esp3Error, Result};

/// Encode a packet into a complete ESP3 frame
///
/// # Arguments
///
/// * `packet` - Packet to serialize; `payload` must hold exactly
///   `data_length + optional_length` bytes
///
/// # Returns
///
/// * `Result<Vec<u8>>` - Sync + header + header crc + payload + payload crc
///
/// # Errors
///
/// Returns `InvalidPacketSize` if the payload is empty, larger than
/// `MAX_CHUNK`, or disagrees with the declared lengths.
///
/// # Examples
///
/// ```
/// use enocean_gateway::esp3::encoder::encode_packet;
/// use enocean_gateway::esp3::protocol::{EspPacket, PacketType, CO_RD_VERSION};
///
/// let packet = EspPacket::new(PacketType::CommonCommand, &[CO_RD_VERSION], &[]).unwrap();
/// let frame = encode_packet(&packet).unwrap();
/// assert_eq!(frame, vec![0x55, 0x00, 0x01, 0x00, 0x05, 0x70, 0x03, 0x09]);
/// ```
pub fn encode_packet(packet: &EspPacket) -> Result<Vec<u8>> {
    let total = packet.total_length();

    if total == 0 || total > MAX_CHUNK || packet.payload.len() != total {
        return Err(Esp3Error::InvalidPacketSize(total.max(packet.payload.len())));
    }

    let [len_hi, len_lo] = packet.data_length.to_be_bytes();
    let header = [len_hi, len_lo, packet.optional_length, packet.packet_type];

    let mut frame = Vec::with_capacity(HEADER_SIZE + total + 1);
    frame.push(SYNC_BYTE);
    frame.extend_from_slice(&header);
    frame.push(crc8(&header));
    frame.extend_from_slice(&packet.payload);
    frame.push(crc8(&packet.payload));

    Ok(frame)
}
