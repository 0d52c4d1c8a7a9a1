//! # ESP3 Protocol Constants and Types
//!
//! Core definitions for the EnOcean Serial Protocol 3 (ESP3) spoken by the
//! TCM 310 module on the EnOcean 4 click.

use crate::error::{Esp3Error, Result};

/// ESP3 frame sync byte (always 0x55)
pub const SYNC_BYTE: u8 = 0x55;

/// Header size: sync(1) + data length(2) + optional length(1) + type(1) + header crc(1)
pub const HEADER_SIZE: usize = 6;

/// Maximum payload bytes carried by a single physical chunk
pub const MAX_CHUNK: usize = 256;

/// Receive buffer capacity
///
/// Must hold a full header chunk: header + MAX_CHUNK payload + payload crc.
pub const RX_BUFFER_SIZE: usize = 270;

/// Common command: reset the module
pub const CO_WR_RESET: u8 = 0x02;

/// Common command: read version information
pub const CO_RD_VERSION: u8 = 0x03;

/// Common command: read the system log
pub const CO_RD_SYS_LOG: u8 = 0x04;

/// Common command: read the ID range base
pub const CO_RD_IDBASE: u8 = 0x08;

/// ESP3 packet type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// ERP1 radio telegram
    RadioErp1,
    /// Response to a command
    Response,
    /// Radio sub telegram
    RadioSubTel,
    /// Event from the module
    Event,
    /// Common command
    CommonCommand,
    /// Smart Ack command
    SmartAckCommand,
    /// Remote management command
    RemoteManCommand,
    /// Radio message
    RadioMessage,
    /// ERP2 radio telegram
    RadioErp2,
    /// Any other type value
    Unknown(u8),
}

impl From<u8> for PacketType {
    fn from(value: u8) -> Self {
        match value {
            0x01 => Self::RadioErp1,
            0x02 => Self::Response,
            0x03 => Self::RadioSubTel,
            0x04 => Self::Event,
            0x05 => Self::CommonCommand,
            0x06 => Self::SmartAckCommand,
            0x07 => Self::RemoteManCommand,
            0x09 => Self::RadioMessage,
            0x0A => Self::RadioErp2,
            other => Self::Unknown(other),
        }
    }
}

impl From<PacketType> for u8 {
    fn from(value: PacketType) -> Self {
        match value {
            PacketType::RadioErp1 => 0x01,
            PacketType::Response => 0x02,
            PacketType::RadioSubTel => 0x03,
            PacketType::Event => 0x04,
            PacketType::CommonCommand => 0x05,
            PacketType::SmartAckCommand => 0x06,
            PacketType::RemoteManCommand => 0x07,
            PacketType::RadioMessage => 0x09,
            PacketType::RadioErp2 => 0x0A,
            PacketType::Unknown(other) => other,
        }
    }
}

/// Return code carried in the first data byte of a response packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCode {
    Ok,
    Error,
    NotSupported,
    WrongParam,
    OperationDenied,
    Unknown(u8),
}

impl From<u8> for ReturnCode {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::Ok,
            0x01 => Self::Error,
            0x02 => Self::NotSupported,
            0x03 => Self::WrongParam,
            0x04 => Self::OperationDenied,
            other => Self::Unknown(other),
        }
    }
}

/// Decoded ESP3 packet
///
/// For a logical frame split across several chunks the header fields keep
/// their declared values while `payload` holds only the bytes of the chunk
/// being delivered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EspPacket {
    /// Declared data length
    pub data_length: u16,

    /// Declared optional data length
    pub optional_length: u8,

    /// Packet type byte
    pub packet_type: u8,

    /// Data bytes followed by optional bytes
    pub payload: Vec<u8>,
}

impl EspPacket {
    /// Create a packet from its data and optional parts
    ///
    /// # Errors
    ///
    /// Returns `InvalidPacketSize` if the data part does not fit the 16-bit
    /// length field or the optional part does not fit its 8-bit field.
    pub fn new(packet_type: impl Into<u8>, data: &[u8], optional: &[u8]) -> Result<Self> {
        let data_length = u16::try_from(data.len())
            .map_err(|_| Esp3Error::InvalidPacketSize(data.len() + optional.len()))?;
        let optional_length = u8::try_from(optional.len())
            .map_err(|_| Esp3Error::InvalidPacketSize(data.len() + optional.len()))?;

        let mut payload = Vec::with_capacity(data.len() + optional.len());
        payload.extend_from_slice(data);
        payload.extend_from_slice(optional);

        Ok(Self {
            data_length,
            optional_length,
            packet_type: packet_type.into(),
            payload,
        })
    }

    /// Declared size of the whole logical payload (data + optional)
    pub fn total_length(&self) -> usize {
        self.data_length as usize + self.optional_length as usize
    }

    /// Packet type as an enum
    pub fn kind(&self) -> PacketType {
        PacketType::from(self.packet_type)
    }

    /// Data part of a complete packet
    pub fn data(&self) -> &[u8] {
        let end = (self.data_length as usize).min(self.payload.len());
        &self.payload[..end]
    }

    /// Optional part of a complete packet
    pub fn optional(&self) -> &[u8] {
        let start = (self.data_length as usize).min(self.payload.len());
        &self.payload[start..]
    }
}
