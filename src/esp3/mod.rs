//! # ESP3 Protocol Module
//!
//! Implementation of the EnOcean Serial Protocol 3 framing used by the
//! EnOcean 4 click gateway.
//!
//! This module handles:
//! - Byte-by-byte frame accumulation (interrupt side)
//! - Header/payload CRC8 validation and packet dispatch (task side)
//! - Delivery of frames larger than one chunk
//! - Packet encoding and common commands

pub mod accumulator;
pub mod assembler;
pub mod command;
pub mod crc;
pub mod device;
pub mod encoder;
pub mod parser;
pub mod protocol;

pub use accumulator::{ChunkKind, FrameAccumulator, RawChunk, ReceiveState};
pub use assembler::FrameAssembler;
pub use device::{DeviceStats, Esp3Device};
pub use parser::{PacketHandler, PacketParser};
pub use protocol::{EspPacket, PacketType};
