//! # Error Types
//!
//! Custom error types for the EnOcean gateway using `thiserror`.

use thiserror::Error;

/// Main error type for the EnOcean gateway
#[derive(Debug, Error)]
pub enum Esp3Error {
    /// First byte of a header chunk is not the ESP3 sync byte
    #[error("Invalid sync byte: 0x{0:02X}")]
    SyncByte(u8),

    /// Header CRC8 mismatch
    #[error("Header CRC mismatch: expected 0x{expected:02X}, got 0x{received:02X}")]
    HeaderCrc {
        /// CRC computed over the received header bytes
        expected: u8,
        /// CRC byte transmitted in the header
        received: u8,
    },

    /// Payload CRC8 mismatch
    #[error("Payload CRC mismatch: expected 0x{expected:02X}, got 0x{received:02X}")]
    PayloadCrc {
        /// CRC computed over the received payload bytes
        expected: u8,
        /// CRC byte transmitted after the payload
        received: u8,
    },

    /// Outbound packet is empty or larger than a single chunk
    #[error("Invalid packet size: {0} bytes")]
    InvalidPacketSize(usize),

    /// No ready chunk to process
    #[error("No received frame is ready for processing")]
    NotReady,

    /// Chunk shorter than its header announced
    #[error("Truncated chunk: {0} bytes")]
    TruncatedChunk(usize),

    /// Continuation chunk without a preceding header chunk
    #[error("Continuation chunk received without a header chunk")]
    UnexpectedContinuation,

    /// Malformed or unexpected command response
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("No EnOcean gateway found (tried: {0})")]
    SerialPortNotFound(String),

    /// Packet capture serialization errors
    #[error("Capture error: {0}")]
    Capture(#[from] serde_json::Error),
}

impl Esp3Error {
    /// Whether the error was raised while validating a received frame
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::SyncByte(_)
                | Self::HeaderCrc { .. }
                | Self::PayloadCrc { .. }
                | Self::TruncatedChunk(_)
                | Self::UnexpectedContinuation
        )
    }
}

/// Result type alias for the EnOcean gateway
pub type Result<T> = std::result::Result<T, Esp3Error>;
