//! # Common Commands
//!
//! Construction of the common commands the host sends to the gateway and
//! decoding of the responses it gets back.

use std::fmt;

use super::protocol::*;
use crate::error::{Esp3Error, Result};

/// Length of the `CO_RD_VERSION` response data (return code included)
pub const VERSION_RESPONSE_SIZE: usize = 33;

/// Length of the `CO_RD_IDBASE` response data (return code included)
pub const ID_BASE_RESPONSE_SIZE: usize = 5;

/// Build a single-byte common command
fn common_command(code: u8) -> EspPacket {
    EspPacket {
        data_length: 1,
        optional_length: 0,
        packet_type: PacketType::CommonCommand.into(),
        payload: vec![code],
    }
}

/// `CO_RD_VERSION`: query firmware and chip versions
pub fn read_version() -> EspPacket {
    common_command(CO_RD_VERSION)
}

/// `CO_RD_IDBASE`: query the base of the module's ID range
pub fn read_id_base() -> EspPacket {
    common_command(CO_RD_IDBASE)
}

/// `CO_WR_RESET`: software reset of the module
pub fn reset() -> EspPacket {
    common_command(CO_WR_RESET)
}

/// `CO_RD_SYS_LOG`: read the module's system log
pub fn read_sys_log() -> EspPacket {
    common_command(CO_RD_SYS_LOG)
}

/// Response packet split into return code and data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: ReturnCode,
    pub data: Vec<u8>,
    pub optional: Vec<u8>,
}

impl Response {
    /// Fail unless the return code is `Ok`
    pub fn ok(self) -> Result<Self> {
        match self.code {
            ReturnCode::Ok => Ok(self),
            code => Err(Esp3Error::InvalidResponse(format!("return code {:?}", code))),
        }
    }
}

/// Split a response packet into its parts
///
/// # Errors
///
/// Returns `InvalidResponse` if the packet is not a response or has no data.
pub fn decode_response(packet: &EspPacket) -> Result<Response> {
    if packet.kind() != PacketType::Response {
        return Err(Esp3Error::InvalidResponse(format!(
            "packet type 0x{:02X} is not a response",
            packet.packet_type
        )));
    }

    let (&code, data) = packet
        .data()
        .split_first()
        .ok_or_else(|| Esp3Error::InvalidResponse("empty response".to_string()))?;

    Ok(Response {
        code: ReturnCode::from(code),
        data: data.to_vec(),
        optional: packet.optional().to_vec(),
    })
}

/// Four-part version number (main.beta.alpha.build)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version(pub [u8; 4]);

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [main, beta, alpha, build] = self.0;
        write!(f, "{}.{}.{}.{}", main, beta, alpha, build)
    }
}

/// Decoded `CO_RD_VERSION` response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub app_version: Version,
    pub api_version: Version,
    pub chip_id: u32,
    pub chip_version: u32,
    pub app_description: String,
}

/// Decode the answer to [`read_version`]
///
/// # Errors
///
/// Returns `InvalidResponse` if the response failed or is too short.
pub fn decode_version(response: Response) -> Result<VersionInfo> {
    let response = response.ok()?;
    let data = &response.data;

    if data.len() < VERSION_RESPONSE_SIZE - 1 {
        return Err(Esp3Error::InvalidResponse(format!(
            "version response too short: {} bytes",
            data.len()
        )));
    }

    let word = |at: usize| [data[at], data[at + 1], data[at + 2], data[at + 3]];
    let description = &data[16..32];
    let end = description.iter().position(|&b| b == 0).unwrap_or(description.len());

    Ok(VersionInfo {
        app_version: Version(word(0)),
        api_version: Version(word(4)),
        chip_id: u32::from_be_bytes(word(8)),
        chip_version: u32::from_be_bytes(word(12)),
        app_description: String::from_utf8_lossy(&description[..end]).trim_end().to_string(),
    })
}

/// Decoded `CO_RD_IDBASE` response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdBase {
    pub base_id: u32,
    /// Remaining write cycles, if the module reports them
    pub remaining_writes: Option<u8>,
}

/// Decode the answer to [`read_id_base`]
///
/// # Errors
///
/// Returns `InvalidResponse` if the response failed or is too short.
pub fn decode_id_base(response: Response) -> Result<IdBase> {
    let response = response.ok()?;

    let id: [u8; 4] = response
        .data
        .get(..ID_BASE_RESPONSE_SIZE - 1)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| Esp3Error::InvalidResponse("ID base response too short".to_string()))?;

    Ok(IdBase {
        base_id: u32::from_be_bytes(id),
        remaining_writes: response.optional.first().copied(),
    })
}
